//! Column metadata parsing and row-level encode/decode.

use std::collections::HashMap;

use crate::error::{CodecError, Result};
use crate::frame::{Frame, ProtocolVersion};
use crate::types::CqlType;
use crate::value::CqlValue;

// ── Result-metadata flag bits ────────────────────────────────────────────

pub const META_GLOBAL_TABLE_SPEC: i32 = 0x0001;
/// v2 only: a paging-state bytes value precedes the per-column entries.
pub const META_HAS_MORE_PAGES: i32 = 0x0002;
/// v2 only: no per-column entries follow.
pub const META_NO_METADATA: i32 = 0x0004;

/// One column descriptor: the three-level qualified name, the resolved
/// short name, and the column's type.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub keyspace: String,
    pub table: String,
    pub name: String,
    pub short_name: String,
    pub ctype: CqlType,
}

/// An ordered sequence of column descriptors plus a name index.
///
/// Mutated only during construction; read-only afterwards. The index maps
/// every qualifier form that is unique across the set (bare name,
/// `table.column`, `keyspace.table.column`) to its 0-based column index.
#[derive(Debug, Clone, Default)]
pub struct ColumnMeta {
    columns: Vec<ColumnSpec>,
    by_name: HashMap<String, usize>,
    paging_state: Option<Vec<u8>>,
}

impl ColumnMeta {
    /// Parse column metadata from a result body.
    pub fn from_frame(frame: &mut Frame, version: ProtocolVersion) -> Result<Self> {
        let flags = frame.read_int()?;
        let n_columns = frame.read_int()?;
        if n_columns < 0 {
            return Err(CodecError::Malformed(format!(
                "negative column count: {n_columns}"
            )));
        }

        let paging_state = if version == ProtocolVersion::V2 && flags & META_HAS_MORE_PAGES != 0
        {
            frame.read_bytes()?
        } else {
            None
        };

        let no_metadata = version == ProtocolVersion::V2 && flags & META_NO_METADATA != 0;

        let mut columns = Vec::new();
        if !no_metadata {
            let global = if flags & META_GLOBAL_TABLE_SPEC != 0 {
                Some((frame.read_string()?, frame.read_string()?))
            } else {
                None
            };
            columns.reserve(n_columns as usize);
            for _ in 0..n_columns {
                let (keyspace, table) = match &global {
                    Some((ks, tbl)) => (ks.clone(), tbl.clone()),
                    None => (frame.read_string()?, frame.read_string()?),
                };
                let name = frame.read_string()?;
                let ctype = CqlType::from_frame(frame)?;
                columns.push(ColumnSpec {
                    keyspace,
                    table,
                    name,
                    short_name: String::new(),
                    ctype,
                });
            }
        }

        let mut meta = ColumnMeta { columns, by_name: HashMap::new(), paging_state };
        meta.resolve_names();
        Ok(meta)
    }

    /// Construct synthetic metadata from literal column descriptions.
    /// Type names are resolved through [`CqlType::parse`].
    pub fn new(columns: &[(&str, &str, &str, &str)]) -> Result<Self> {
        let columns = columns
            .iter()
            .map(|(keyspace, table, name, type_name)| {
                Ok(ColumnSpec {
                    keyspace: (*keyspace).to_string(),
                    table: (*table).to_string(),
                    name: (*name).to_string(),
                    short_name: String::new(),
                    ctype: CqlType::parse(type_name)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let mut meta = ColumnMeta { columns, by_name: HashMap::new(), paging_state: None };
        meta.resolve_names();
        Ok(meta)
    }

    /// Consume and discard the byte shape of a metadata block.
    pub fn skip(frame: &mut Frame, version: ProtocolVersion) -> Result<()> {
        Self::from_frame(frame, version).map(drop)
    }

    /// Pick each column's shortest unique qualifier form and index every
    /// unique form for lookup.
    fn resolve_names(&mut self) {
        let mut seen: HashMap<String, usize> = HashMap::new();
        for c in &self.columns {
            *seen.entry(c.name.clone()).or_insert(0) += 1;
            *seen.entry(format!("{}.{}", c.table, c.name)).or_insert(0) += 1;
            *seen
                .entry(format!("{}.{}.{}", c.keyspace, c.table, c.name))
                .or_insert(0) += 1;
        }
        self.by_name.clear();
        for (i, c) in self.columns.iter_mut().enumerate() {
            let bare = c.name.clone();
            let pair = format!("{}.{}", c.table, c.name);
            let full = format!("{}.{}.{}", c.keyspace, c.table, c.name);
            c.short_name = if seen[&bare] == 1 {
                bare.clone()
            } else if seen[&pair] == 1 {
                pair.clone()
            } else {
                full.clone()
            };
            for form in [bare, pair, full] {
                if seen[&form] == 1 {
                    self.by_name.insert(form, i);
                }
            }
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    /// Column count.
    pub fn columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Result<&ColumnSpec> {
        self.columns
            .get(index)
            .ok_or_else(|| CodecError::NoSuchColumn(index.to_string()))
    }

    /// The fully qualified `keyspace.table.column` name.
    pub fn column_name(&self, index: usize) -> Result<String> {
        let c = self.column(index)?;
        Ok(format!("{}.{}.{}", c.keyspace, c.table, c.name))
    }

    pub fn column_shortname(&self, index: usize) -> Result<&str> {
        Ok(&self.column(index)?.short_name)
    }

    pub fn column_type(&self, index: usize) -> Result<&CqlType> {
        Ok(&self.column(index)?.ctype)
    }

    /// Look up a column by any unique qualifier form.
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// v2 paging state, when the server flagged more pages.
    pub fn paging_state(&self) -> Option<&[u8]> {
        self.paging_state.as_deref()
    }

    // ── Vectorised row codec ─────────────────────────────────────────────

    /// Validate and encode one value per column. `Null` encodes to the
    /// absent marker; the frame layer writes it as length `-1`.
    pub fn encode_data(&self, values: &[CqlValue]) -> Result<Vec<Option<Vec<u8>>>> {
        if values.len() != self.columns.len() {
            return Err(CodecError::ArityMismatch {
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        let mut out = Vec::with_capacity(values.len());
        for (c, value) in self.columns.iter().zip(values) {
            if value.is_null() {
                out.push(None);
                continue;
            }
            if let Some(reason) = c.ctype.validate(value) {
                return Err(CodecError::Encode { column: c.short_name.clone(), reason });
            }
            out.push(Some(c.ctype.encode(value)?));
        }
        Ok(out)
    }

    /// Decode one byte string per column; absent input yields `Null`.
    pub fn decode_data(&self, blobs: &[Option<Vec<u8>>]) -> Result<Vec<CqlValue>> {
        if blobs.len() != self.columns.len() {
            return Err(CodecError::ArityMismatch {
                expected: self.columns.len(),
                actual: blobs.len(),
            });
        }
        self.columns
            .iter()
            .zip(blobs)
            .map(|(c, blob)| match blob {
                Some(bytes) => c.ctype.decode(bytes),
                None => Ok(CqlValue::Null),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TYPE_INT, TYPE_TEXT};

    fn meta_frame_v1() -> Frame {
        // flags=1 (global table spec), one text column test.table.column
        let mut f = Frame::new();
        f.write_int(META_GLOBAL_TABLE_SPEC);
        f.write_int(1);
        f.write_string("test");
        f.write_string("table");
        f.write_string("column");
        f.write_short(TYPE_TEXT);
        f
    }

    #[test]
    fn from_frame_with_global_table_spec() {
        let mut f = meta_frame_v1();
        let meta = ColumnMeta::from_frame(&mut f, ProtocolVersion::V1).unwrap();
        assert_eq!(meta.columns(), 1);
        assert_eq!(meta.column_name(0).unwrap(), "test.table.column");
        assert_eq!(meta.column_shortname(0).unwrap(), "column");
        assert_eq!(meta.column_type(0).unwrap(), &CqlType::Text);
        assert_eq!(f.remaining(), 0);
    }

    #[test]
    fn from_frame_with_per_column_specs() {
        let mut f = Frame::new();
        f.write_int(0);
        f.write_int(2);
        for (ks, tbl, name) in [("ks1", "t1", "a"), ("ks2", "t2", "b")] {
            f.write_string(ks);
            f.write_string(tbl);
            f.write_string(name);
            f.write_short(TYPE_INT);
        }
        let meta = ColumnMeta::from_frame(&mut f, ProtocolVersion::V1).unwrap();
        assert_eq!(meta.columns(), 2);
        assert_eq!(meta.column_name(1).unwrap(), "ks2.t2.b");
    }

    #[test]
    fn shortname_prefers_bare_then_pair_then_full() {
        let meta = ColumnMeta::new(&[
            ("ks", "t1", "id", "int"),
            ("ks", "t1", "name", "text"),
            ("ks", "t2", "name", "text"),
        ])
        .unwrap();
        assert_eq!(meta.column_shortname(0).unwrap(), "id");
        assert_eq!(meta.column_shortname(1).unwrap(), "t1.name");
        assert_eq!(meta.column_shortname(2).unwrap(), "t2.name");

        let meta = ColumnMeta::new(&[
            ("ks1", "t", "v", "int"),
            ("ks2", "t", "v", "int"),
        ])
        .unwrap();
        assert_eq!(meta.column_shortname(0).unwrap(), "ks1.t.v");
        assert_eq!(meta.column_shortname(1).unwrap(), "ks2.t.v");
    }

    #[test]
    fn shortnames_are_pairwise_unique() {
        let meta = ColumnMeta::new(&[
            ("ks", "t1", "x", "int"),
            ("ks", "t2", "x", "int"),
            ("ks", "t1", "y", "int"),
        ])
        .unwrap();
        let mut names: Vec<_> = (0..meta.columns())
            .map(|i| meta.column_shortname(i).unwrap().to_string())
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), meta.columns());
    }

    #[test]
    fn find_column_accepts_every_unique_form() {
        let meta = ColumnMeta::new(&[
            ("ks", "t", "id", "int"),
            ("ks", "t", "name", "text"),
        ])
        .unwrap();
        assert_eq!(meta.find_column("id"), Some(0));
        assert_eq!(meta.find_column("t.id"), Some(0));
        assert_eq!(meta.find_column("ks.t.id"), Some(0));
        assert_eq!(meta.find_column("name"), Some(1));
        assert_eq!(meta.find_column("missing"), None);
    }

    #[test]
    fn ambiguous_forms_are_not_installed() {
        let meta = ColumnMeta::new(&[
            ("ks", "t1", "name", "text"),
            ("ks", "t2", "name", "text"),
        ])
        .unwrap();
        assert_eq!(meta.find_column("name"), None);
        assert_eq!(meta.find_column("t1.name"), Some(0));
        assert_eq!(meta.find_column("t2.name"), Some(1));
    }

    #[test]
    fn v2_paging_state_precedes_columns() {
        let mut f = Frame::new();
        f.write_int(META_GLOBAL_TABLE_SPEC | META_HAS_MORE_PAGES);
        f.write_int(1);
        f.write_bytes(Some(b"page-token"));
        f.write_string("ks");
        f.write_string("t");
        f.write_string("c");
        f.write_short(TYPE_INT);
        let meta = ColumnMeta::from_frame(&mut f, ProtocolVersion::V2).unwrap();
        assert_eq!(meta.paging_state(), Some(&b"page-token"[..]));
        assert_eq!(meta.columns(), 1);
    }

    #[test]
    fn v2_no_metadata_reads_no_column_entries() {
        let mut f = Frame::new();
        f.write_int(META_NO_METADATA);
        f.write_int(3);
        f.write_long(0x5555_5555); // unrelated trailing bytes stay put
        let meta = ColumnMeta::from_frame(&mut f, ProtocolVersion::V2).unwrap();
        assert_eq!(meta.columns(), 0);
        assert_eq!(f.remaining(), 8);
    }

    #[test]
    fn v1_ignores_v2_flag_bits() {
        // under v1 the 0x0002 bit carries no paging state
        let mut f = Frame::new();
        f.write_int(META_GLOBAL_TABLE_SPEC | META_HAS_MORE_PAGES);
        f.write_int(1);
        f.write_string("ks");
        f.write_string("t");
        f.write_string("c");
        f.write_short(TYPE_INT);
        let meta = ColumnMeta::from_frame(&mut f, ProtocolVersion::V1).unwrap();
        assert_eq!(meta.paging_state(), None);
        assert_eq!(meta.columns(), 1);
    }

    #[test]
    fn skip_consumes_the_same_shape() {
        let mut f = meta_frame_v1();
        f.write_long(-1); // trailing data after the metadata block
        ColumnMeta::skip(&mut f, ProtocolVersion::V1).unwrap();
        assert_eq!(f.read_long().unwrap(), -1);
        assert_eq!(f.remaining(), 0);
    }

    #[test]
    fn encode_data_checks_arity() {
        let meta = ColumnMeta::new(&[("ks", "t", "a", "int")]).unwrap();
        assert!(matches!(
            meta.encode_data(&[]),
            Err(CodecError::ArityMismatch { expected: 1, actual: 0 })
        ));
    }

    #[test]
    fn encode_data_names_the_offending_column() {
        let meta = ColumnMeta::new(&[
            ("ks", "t", "id", "int"),
            ("ks", "t", "body", "ascii"),
        ])
        .unwrap();
        let err = meta
            .encode_data(&[CqlValue::Int(1), CqlValue::Text("caf\u{e9}".into())])
            .unwrap_err();
        match err {
            CodecError::Encode { column, reason } => {
                assert_eq!(column, "body");
                assert!(reason.contains("non-ASCII"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn encode_decode_roundtrip_with_nulls() {
        let meta = ColumnMeta::new(&[
            ("ks", "t", "id", "int"),
            ("ks", "t", "name", "text"),
        ])
        .unwrap();
        let values = vec![CqlValue::Int(7), CqlValue::Null];
        let blobs = meta.encode_data(&values).unwrap();
        assert_eq!(blobs[1], None);
        assert_eq!(meta.decode_data(&blobs).unwrap(), values);
    }

    #[test]
    fn out_of_range_index_fails() {
        let meta = ColumnMeta::new(&[("ks", "t", "a", "int")]).unwrap();
        assert!(matches!(
            meta.column_name(5),
            Err(CodecError::NoSuchColumn(_))
        ));
    }
}
