//! Decoded result sets: column metadata plus rows of typed values.

use std::collections::HashMap;

use crate::error::{CodecError, Result};
use crate::frame::{Frame, ProtocolVersion};
use crate::meta::ColumnMeta;
use crate::types::CqlType;
use crate::value::CqlValue;

/// The rows of a `RESULT_ROWS` response, decoded eagerly against the
/// embedded column metadata.
///
/// Holds the metadata by composition and forwards its accessors. Rows are
/// mutated only during construction; every accessor yields fresh clones,
/// never aliases of the internal storage.
#[derive(Debug, Clone, Default)]
pub struct CqlResult {
    meta: ColumnMeta,
    rows: Vec<Vec<CqlValue>>,
}

impl CqlResult {
    /// Parse a `RESULT_ROWS` body: column metadata, row count, then
    /// `n_rows x n_columns` length-prefixed byte values.
    pub fn from_frame(frame: &mut Frame, version: ProtocolVersion) -> Result<Self> {
        let meta = ColumnMeta::from_frame(frame, version)?;
        let n_rows = frame.read_int()?;
        if n_rows < 0 {
            return Err(CodecError::Malformed(format!("negative row count: {n_rows}")));
        }
        let mut rows = Vec::with_capacity((n_rows as usize).min(65536));
        for _ in 0..n_rows {
            let mut cells = Vec::with_capacity(meta.columns());
            for _ in 0..meta.columns() {
                cells.push(frame.read_bytes()?);
            }
            rows.push(meta.decode_data(&cells)?);
        }
        Ok(CqlResult { meta, rows })
    }

    /// Construct a synthetic result. Every cell is validated against its
    /// column's type before insertion.
    pub fn new(columns: &[(&str, &str, &str, &str)], rows: Vec<Vec<CqlValue>>) -> Result<Self> {
        let meta = ColumnMeta::new(columns)?;
        for (row_index, row) in rows.iter().enumerate() {
            if row.len() != meta.columns() {
                return Err(CodecError::ArityMismatch {
                    expected: meta.columns(),
                    actual: row.len(),
                });
            }
            for (col_index, value) in row.iter().enumerate() {
                if value.is_null() {
                    continue;
                }
                if let Some(reason) = meta.column_type(col_index)?.validate(value) {
                    return Err(CodecError::RowValidation {
                        row: row_index,
                        column: meta.column_shortname(col_index)?.to_string(),
                        reason,
                    });
                }
            }
        }
        Ok(CqlResult { meta, rows })
    }

    // ── Metadata forwarding ──────────────────────────────────────────────

    pub fn metadata(&self) -> &ColumnMeta {
        &self.meta
    }

    pub fn columns(&self) -> usize {
        self.meta.columns()
    }

    pub fn column_name(&self, index: usize) -> Result<String> {
        self.meta.column_name(index)
    }

    pub fn column_shortname(&self, index: usize) -> Result<&str> {
        self.meta.column_shortname(index)
    }

    pub fn column_type(&self, index: usize) -> Result<&CqlType> {
        self.meta.column_type(index)
    }

    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.meta.find_column(name)
    }

    // ── Row access ───────────────────────────────────────────────────────

    /// Row count.
    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    /// One row as an ordered tuple of values.
    pub fn row_array(&self, index: usize) -> Result<Vec<CqlValue>> {
        self.rows
            .get(index)
            .cloned()
            .ok_or(CodecError::NoSuchRow(index))
    }

    /// One row as a short-name keyed record.
    pub fn row_hash(&self, index: usize) -> Result<HashMap<String, CqlValue>> {
        let row = self.rows.get(index).ok_or(CodecError::NoSuchRow(index))?;
        Ok(self.keyed_record(row))
    }

    /// All rows as ordered tuples.
    pub fn rows_array(&self) -> impl Iterator<Item = Vec<CqlValue>> + '_ {
        self.rows.iter().cloned()
    }

    /// All rows as short-name keyed records.
    pub fn rows_hash(&self) -> impl Iterator<Item = HashMap<String, CqlValue>> + '_ {
        self.rows.iter().map(|row| self.keyed_record(row))
    }

    /// All rows keyed by the value in column `key_index`. Duplicate keys
    /// resolve to the last row in row order.
    pub fn rowmap_array(&self, key_index: usize) -> Result<HashMap<CqlValue, Vec<CqlValue>>> {
        if key_index >= self.meta.columns() {
            return Err(CodecError::NoSuchColumn(key_index.to_string()));
        }
        let mut out = HashMap::with_capacity(self.rows.len());
        for row in &self.rows {
            out.insert(row[key_index].clone(), row.clone());
        }
        Ok(out)
    }

    /// All rows as records keyed by the named column's value.
    pub fn rowmap_hash(
        &self,
        key_name: &str,
    ) -> Result<HashMap<CqlValue, HashMap<String, CqlValue>>> {
        let key_index = self
            .meta
            .find_column(key_name)
            .ok_or_else(|| CodecError::NoSuchColumn(key_name.to_string()))?;
        let mut out = HashMap::with_capacity(self.rows.len());
        for row in &self.rows {
            out.insert(row[key_index].clone(), self.keyed_record(row));
        }
        Ok(out)
    }

    fn keyed_record(&self, row: &[CqlValue]) -> HashMap<String, CqlValue> {
        row.iter()
            .enumerate()
            .map(|(i, value)| (self.meta.column_shortname(i).unwrap_or("").to_string(), value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::META_GLOBAL_TABLE_SPEC;
    use crate::types::{TYPE_INT, TYPE_TEXT};

    /// flags=1, one column test.table.column : text, one row "data"
    fn single_row_frame() -> Frame {
        let mut f = Frame::new();
        f.write_int(META_GLOBAL_TABLE_SPEC);
        f.write_int(1);
        f.write_string("test");
        f.write_string("table");
        f.write_string("column");
        f.write_short(TYPE_TEXT);
        f.write_int(1); // n_rows
        f.write_bytes(Some(b"data"));
        f
    }

    #[test]
    fn decode_single_row_result() {
        let mut f = single_row_frame();
        let result = CqlResult::from_frame(&mut f, ProtocolVersion::V1).unwrap();
        assert_eq!(result.rows(), 1);
        assert_eq!(result.columns(), 1);
        assert_eq!(
            result.row_array(0).unwrap(),
            vec![CqlValue::Text("data".into())]
        );
        let hash = result.row_hash(0).unwrap();
        assert_eq!(hash.len(), 1);
        assert_eq!(hash["column"], CqlValue::Text("data".into()));
    }

    fn name_i_result() -> CqlResult {
        CqlResult::new(
            &[("ks", "t", "name", "text"), ("ks", "t", "i", "int")],
            vec![
                vec![CqlValue::Text("zero".into()), CqlValue::Int(0)],
                vec![CqlValue::Text("one".into()), CqlValue::Int(1)],
                vec![CqlValue::Text("two".into()), CqlValue::Int(2)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn rowmap_hash_keys_by_column_value() {
        let result = name_i_result();
        let map = result.rowmap_hash("name").unwrap();
        assert_eq!(map.len(), 3);
        for (name, i) in [("zero", 0), ("one", 1), ("two", 2)] {
            let record = &map[&CqlValue::Text(name.into())];
            assert_eq!(record["name"], CqlValue::Text(name.into()));
            assert_eq!(record["i"], CqlValue::Int(i));
        }
    }

    #[test]
    fn rowmap_array_keys_by_column_index() {
        let result = name_i_result();
        let map = result.rowmap_array(1).unwrap();
        assert_eq!(
            map[&CqlValue::Int(2)],
            vec![CqlValue::Text("two".into()), CqlValue::Int(2)]
        );
    }

    #[test]
    fn rowmap_duplicate_keys_last_writer_wins() {
        let result = CqlResult::new(
            &[("ks", "t", "k", "text"), ("ks", "t", "v", "int")],
            vec![
                vec![CqlValue::Text("dup".into()), CqlValue::Int(1)],
                vec![CqlValue::Text("dup".into()), CqlValue::Int(2)],
            ],
        )
        .unwrap();
        let map = result.rowmap_hash("k").unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&CqlValue::Text("dup".into())]["v"], CqlValue::Int(2));
    }

    #[test]
    fn rows_iterators_cover_all_rows() {
        let result = name_i_result();
        assert_eq!(result.rows_array().count(), 3);
        let hashes: Vec<_> = result.rows_hash().collect();
        assert_eq!(hashes[1]["name"], CqlValue::Text("one".into()));
    }

    #[test]
    fn accessors_return_fresh_clones() {
        let result = name_i_result();
        let mut row = result.row_array(0).unwrap();
        row[0] = CqlValue::Text("mutated".into());
        assert_eq!(
            result.row_array(0).unwrap()[0],
            CqlValue::Text("zero".into())
        );
    }

    #[test]
    fn out_of_range_lookups_fail() {
        let result = name_i_result();
        assert!(matches!(result.row_array(9), Err(CodecError::NoSuchRow(9))));
        assert!(matches!(result.row_hash(9), Err(CodecError::NoSuchRow(9))));
        assert!(matches!(
            result.rowmap_array(5),
            Err(CodecError::NoSuchColumn(_))
        ));
        assert!(matches!(
            result.rowmap_hash("nope"),
            Err(CodecError::NoSuchColumn(_))
        ));
    }

    #[test]
    fn synthetic_rows_are_validated() {
        let err = CqlResult::new(
            &[("ks", "t", "id", "int")],
            vec![vec![CqlValue::Int(0)], vec![CqlValue::Text("x".into())]],
        )
        .unwrap_err();
        match err {
            CodecError::RowValidation { row, column, .. } => {
                assert_eq!(row, 1);
                assert_eq!(column, "id");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn synthetic_rows_accept_nulls() {
        let result = CqlResult::new(
            &[("ks", "t", "id", "int")],
            vec![vec![CqlValue::Null]],
        )
        .unwrap();
        assert_eq!(result.row_array(0).unwrap(), vec![CqlValue::Null]);
    }

    #[test]
    fn row_arity_is_enforced() {
        assert!(matches!(
            CqlResult::new(&[("ks", "t", "id", "int")], vec![vec![]]),
            Err(CodecError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn null_cells_survive_the_wire() {
        let mut f = Frame::new();
        f.write_int(META_GLOBAL_TABLE_SPEC);
        f.write_int(2);
        f.write_string("ks");
        f.write_string("t");
        f.write_string("a");
        f.write_short(TYPE_TEXT);
        f.write_string("b");
        f.write_short(TYPE_INT);
        f.write_int(1);
        f.write_bytes(None);
        f.write_bytes(Some(&1i32.to_be_bytes()));
        let result = CqlResult::from_frame(&mut f, ProtocolVersion::V1).unwrap();
        assert_eq!(
            result.row_array(0).unwrap(),
            vec![CqlValue::Null, CqlValue::Int(1)]
        );
    }

    #[test]
    fn every_row_matches_column_count() {
        let mut f = single_row_frame();
        let result = CqlResult::from_frame(&mut f, ProtocolVersion::V1).unwrap();
        for row in result.rows_array() {
            assert_eq!(row.len(), result.columns());
        }
    }
}
