use crate::error::{Error, Result};
use crate::value::Value;
use indexmap::IndexMap;

/// A column's reusable backing storage. The element type is chosen from the
/// first row read into a given [`Batch`] and is expected to stay stable for
/// the lifetime of that batch's use against one cursor.
enum Column {
    Str(Vec<String>),
    Int64(Vec<i64>),
}

impl Column {
    fn capacity_rows(&self) -> usize {
        match self {
            Column::Str(v) => v.len(),
            Column::Int64(v) => v.len(),
        }
    }
}

/// A columnar, reusable buffer that [`crate::rows::Rows::next_batch`] fills.
/// Backing arrays are kept across calls and only reallocated when a larger
/// `max_to_read` demands it, so repeated batch reads against the same
/// `Batch` avoid per-batch allocation.
#[derive(Default)]
pub struct Batch {
    len: usize,
    columns: IndexMap<String, Column>,
}

impl Batch {
    pub fn new() -> Self {
        Batch {
            len: 0,
            columns: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|s| s.as_str())
    }

    pub(crate) fn set_len(&mut self, len: usize) {
        self.len = len;
    }

    /// Allocates or reuses one typed array per column, based on the value
    /// variant observed in `scratch` (the just-read first row of a batch).
    pub(crate) fn ensure_readers(
        &mut self,
        column_names: &[String],
        scratch: &[Value],
        max_to_read: usize,
    ) -> Result<()> {
        for (i, name) in column_names.iter().enumerate() {
            match &scratch[i] {
                Value::Str(_) | Value::Bytes(_) => {
                    let reuse = matches!(self.columns.get(name), Some(Column::Str(v)) if v.capacity_rows() >= max_to_read);
                    if !reuse {
                        self.columns
                            .insert(name.clone(), Column::Str(vec![String::new(); max_to_read]));
                    }
                }
                Value::Int64(_) => {
                    let reuse = matches!(self.columns.get(name), Some(Column::Int64(v)) if v.capacity_rows() >= max_to_read);
                    if !reuse {
                        self.columns
                            .insert(name.clone(), Column::Int64(vec![0i64; max_to_read]));
                    }
                }
                other => return Err(Error::UnsupportedBatchColumnType(other.clone())),
            }
        }
        Ok(())
    }

    /// Writes one row into every column's backing array. `scratch` must be
    /// in the same column order `ensure_readers` was called with.
    pub(crate) fn write_row(&mut self, row: usize, scratch: &[Value]) -> Result<()> {
        for (i, column) in self.columns.values_mut().enumerate() {
            match (column, &scratch[i]) {
                (Column::Str(arr), Value::Str(s)) => arr[row] = s.clone(),
                (Column::Str(arr), Value::Bytes(b)) => {
                    arr[row] = String::from_utf8_lossy(b).into_owned()
                }
                (Column::Int64(arr), Value::Int64(v)) => arr[row] = *v,
                (_, other) => {
                    return Err(Error::programmer(format!(
                        "batch column type changed mid-batch: {other:?}"
                    )))
                }
            }
        }
        Ok(())
    }

    fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .get(name)
            .ok_or_else(|| Error::programmer(format!("unknown batch column {name:?}")))
    }

    pub fn get_string(&self, row: usize, name: &str) -> Result<&str> {
        match self.column(name)? {
            Column::Str(arr) => Ok(arr[row].as_str()),
            Column::Int64(_) => Err(Error::programmer(format!("column {name:?} is not a string column"))),
        }
    }

    pub fn get_int64(&self, row: usize, name: &str) -> Result<i64> {
        match self.column(name)? {
            Column::Int64(arr) => Ok(arr[row]),
            Column::Str(_) => Err(Error::programmer(format!("column {name:?} is not an int64 column"))),
        }
    }

    pub fn get_int(&self, row: usize, name: &str) -> Result<i32> {
        Ok(self.get_int64(row, name)? as i32)
    }

    pub fn get_string_column(&self, name: &str) -> Result<&[String]> {
        match self.column(name)? {
            Column::Str(arr) => Ok(&arr[..self.len]),
            Column::Int64(_) => Err(Error::programmer(format!("column {name:?} is not a string column"))),
        }
    }

    pub fn get_int64_column(&self, name: &str) -> Result<&[i64]> {
        match self.column(name)? {
            Column::Int64(arr) => Ok(&arr[..self.len]),
            Column::Str(_) => Err(Error::programmer(format!("column {name:?} is not an int64 column"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_existing_array_when_large_enough() {
        let mut batch = Batch::new();
        let scratch = vec![Value::Str("010".into())];
        let names = vec!["district".to_string()];
        batch.ensure_readers(&names, &scratch, 5).unwrap();
        let ptr_before = match batch.columns.get("district").unwrap() {
            Column::Str(v) => v.as_ptr(),
            _ => unreachable!(),
        };
        batch.ensure_readers(&names, &scratch, 3).unwrap();
        let ptr_after = match batch.columns.get("district").unwrap() {
            Column::Str(v) => v.as_ptr(),
            _ => unreachable!(),
        };
        assert_eq!(ptr_before, ptr_after);
    }
}
