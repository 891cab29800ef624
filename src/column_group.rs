/// A named, ordered list of column names, plus (for `BATCH_INSERT_*`
/// macros) the number of VALUES tuples to emit.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnGroup {
    pub group: String,
    pub columns: Vec<String>,
    pub batch_insert_rows_count: usize,
}

impl ColumnGroup {
    pub fn new(group: impl Into<String>, columns: Vec<String>) -> Self {
        ColumnGroup {
            group: group.into(),
            columns,
            batch_insert_rows_count: 0,
        }
    }

    pub fn with_batch_rows(mut self, rows_count: usize) -> Self {
        self.batch_insert_rows_count = rows_count;
        self
    }
}

/// One argument to [`crate::translator::translate`]: either a bare column
/// name (implicitly appended to the `"COLUMNS"` group) or a fully formed
/// [`ColumnGroup`] (used for named groups and `BATCH_INSERT_*` row counts).
///
/// This is the strongly typed replacement for the original's heterogeneous
/// `...interface{}` translator arguments: what was a runtime type-sniff
/// there is a closed enum match here, so a malformed argument is a compile
/// error instead of a translator failure mode.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnArg {
    Column(String),
    Group(ColumnGroup),
}

impl From<&str> for ColumnArg {
    fn from(name: &str) -> Self {
        ColumnArg::Column(name.to_string())
    }
}

impl From<String> for ColumnArg {
    fn from(name: String) -> Self {
        ColumnArg::Column(name)
    }
}

impl From<ColumnGroup> for ColumnArg {
    fn from(group: ColumnGroup) -> Self {
        ColumnArg::Group(group)
    }
}

/// Convenience constructor for a `BATCH_INSERT_COLUMNS` argument list,
/// mirroring the original's `BatchInsertColumns(rowsCount, columns...)`
/// helper.
pub fn batch_insert_columns(rows_count: usize, columns: &[&str]) -> ColumnArg {
    ColumnArg::Group(
        ColumnGroup::new(
            "COLUMNS",
            columns.iter().map(|c| c.to_string()).collect(),
        )
        .with_batch_rows(rows_count),
    )
}
