/// Table and I/O error.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("column '{name}' has {got} values, table has {expected} rows")]
    ColumnLength {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("column not found: {0}")]
    MissingColumn(String),
}
