/// All errors that can be returned by a `RowStore` implementation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    /// Conditional update lost: the row's version moved since it was read.
    #[error(
        "concurrent conflict on {table}/{id}: expected version {expected_version}, found {actual_version}"
    )]
    ConcurrentConflict {
        table: String,
        id: String,
        expected_version: i64,
        actual_version: i64,
    },

    /// No row with the given id.
    #[error("row not found: {table}/{id}")]
    RowNotFound { table: String, id: String },

    /// A row with this id already exists.
    #[error("row already exists: {table}/{id}")]
    AlreadyExists { table: String, id: String },

    /// The table only accepts inserts.
    #[error("table {table} is append-only")]
    AppendOnly { table: String },

    /// The row is missing a required column or has the wrong shape.
    #[error("invalid row for {table}: {message}")]
    InvalidRow { table: String, message: String },

    /// The backend could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A backend-specific storage error (connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
