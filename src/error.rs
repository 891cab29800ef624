use crate::value::Value;
use thiserror::Error;

/// The error type returned by every fallible operation in this crate.
///
/// Variants fall into the handful of kinds this layer actually needs to
/// distinguish: mistakes made by the caller (`Programmer`), failures
/// surfaced by the underlying driver (`Driver`), the row-cursor sentinel
/// (`EndOfRows`), pool exhaustion, and the single-active-cursor guard.
#[derive(Debug, Error)]
pub enum Error {
    /// Misuse of the API: unknown column group, unknown parameter name,
    /// an uppercase-led parameter name, mixing scalar and row bind modes,
    /// an unconvertible value passed to a typed getter, and similar.
    /// Not retryable; callers should propagate with `?`.
    #[error("{0}")]
    Programmer(String),

    /// A driver-level failure (prepare, exec, query). Carries the
    /// formatted SQL and bound arguments for diagnostics.
    #[error("driver error executing {sql:?} with args {args:?}: {source}")]
    Driver {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        sql: String,
        args: Vec<Value>,
    },

    /// The row cursor has no more rows. Matched by variant, never by
    /// substring, anywhere this crate inspects it.
    #[error("end of rows")]
    EndOfRows,

    /// `Pool::borrow` was called when the pool was already at capacity.
    #[error("too many concurrent connections")]
    TooManyConcurrentConnections,

    /// `Connection::query` was called while a previous `Rows` on the same
    /// connection had not yet been closed.
    #[error("concurrent query on the same connection: {sql:?} with args {args:?} is still open")]
    ConcurrentQuery { sql: String, args: Vec<Value> },

    /// `Rows::next_batch` observed a column value variant it has no typed
    /// reader for.
    #[error("unsupported column type for batch reads: {0:?}")]
    UnsupportedBatchColumnType(Value),
}

impl Error {
    pub fn programmer(msg: impl Into<String>) -> Self {
        Error::Programmer(msg.into())
    }

    pub fn driver(
        source: impl std::error::Error + Send + Sync + 'static,
        sql: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Error::Driver {
            source: Box::new(source),
            sql: sql.into(),
            args,
        }
    }

    /// True for `EndOfRows`; the one variant callers routinely expect and
    /// loop on rather than treat as a failure.
    pub fn is_end_of_rows(&self) -> bool {
        matches!(self, Error::EndOfRows)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
