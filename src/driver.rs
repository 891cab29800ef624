use crate::error::Result;
use crate::value::Value;
use async_trait::async_trait;

/// The result of a non-query execution (`INSERT`/`UPDATE`/`DELETE`).
pub trait ExecResult: Send + Sync {
    fn rows_affected(&self) -> u64;
}

/// A row cursor handed back by a driver. This crate never talks to a wire
/// protocol directly; everything downstream of the driver speaks only this
/// trait (and [`StatementHandle`] / [`ConnectionHandle`] / [`Driver`]),
/// which keeps the translator, binder, and batch-reading logic testable
/// against an in-memory fake (see `testutil`).
#[async_trait]
pub trait RowsHandle: Send {
    /// Column names, in result-set order.
    fn columns(&self) -> &[String];

    /// Fill `scratch` (one slot per column, reused across calls) with the
    /// next row. Returns `Error::EndOfRows` once the cursor is exhausted.
    async fn next(&mut self, scratch: &mut [Value]) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

/// A prepared statement cached by a [`crate::statement::Statement`].
#[async_trait]
pub trait StatementHandle: Send + Sync {
    async fn exec(&self, args: &[Value]) -> Result<Box<dyn ExecResult>>;
    async fn query(&self, args: &[Value]) -> Result<Box<dyn RowsHandle>>;
    async fn close(&self) -> Result<()>;
}

/// An open transaction on a [`ConnectionHandle`].
#[async_trait]
pub trait TxHandle: Send + Sync {
    async fn commit(&self) -> Result<()>;
    async fn rollback(&self) -> Result<()>;
}

/// A single logical connection to a database, as seen by this crate. One
/// actor at a time; see the single-active-query guard in
/// [`crate::connection::Connection`].
#[async_trait]
pub trait ConnectionHandle: Send + Sync {
    async fn prepare(&self, sql: &str) -> Result<Box<dyn StatementHandle>>;

    /// Direct (non-prepared) execute path, used when a statement is bound
    /// with `.prepared(false)`.
    async fn exec(&self, sql: &str, args: &[Value]) -> Result<Box<dyn ExecResult>>;

    /// Direct (non-prepared) query path.
    async fn query(&self, sql: &str, args: &[Value]) -> Result<Box<dyn RowsHandle>>;

    async fn begin(&self) -> Result<Box<dyn TxHandle>>;

    async fn close(&self) -> Result<()>;
}

/// Opens connections against a DSN. Implemented once per backend (postgres,
/// mysql, sqlite, ...); this crate ships a deterministic fake for tests
/// (`testutil::FakeDriver`) rather than a real backend implementation.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn open(&self, dsn: &str) -> Result<Box<dyn ConnectionHandle>>;
}
