//! A thin, named-parameter SQL client layer: template translation with
//! column-group macros, prepared-statement-cached execution through a
//! pluggable driver collaborator, columnar batch reads, and a small bounded
//! connection pool.
//!
//! See [`translator::translate`] for the template language,
//! [`connection::Connection`] and [`statement::Statement`] for execution,
//! [`rows::Rows`] / [`batch::Batch`] for reading results, and [`pool::Pool`]
//! for connection pooling.

pub mod batch;
pub mod column_group;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod pool;
pub mod rows;
pub mod statement;
pub mod translator;
pub mod value;

#[cfg(test)]
mod testutil;

pub use batch::Batch;
pub use column_group::{batch_insert_columns, ColumnArg, ColumnGroup};
pub use config::Config;
pub use connection::Connection;
pub use driver::{ConnectionHandle, Driver, ExecResult, RowsHandle, StatementHandle, TxHandle};
pub use error::{Error, Result};
pub use pool::Pool;
pub use rows::Rows;
pub use statement::{Binder, Statement};
pub use translator::{translate, TranslatedSql};
pub use value::Value;
