use crate::column_group::ColumnArg;
use crate::driver::{ConnectionHandle, ExecResult, TxHandle};
use crate::error::{Error, Result};
use crate::rows::Rows;
use crate::statement::Statement;
use crate::translator::translate;
use crate::value::Value;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Installed by [`crate::pool::Pool`] on connections it hands out, so a
/// plain `Connection::close()` call can be routed back into the pool's
/// borrow/release bookkeeping instead of tearing down the raw driver
/// connection.
pub(crate) type CloseHook = Arc<dyn Fn(Connection) -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct ConnState {
    active_query: Option<(String, Vec<Value>)>,
    tx: Option<Box<dyn TxHandle>>,
    last_error: Option<String>,
}

struct Inner {
    handle: Box<dyn ConnectionHandle>,
    state: Mutex<ConnState>,
    close_hook: Option<CloseHook>,
}

/// A logical database connection: a driver handle plus the bookkeeping this
/// layer adds on top of it (the single-active-query guard, the current
/// transaction if any, the last driver error, and an optional close hook
/// used by the pool).
///
/// Cheap to clone (an `Arc` handle); not safe for concurrent use by more
/// than one logical actor at a time.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    pub fn new(handle: Box<dyn ConnectionHandle>) -> Self {
        log::debug!("sqlxx: connection opened");
        Connection {
            inner: Arc::new(Inner {
                handle,
                state: Mutex::new(ConnState {
                    active_query: None,
                    tx: None,
                    last_error: None,
                }),
                close_hook: None,
            }),
        }
    }

    pub(crate) fn with_close_hook(handle: Box<dyn ConnectionHandle>, hook: CloseHook) -> Self {
        log::debug!("sqlxx: pooled connection opened");
        Connection {
            inner: Arc::new(Inner {
                handle,
                state: Mutex::new(ConnState {
                    active_query: None,
                    tx: None,
                    last_error: None,
                }),
                close_hook: Some(hook),
            }),
        }
    }

    pub(crate) fn handle(&self) -> &dyn ConnectionHandle {
        self.inner.handle.as_ref()
    }

    /// Runs `sql` through the driver's direct execute path with no
    /// translation or caching — the one-shot convenience wrapper used for
    /// statements that are executed exactly once.
    pub async fn exec(&self, sql: &str, args: &[Value]) -> Result<Box<dyn ExecResult>> {
        let result = self.inner.handle.exec(sql, args).await;
        self.record_outcome(&result).await;
        result.map_err(|e| wrap_driver_error(e, sql, args))
    }

    /// Runs `sql` through the driver's direct query path, enforcing the
    /// single-active-query guard.
    pub async fn query(&self, sql: &str, args: &[Value]) -> Result<Rows> {
        self.check_active_query(sql, args).await?;
        let result = self.inner.handle.query(sql, args).await;
        self.record_outcome(&result).await;
        let handle = result.map_err(|e| wrap_driver_error(e, sql, args))?;
        self.set_active_query(sql, args).await;
        Ok(Rows::new(handle, self.clone()))
    }

    /// Fails with `Error::ConcurrentQuery` if a `Rows` is already open on
    /// this connection. Shared by the direct query path above and by
    /// [`crate::statement::Statement`]'s prepared-statement query path.
    pub(crate) async fn check_active_query(&self, sql: &str, args: &[Value]) -> Result<()> {
        let state = self.inner.state.lock().await;
        if let Some((active_sql, active_args)) = &state.active_query {
            return Err(Error::ConcurrentQuery {
                sql: active_sql.clone(),
                args: active_args.clone(),
            });
        }
        let _ = (sql, args);
        Ok(())
    }

    pub(crate) async fn set_active_query(&self, sql: &str, args: &[Value]) {
        let mut state = self.inner.state.lock().await;
        state.active_query = Some((sql.to_string(), args.to_vec()));
    }

    /// Translates `template` against `args` and binds the result to this
    /// connection. The returned [`Statement`] may be reused for many
    /// executions.
    pub fn translate_statement<I, A>(&self, template: &str, args: I) -> Result<Statement>
    where
        I: IntoIterator<Item = A>,
        A: Into<ColumnArg>,
    {
        let translated = translate(template, args)?;
        Ok(Statement::new(self.clone(), Arc::new(translated)))
    }

    pub async fn begin_tx(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if state.tx.is_some() {
            return Err(Error::programmer("nested transactions are not supported"));
        }
        state.tx = Some(self.inner.handle.begin().await?);
        Ok(())
    }

    pub async fn commit_tx(&self) -> Result<()> {
        let tx = {
            let mut state = self.inner.state.lock().await;
            state.tx.take()
        };
        match tx {
            Some(tx) => tx.commit().await,
            None => Err(Error::programmer("commit_tx called with no open transaction")),
        }
    }

    pub async fn rollback_tx(&self) -> Result<()> {
        let tx = {
            let mut state = self.inner.state.lock().await;
            state.tx.take()
        };
        match tx {
            Some(tx) => tx.rollback().await,
            None => Err(Error::programmer("rollback_tx called with no open transaction")),
        }
    }

    pub async fn last_error(&self) -> Option<String> {
        self.inner.state.lock().await.last_error.clone()
    }

    pub(crate) async fn clear_active_query(&self) {
        self.inner.state.lock().await.active_query = None;
    }

    /// Best-effort, non-blocking variant used from `Drop`, where `.await` is
    /// unavailable. If the lock is contended the guard is left set; the
    /// next explicit `Rows::close` call clears it normally.
    pub(crate) fn clear_active_query_blocking(&self) {
        if let Ok(mut state) = self.inner.state.try_lock() {
            state.active_query = None;
        }
    }

    pub(crate) async fn note_exec_outcome<T>(&self, result: &Result<T>) {
        self.record_outcome(result).await
    }

    async fn record_outcome<T>(&self, result: &Result<T>) {
        if let Err(e) = result {
            log::error!("sqlxx: driver error: {e}");
            let mut state = self.inner.state.lock().await;
            state.last_error = Some(e.to_string());
        }
    }

    /// Closes the connection. If a close hook is installed (pool-owned
    /// connections), the hook decides whether to recycle or release;
    /// otherwise the raw driver connection is closed directly.
    pub async fn close(&self) -> Result<()> {
        log::debug!("sqlxx: closing connection");
        match &self.inner.close_hook {
            Some(hook) => hook(self.clone()).await,
            None => self.inner.handle.close().await,
        }
    }

    /// Closes the underlying driver connection unconditionally, bypassing
    /// any close hook. Used by the pool itself to discard tainted or
    /// overflowed connections.
    pub(crate) async fn close_raw(&self) -> Result<()> {
        self.inner.handle.close().await
    }
}

/// Wraps a raw driver failure as `Error::Driver { source, sql, args }`,
/// carrying the formatted SQL and exec args the call was made with — the
/// diagnostic wrapping SPEC_FULL §4.2/§7 assigns to the Statement/Connection
/// layer rather than to driver implementors. An error that is already
/// `Error::Driver` (e.g. bubbled up from a nested call) is passed through
/// unchanged instead of being nested again.
pub(crate) fn wrap_driver_error(e: Error, sql: &str, args: &[Value]) -> Error {
    match e {
        Error::Driver { .. } => e,
        other => Error::driver(other, sql, args.to_vec()),
    }
}
