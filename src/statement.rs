use crate::connection::{wrap_driver_error, Connection};
use crate::driver::{ExecResult, StatementHandle};
use crate::error::{Error, Result};
use crate::rows::Rows;
use crate::translator::TranslatedSql;
use crate::value::Value;
use indexmap::IndexMap;
use std::sync::Arc;
use tokio::sync::Mutex;

fn debug_tracing_enabled() -> bool {
    std::env::var("SQLXX_DEBUG").map(|v| v == "true").unwrap_or(false)
}

fn trace(sql: &str, args: &[Value]) {
    if debug_tracing_enabled() {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        eprintln!("[{now}] sqlxx: {sql} args={args:?}");
    }
}

/// Substitutes each `%v` token in `sql`, in left-to-right order, with the
/// `Display` rendering of the corresponding entry of `str_args`.
fn format_sql(sql: &str, str_args: &[Value]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    let mut idx = 0;
    while let Some(pos) = rest.find("%v") {
        out.push_str(&rest[..pos]);
        out.push_str(&str_args[idx].to_string());
        idx += 1;
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

/// A translated template bound to a [`Connection`], with its own
/// prepared-statement cache keyed by formatted SQL. Reusable across many
/// executions; closes every prepared statement it created when dropped via
/// [`Statement::close`].
pub struct Statement {
    conn: Connection,
    translated: Arc<TranslatedSql>,
    cache: Mutex<IndexMap<String, Arc<dyn StatementHandle>>>,
}

impl Statement {
    pub(crate) fn new(conn: Connection, translated: Arc<TranslatedSql>) -> Self {
        Statement {
            conn,
            translated,
            cache: Mutex::new(IndexMap::new()),
        }
    }

    pub fn translated(&self) -> &TranslatedSql {
        &self.translated
    }

    pub fn bind(&self) -> Binder<'_> {
        Binder {
            stmt: self,
            mode: Mode::Unset,
            prepared: true,
        }
    }

    async fn prepared_handle(&self, formatted_sql: &str) -> Result<Arc<dyn StatementHandle>> {
        let mut cache = self.cache.lock().await;
        if let Some(handle) = cache.get(formatted_sql) {
            return Ok(handle.clone());
        }
        log::debug!("sqlxx: preparing statement for {formatted_sql:?}");
        let handle: Arc<dyn StatementHandle> =
            Arc::from(self.conn.handle().prepare(formatted_sql).await?);
        cache.insert(formatted_sql.to_string(), handle.clone());
        Ok(handle)
    }

    /// Closes every prepared statement cached by this `Statement`. Does not
    /// close the underlying `Connection`.
    pub async fn close(&self) -> Result<()> {
        let mut cache = self.cache.lock().await;
        for (_, handle) in cache.drain(..) {
            handle.close().await?;
        }
        Ok(())
    }
}

enum Mode {
    Unset,
    Scalar(IndexMap<String, Value>),
    Row(Vec<Vec<(String, Value)>>),
}

/// Accumulates bindings for one execution of a [`Statement`], then executes
/// via `.exec()` or `.query()`.
///
/// Replaces the original's variadic, runtime-typed argument list
/// (`"ROW"`/`"PREPARED"` magic names, bare `(name, value)` pairs) with a
/// builder whose scalar and row-binding modes are mutually exclusive and
/// checked as they're used.
pub struct Binder<'a> {
    stmt: &'a Statement,
    mode: Mode,
    prepared: bool,
}

impl<'a> Binder<'a> {
    /// Binds a single named parameter. Scalar mode only; mixing with
    /// `.row()` is a programmer error.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        let map = match &mut self.mode {
            Mode::Unset => {
                self.mode = Mode::Scalar(IndexMap::new());
                match &mut self.mode {
                    Mode::Scalar(m) => m,
                    _ => unreachable!(),
                }
            }
            Mode::Scalar(m) => m,
            Mode::Row(_) => {
                return Err(Error::programmer(
                    "cannot call .param() after .row() on the same binder",
                ))
            }
        };
        map.insert(name.into(), value.into());
        Ok(self)
    }

    /// Binds one VALUES tuple of a `BATCH_INSERT_*` template. Row mode
    /// only; mixing with `.param()` is a programmer error. Rows are
    /// numbered in call order.
    pub fn row(mut self, bindings: Vec<(&str, Value)>) -> Result<Self> {
        let rows = match &mut self.mode {
            Mode::Unset => {
                self.mode = Mode::Row(Vec::new());
                match &mut self.mode {
                    Mode::Row(r) => r,
                    _ => unreachable!(),
                }
            }
            Mode::Row(r) => r,
            Mode::Scalar(_) => {
                return Err(Error::programmer(
                    "cannot call .row() after .param() on the same binder",
                ))
            }
        };
        rows.push(
            bindings
                .into_iter()
                .map(|(n, v)| (n.to_string(), v))
                .collect(),
        );
        Ok(self)
    }

    /// Bulk-binds every scalar parameter whose name matches a column in
    /// `rows`'s current row. Columns with no matching parameter name are
    /// ignored. Scalar mode only.
    pub fn from_row(mut self, rows: &Rows) -> Result<Self> {
        let map = match &mut self.mode {
            Mode::Unset => {
                self.mode = Mode::Scalar(IndexMap::new());
                match &mut self.mode {
                    Mode::Scalar(m) => m,
                    _ => unreachable!(),
                }
            }
            Mode::Scalar(m) => m,
            Mode::Row(_) => {
                return Err(Error::programmer(
                    "cannot call .from_row() after .row() on the same binder",
                ))
            }
        };
        for name in rows.columns() {
            if self.stmt.translated.param_map.contains_key(name) {
                map.insert(name.to_string(), rows.get_by_name(name)?);
            }
        }
        Ok(self)
    }

    /// Overrides the default prepared-statement execution path. When
    /// `false`, the formatted SQL is sent through the connection's direct
    /// (non-prepared) execute/query entry point instead.
    pub fn prepared(mut self, prepared: bool) -> Self {
        self.prepared = prepared;
        self
    }

    fn build_args(&self) -> Result<Vec<Value>> {
        let ts = &self.stmt.translated;
        let mut args = vec![Value::Null; ts.total_param_count];
        match &self.mode {
            Mode::Unset => {}
            Mode::Scalar(map) => {
                for (name, value) in map {
                    let positions = ts.positions(name).ok_or_else(|| {
                        Error::programmer(format!("unknown parameter {name:?}"))
                    })?;
                    for &p in positions {
                        args[p] = value.clone();
                    }
                }
            }
            Mode::Row(rows) => {
                for (r, bindings) in rows.iter().enumerate() {
                    for (name, value) in bindings {
                        let positions = ts.positions(name).ok_or_else(|| {
                            Error::programmer(format!("unknown parameter {name:?}"))
                        })?;
                        let pos = positions.get(r).ok_or_else(|| {
                            Error::programmer(format!(
                                "row {r} has no position recorded for parameter {name:?} \
                                 (template declares {} rows)",
                                positions.len()
                            ))
                        })?;
                        args[*pos] = value.clone();
                    }
                }
            }
        }
        Ok(args)
    }

    fn format(&self) -> Result<(String, Vec<Value>)> {
        let ts = &self.stmt.translated;
        let args = self.build_args()?;
        let (str_args, bound_args) = args.split_at(ts.str_param_count);
        let sql = if ts.str_param_count > 0 {
            format_sql(&ts.sql, str_args)
        } else {
            ts.sql.clone()
        };
        Ok((sql, bound_args.to_vec()))
    }

    pub async fn exec(self) -> Result<Box<dyn ExecResult>> {
        let (sql, args) = self.format()?;
        trace(&sql, &args);
        log::debug!("sqlxx: exec {sql:?}");
        if self.prepared {
            let prepare_result = self.stmt.prepared_handle(&sql).await;
            self.stmt.conn.note_exec_outcome(&prepare_result).await;
            let handle = prepare_result.map_err(|e| wrap_driver_error(e, &sql, &args))?;
            let result = handle.exec(&args).await;
            self.stmt.conn.note_exec_outcome(&result).await;
            result.map_err(|e| wrap_driver_error(e, &sql, &args))
        } else {
            self.stmt.conn.exec(&sql, &args).await
        }
    }

    pub async fn query(self) -> Result<Rows> {
        let (sql, args) = self.format()?;
        trace(&sql, &args);
        log::debug!("sqlxx: query {sql:?}");
        if self.prepared {
            self.stmt.conn.check_active_query(&sql, &args).await?;
            let prepare_result = self.stmt.prepared_handle(&sql).await;
            self.stmt.conn.note_exec_outcome(&prepare_result).await;
            let handle = prepare_result.map_err(|e| wrap_driver_error(e, &sql, &args))?;
            let rows_handle = handle.query(&args).await;
            self.stmt.conn.note_exec_outcome(&rows_handle).await;
            let rows_handle = rows_handle.map_err(|e| wrap_driver_error(e, &sql, &args))?;
            self.stmt.conn.set_active_query(&sql, &args).await;
            Ok(Rows::new(rows_handle, self.stmt.conn.clone()))
        } else {
            self.stmt.conn.query(&sql, &args).await
        }
    }
}
