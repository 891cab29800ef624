use crate::batch::Batch;
use crate::config::Config;
use crate::connection::Connection;
use crate::driver::RowsHandle;
use crate::error::{Error, Result};
use crate::value::Value;
use chrono::{FixedOffset, NaiveDateTime, TimeZone};
use indexmap::IndexMap;

/// The fixed UTC+8 offset [`parse_time`] assumes a textual timestamp is
/// expressed in, when a driver hands back a string instead of a typed time
/// value. Stands in for the IANA `Asia/Shanghai` default the original
/// resolves through the host tz database; a dependency-free target has no tz
/// database to bind to, so the fixed offset that zone actually observes (it
/// does not use DST) is applied directly, and the parsed local time is
/// normalised to UTC before being handed back.
pub fn default_offset() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).expect("valid fixed offset")
}

/// A single-owner cursor over a query's result rows. At most one `Rows` may
/// be open on a given [`Connection`] at a time; `close` (or `Drop`,
/// best-effort) releases that connection's single-active-query guard.
pub struct Rows {
    handle: Box<dyn RowsHandle>,
    columns: IndexMap<String, usize>,
    scratch: Vec<Value>,
    conn: Connection,
    closed: bool,
}

impl Rows {
    pub(crate) fn new(handle: Box<dyn RowsHandle>, conn: Connection) -> Self {
        let mut columns = IndexMap::new();
        for (i, name) in handle.columns().iter().enumerate() {
            columns.insert(name.clone(), i);
        }
        let scratch = vec![Value::Null; columns.len()];
        Rows {
            handle,
            columns,
            scratch,
            conn,
            closed: false,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|s| s.as_str())
    }

    /// Resolves a column name to its index, the way `rows.C("name")` is
    /// typically cached once and reused across many `rows.Get(idx)` calls.
    pub fn c(&self, name: &str) -> Result<usize> {
        self.columns
            .get(name)
            .copied()
            .ok_or_else(|| Error::programmer(format!("unknown column {name:?}")))
    }

    /// Advances to the next row. Returns `Error::EndOfRows` once exhausted.
    pub async fn next(&mut self) -> Result<()> {
        self.handle.next(&mut self.scratch).await
    }

    /// Returns the raw value at `index`, except that a byte slice is copied
    /// into an owned string so the caller is decoupled from buffer reuse
    /// inside the driver.
    pub fn get(&self, index: usize) -> Value {
        match &self.scratch[index] {
            Value::Bytes(b) => Value::Str(String::from_utf8_lossy(b).into_owned()),
            other => other.clone(),
        }
    }

    pub fn get_by_name(&self, name: &str) -> Result<Value> {
        Ok(self.get(self.c(name)?))
    }

    pub fn get_string(&self, index: usize) -> Result<String> {
        match &self.scratch[index] {
            Value::Str(s) => Ok(s.clone()),
            Value::Bytes(b) => Ok(String::from_utf8_lossy(b).into_owned()),
            other => Err(Error::programmer(format!(
                "column {index} is not a string-like value: {other:?}"
            ))),
        }
    }

    pub fn get_int64(&self, index: usize) -> Result<i64> {
        let parse = |s: &str| -> Result<i64> {
            if s.is_empty() {
                Ok(0)
            } else {
                s.parse::<i64>()
                    .map_err(|_| Error::programmer(format!("cannot parse {s:?} as int64")))
            }
        };
        match &self.scratch[index] {
            Value::Int64(i) => Ok(*i),
            Value::Str(s) => parse(s),
            Value::Bytes(b) => parse(&String::from_utf8_lossy(b)),
            other => Err(Error::programmer(format!(
                "column {index} is not numeric: {other:?}"
            ))),
        }
    }

    pub fn get_int(&self, index: usize) -> Result<i32> {
        Ok(self.get_int64(index)? as i32)
    }

    pub fn get_time(&self, index: usize) -> Result<NaiveDateTime> {
        match &self.scratch[index] {
            Value::Time(t) => Ok(*t),
            Value::Str(s) => parse_time(s),
            Value::Bytes(b) => parse_time(&String::from_utf8_lossy(b)),
            other => Err(Error::programmer(format!(
                "column {index} is not a time value: {other:?}"
            ))),
        }
    }

    /// Bulk-materialise up to `max_to_read` rows into `batch`'s per-column
    /// typed arrays, reusing existing backing arrays when they are already
    /// large enough.
    ///
    /// The first row read is attempted before anything else; if that read
    /// fails (including end-of-rows), the failure is returned as-is with
    /// `batch.len() == 0`. Only exhaustion discovered by the fill loop that
    /// follows is translated into a successful, short batch.
    pub async fn next_batch(&mut self, batch: &mut Batch, max_to_read: usize) -> Result<()> {
        batch.set_len(0);
        self.next().await?;

        let column_names: Vec<String> = self.columns.keys().cloned().collect();
        batch.ensure_readers(&column_names, &self.scratch, max_to_read)?;
        batch.write_row(0, &self.scratch)?;

        let mut written = 1;
        while written < max_to_read {
            match self.next().await {
                Ok(()) => {
                    batch.write_row(written, &self.scratch)?;
                    written += 1;
                }
                Err(e) if e.is_end_of_rows() => break,
                Err(e) => {
                    batch.set_len(written);
                    return Err(e);
                }
            }
        }
        batch.set_len(written);
        Ok(())
    }

    /// Same as [`Rows::next_batch`], but reads `config.default_batch_size`
    /// rows instead of taking an explicit `max_to_read` — the ambient
    /// configuration surface described in SPEC_FULL §6/§10.
    pub async fn next_batch_with_config(&mut self, batch: &mut Batch, config: &Config) -> Result<()> {
        self.next_batch(batch, config.default_batch_size).await
    }

    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.conn.clear_active_query().await;
        self.handle.close().await
    }
}

/// Parses `YYYY-MM-DD HH:MM:SS`, treating it as local time in
/// [`default_offset`] and normalising the result to UTC so timestamps parsed
/// from driver-supplied text are comparable with ones read as a native
/// `Value::Time`.
fn parse_time(s: &str) -> Result<NaiveDateTime> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map_err(|_| Error::programmer(format!("cannot parse {s:?} as a timestamp")))?;
    Ok(default_offset()
        .from_local_datetime(&naive)
        .single()
        .expect("a fixed offset has no DST ambiguity")
        .naive_utc())
}

impl Drop for Rows {
    fn drop(&mut self) {
        if !self.closed {
            self.conn.clear_active_query_blocking();
        }
    }
}
