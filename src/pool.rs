use crate::config::Config;
use crate::connection::{CloseHook, Connection};
use crate::driver::Driver;
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

struct PoolInner {
    driver: Arc<dyn Driver>,
    dsn: String,
    capacity: usize,
    live_count: AtomicUsize,
    idle_tx: mpsc::Sender<Connection>,
    idle_rx: Mutex<mpsc::Receiver<Connection>>,
}

/// A bounded, lazily-growing pool of connections. `borrow` never blocks: it
/// either hands back an idle connection, opens a fresh one if the pool is
/// under capacity, or fails immediately with
/// [`Error::TooManyConcurrentConnections`].
///
/// The idle queue is a non-blocking-try channel (`tokio::sync::mpsc`'s
/// bounded sender/receiver, used with `try_send`/`try_recv` only) — the
/// direct analogue of a buffered channel used with `select`/`default`.
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    pub fn new(driver: Arc<dyn Driver>, dsn: impl Into<String>, capacity: usize) -> Self {
        let (idle_tx, idle_rx) = mpsc::channel(capacity.max(1));
        Pool {
            inner: Arc::new(PoolInner {
                driver,
                dsn: dsn.into(),
                capacity,
                live_count: AtomicUsize::new(0),
                idle_tx,
                idle_rx: Mutex::new(idle_rx),
            }),
        }
    }

    /// Builds a pool whose capacity is `config.pool_capacity`, the ambient
    /// configuration surface described in SPEC_FULL §6.
    pub fn from_config(driver: Arc<dyn Driver>, dsn: impl Into<String>, config: &Config) -> Self {
        Pool::new(driver, dsn, config.pool_capacity)
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn live_count(&self) -> usize {
        self.inner.live_count.load(Ordering::SeqCst)
    }

    /// Borrows a connection: an idle one if available, otherwise a freshly
    /// opened one if the pool has spare capacity.
    pub async fn borrow(&self) -> Result<Connection> {
        {
            let mut idle_rx = self.inner.idle_rx.lock().await;
            if let Ok(conn) = idle_rx.try_recv() {
                log::debug!("sqlxx: pool borrow reusing an idle connection");
                return Ok(conn);
            }
        }

        let previous = self.inner.live_count.fetch_add(1, Ordering::SeqCst);
        if previous >= self.inner.capacity {
            self.inner.live_count.fetch_sub(1, Ordering::SeqCst);
            log::warn!(
                "sqlxx: pool exhausted at capacity {}",
                self.inner.capacity
            );
            return Err(Error::TooManyConcurrentConnections);
        }

        log::info!(
            "sqlxx: opening new pooled connection ({}/{})",
            previous + 1,
            self.inner.capacity
        );
        let handle = match self.inner.driver.open(&self.inner.dsn).await {
            Ok(handle) => handle,
            Err(e) => {
                self.inner.live_count.fetch_sub(1, Ordering::SeqCst);
                return Err(e);
            }
        };
        Ok(Connection::with_close_hook(handle, self.close_hook()))
    }

    /// Builds the close hook installed on every connection this pool hands
    /// out. A connection's live-count contribution is decremented exactly
    /// once, on its first close, tracked by the `decremented` flag captured
    /// in this closure rather than by rewiring the hook after first use.
    fn close_hook(&self) -> CloseHook {
        let pool = Arc::clone(&self.inner);
        let decremented = Arc::new(AtomicBool::new(false));
        Arc::new(move |conn: Connection| -> futures::future::BoxFuture<'static, Result<()>> {
            let pool = Arc::clone(&pool);
            let decremented = Arc::clone(&decremented);
            Box::pin(async move { release(pool, conn, decremented).await })
        })
    }
}

async fn release(pool: Arc<PoolInner>, conn: Connection, decremented: Arc<AtomicBool>) -> Result<()> {
    if !decremented.swap(true, Ordering::SeqCst) {
        pool.live_count.fetch_sub(1, Ordering::SeqCst);
        log::debug!(
            "sqlxx: pool connection released, live count now {}",
            pool.live_count.load(Ordering::SeqCst)
        );
    }

    if conn.last_error().await.is_some() {
        log::warn!("sqlxx: discarding tainted connection instead of returning it to the pool");
        return conn.close_raw().await;
    }

    let to_idle = conn.clone();
    match pool.idle_tx.try_send(to_idle) {
        Ok(()) => Ok(()),
        Err(_) => {
            log::debug!("sqlxx: idle queue full, closing connection instead of recycling it");
            conn.close_raw().await
        }
    }
}
