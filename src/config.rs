/// Runtime configuration for a [`crate::pool::Pool`] and default batch
/// sizing. Not part of the translator/statement/rows core — an ambient
/// surface every crate in this codebase ships alongside its core logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub pool_capacity: usize,
    pub default_batch_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pool_capacity: 10,
            default_batch_size: 100,
        }
    }
}

impl Config {
    /// Reads `SQLXX_POOL_CAPACITY` / `SQLXX_BATCH_SIZE` if present, falling
    /// back to [`Config::default`] for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        let pool_capacity = std::env::var("SQLXX_POOL_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.pool_capacity);
        let default_batch_size = std::env::var("SQLXX_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.default_batch_size);
        Config {
            pool_capacity,
            default_batch_size,
        }
    }
}
