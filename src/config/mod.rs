//! Environment-driven configuration for the worker process

use std::env;
use std::time::Duration;

/// Get the current environment (production, sandbox, development)
pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string())
}

/// Get the Redis connection URL
pub fn get_redis_url() -> String {
    env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

/// Get the Postgres connection URL for the durable store
pub fn get_database_url() -> String {
    env::var("DATABASE_URL")
        .unwrap_or_else(|_| "host=localhost user=marketbeat dbname=marketbeat".to_string())
}

fn env_secs(key: &str, default: u64) -> Duration {
    Duration::from_secs(
        env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default),
    )
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Tunable knobs for the scheduler and jobs
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Tick sleep while at least one session is active
    pub fast_tick: Duration,
    /// Tick sleep while all markets are closed
    pub slow_tick: Duration,
    /// Leader lock expiry; renewal happens at roughly half of this
    pub lock_ttl: Duration,
    /// How long a blocking acquire keeps retrying
    pub lock_acquire_timeout: Duration,
    /// Interval of the bar flush job
    pub flush_interval: Duration,
    /// Max bars checked out per queue round-trip
    pub flush_batch_size: usize,
    /// Max checkout rounds per flush invocation
    pub flush_max_batches: usize,
    /// Lead window before open during which a market reports PreOpen
    pub preopen_lead: Duration,
    /// Lead window before close during which a market reports PreClose
    pub preclose_lead: Duration,
    /// Quotes older than this are ignored by the aggregator
    pub quote_freshness: Duration,
    /// TTL of the last-seen cumulative volume side cache
    pub volume_cache_ttl: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self {
            fast_tick: env_secs("FAST_TICK_SECONDS", 1),
            slow_tick: env_secs("SLOW_TICK_SECONDS", 30),
            lock_ttl: env_secs("LEADER_LOCK_TTL_SECONDS", 30),
            lock_acquire_timeout: env_secs("LEADER_LOCK_ACQUIRE_TIMEOUT_SECONDS", 60),
            flush_interval: env_secs("FLUSH_INTERVAL_SECONDS", 60),
            flush_batch_size: env_usize("FLUSH_BATCH_SIZE", 200),
            flush_max_batches: env_usize("FLUSH_MAX_BATCHES", 10),
            preopen_lead: env_secs("PREOPEN_LEAD_SECONDS", 3600),
            preclose_lead: env_secs("PRECLOSE_LEAD_SECONDS", 900),
            quote_freshness: env_secs("QUOTE_FRESHNESS_SECONDS", 120),
            volume_cache_ttl: env_secs("VOLUME_CACHE_TTL_SECONDS", 172_800),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            fast_tick: Duration::from_secs(1),
            slow_tick: Duration::from_secs(30),
            lock_ttl: Duration::from_secs(30),
            lock_acquire_timeout: Duration::from_secs(60),
            flush_interval: Duration::from_secs(60),
            flush_batch_size: 200,
            flush_max_batches: 10,
            preopen_lead: Duration::from_secs(3600),
            preclose_lead: Duration::from_secs(900),
            quote_freshness: Duration::from_secs(120),
            volume_cache_ttl: Duration::from_secs(172_800),
        }
    }
}
