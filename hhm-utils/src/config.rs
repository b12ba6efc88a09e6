use crate::dirs::HhmDirs;
use log::LevelFilter;
use std::env::VarError;
use std::{env, path::PathBuf, str::FromStr};
use strum_macros::{Display, EnumString};

/// Default for `max_hint_ttl_seconds` when unset: effectively unbounded
/// (100 years), rather than a finite business-relevant cap, so a hint's TTL
/// is governed by its mutation's column family grace windows alone unless
/// an operator explicitly configures a tighter ceiling.
const DEFAULT_MAX_HINT_TTL_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Clone, Copy, Display, EnumString, PartialEq)]
pub enum Env {
    #[strum(serialize = "dev")]
    Dev,

    #[strum(serialize = "uat")]
    Uat,

    #[strum(serialize = "prod")]
    Prod,
}

#[derive(Clone)]
pub struct Config {
    pub env: Env,
    pub log_level: LevelFilter,

    pub hhm_dirs: HhmDirs,

    pub management_listen_ip: String,
    pub management_port: u16,
    pub allowed_origins: Vec<String>,

    /// Upper bound on concurrently-running delivery sessions.
    pub max_hint_threads: usize,

    /// Cap applied to every hint's per-column-family grace window.
    pub max_hint_ttl_seconds: u64,

    /// Aggregate hint replay bandwidth budget across the whole cluster, in KB/s.
    /// Zero means unthrottled.
    pub hinted_handoff_throttle_kb: u64,

    /// Target in-memory footprint, in bytes, for a single delivery page.
    pub in_memory_compaction_limit: usize,

    /// Replayed-hint count above which a session forces a flush and compaction
    /// even when the peer still has hints remaining.
    pub tombstone_warn_threshold: usize,

    /// Estimated gossip propagation delay, used to bound schema agreement waits.
    pub ring_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = Env::from_str(&env::var("ENV").unwrap()).unwrap();

        let log_level = match env::var("LOG_LEVEL") {
            Ok(v) => LevelFilter::from_str(&v).unwrap(),
            Err(VarError::NotPresent) => LevelFilter::Info,
            Err(_) => panic!("LOG_LEVEL is not valid unicode"),
        };

        let hhm_app_dir = match env::var("HHM_DATA_DIR") {
            Ok(v) => PathBuf::from(v),
            Err(VarError::NotPresent) => default_data_dir(),
            Err(_) => panic!("HHM_DATA_DIR is not valid unicode"),
        };
        let hhm_dirs = HhmDirs::new(hhm_app_dir);

        let management_listen_ip =
            env::var("MANAGEMENT_LISTEN_IP").unwrap_or_else(|_| String::from("127.0.0.1"));
        let management_port = env::var("MANAGEMENT_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(7199);
        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        let max_hint_threads = env::var("MAX_HINT_THREADS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(2);

        let max_hint_ttl_seconds = env::var("MAX_HINT_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_MAX_HINT_TTL_SECONDS);

        let hinted_handoff_throttle_kb = env::var("HINTED_HANDOFF_THROTTLE_KB")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(1024);

        let in_memory_compaction_limit = env::var("IN_MEMORY_COMPACTION_LIMIT_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(16 * 1024 * 1024);

        let tombstone_warn_threshold = env::var("TOMBSTONE_WARN_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(1000);

        let ring_delay_ms = env::var("RING_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30_000);

        Config {
            env,
            log_level,
            hhm_dirs,
            management_listen_ip,
            management_port,
            allowed_origins,
            max_hint_threads,
            max_hint_ttl_seconds,
            hinted_handoff_throttle_kb,
            in_memory_compaction_limit,
            tombstone_warn_threshold,
            ring_delay_ms,
        }
    }
}

fn default_data_dir() -> PathBuf {
    env::var("HOME")
        .map(|home| PathBuf::from(home).join(".hhm"))
        .unwrap_or_else(|_| PathBuf::from(".hhm"))
}
