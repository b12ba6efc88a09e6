use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use uuid::Uuid;

#[derive(Parser)]
pub struct Cli {
    #[clap(flatten)]
    pub global_args: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Stop replaying hints until resumed
    Pause,

    /// Resume replaying hints
    Resume,

    /// List targets that still have undelivered hints
    Pending,

    /// Delete all hints for a target without replaying them
    Purge { target_id: Uuid },

    /// Delete every stored hint, for every target
    Truncate,

    /// Trigger an immediate delivery attempt for a target
    Schedule { target_id: Uuid },

    /// Show created/replayed/dropped counters for a target
    Counters { target_id: Uuid },

    /// Write a hint directly into the embedded store, bypassing the daemon.
    /// Intended for local operation and recovery scripts run on the box
    /// where the hints directory lives.
    InsertHint {
        target_id: Uuid,
        /// Column family this mutation belongs to
        #[clap(long)]
        column_family: String,
        /// Minimum time the hint may be withheld before it's too stale to replay
        #[clap(long)]
        grace_window_secs: u64,
        /// Raw payload bytes, given as a UTF-8 string
        #[clap(long)]
        payload: String,
    },

    /// Summarize the embedded store's contents without going through the
    /// daemon's management surface
    Stats,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Log level
    #[clap(long, global = true, default_value_t = LevelFilter::Info)]
    pub log_level: LevelFilter,

    /// Base URL of the daemon's management HTTP surface
    #[clap(long, global = true, default_value = "http://127.0.0.1:7199")]
    pub management_url: String,
}
