mod handlers;

use axum::routing::{get, post};
use axum::Router;
use hhm_core::manager::HintedHandoffManager;
use std::time::Duration;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::trace::TraceLayer;

/// The operator-facing HTTP surface: pause/resume, purge, truncate, manual
/// scheduling and per-target counters. Not part of the replication path.
pub fn router(manager: HintedHandoffManager) -> Router {
    let governor_config = Box::leak(Box::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .finish()
            .expect("invalid governor configuration"),
    ));

    Router::new()
        .route("/hhm/pending", get(handlers::list_pending))
        .route("/hhm/pause", post(handlers::set_paused))
        .route("/hhm/purge/{target_id}", post(handlers::purge))
        .route("/hhm/truncate", post(handlers::truncate))
        .route("/hhm/schedule/{target_id}", post(handlers::schedule))
        .route("/hhm/counters/{target_id}", get(handlers::counters))
        .layer(GovernorLayer::new(governor_config))
        .layer(TraceLayer::new_for_http())
        .with_state(manager)
}

pub const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);
