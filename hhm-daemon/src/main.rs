mod context;
mod management;

use context::AppContext;
use hhm_core::manager::HintedHandoffManager;
use hhm_core::store::RocksDbHintStore;
use hhm_core::testing::{FakeFailureDetector, FakeGossip, FakeMembership, FakeRpc};
use hhm_utils::config::Config;
use hhm_utils::log::{init_logger, LogTarget};
use log::{error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    init_logger(&config).expect("failed to initialize logger");

    info!(target: LogTarget::Daemon.as_str(), "starting hhmd");

    let ctx = build_context(config);

    // the returned handle is just bookkeeping; the spawned sweep and event
    // tasks run independently until the shutdown flag trips.
    let _scheduler = ctx.manager.spawn_scheduler(ctx.shutdown_flag.clone());

    let app = management::router(ctx.manager.clone());
    let addr = format!("{}:{}", ctx.config.management_listen_ip, ctx.config.management_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind management listener on {addr}: {err}"));

    info!(target: LogTarget::Daemon.as_str(), "management surface listening on {addr}");

    let shutdown_flag = ctx.shutdown_flag.clone();
    let ctrlc_flag = ctx.shutdown_flag.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!(target: LogTarget::Daemon.as_str(), "received shutdown signal");
        ctrlc_flag.store(true, Ordering::Relaxed);
    });

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        while !shutdown_flag.load(Ordering::Relaxed) {
            tokio::time::sleep(management::SHUTDOWN_POLL_INTERVAL).await;
        }
    });

    if let Err(err) = server.await {
        error!(target: LogTarget::Daemon.as_str(), "management server error: {err}");
    }

    info!(target: LogTarget::Daemon.as_str(), "hhmd stopped");
}

/// Wires a [`HintedHandoffManager`] against reference collaborator
/// implementations. The real membership/failure-detector/RPC/gossip
/// subsystems live in the surrounding database process; this daemon is a
/// standalone demonstration of the manager and its control surface.
fn build_context(config: Config) -> AppContext {
    let store = Arc::new(
        RocksDbHintStore::open(&config.hhm_dirs.hints_dir)
            .expect("failed to open hint store"),
    );
    let membership = Arc::new(FakeMembership::new(1));
    let failure_detector = Arc::new(FakeFailureDetector::new());
    let gossip = Arc::new(FakeGossip::new(0));
    let rpc = Arc::new(FakeRpc::new());

    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let manager = HintedHandoffManager::new(
        config.clone(),
        store,
        rpc,
        membership,
        failure_detector,
        gossip,
    );

    AppContext {
        config,
        manager,
        shutdown_flag,
    }
}
