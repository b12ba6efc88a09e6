mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use env_logger::{Builder, Env};
use hhm_core::codec::{self, ColumnFamilyUpdate, Mutation};
use hhm_core::store::{HintStore, RocksDbHintStore};
use log::info;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    Builder::from_env(Env::default().default_filter_or("info"))
        .filter(None, cli.global_args.log_level)
        .init();

    let client = reqwest::Client::new();
    let base = cli.global_args.management_url.trim_end_matches('/').to_string();
    info!("running command against {base}");

    // InsertHint and Stats never touch `client`/`base` - they go straight to
    // the embedded store, bypassing the daemon entirely.
    let result = match cli.command {
        Commands::Pause => set_paused(&client, &base, true).await,
        Commands::Resume => set_paused(&client, &base, false).await,
        Commands::Pending => get(&client, &format!("{base}/hhm/pending")).await,
        Commands::Purge { target_id } => {
            post_empty(&client, &format!("{base}/hhm/purge/{target_id}")).await
        }
        Commands::Truncate => post_empty(&client, &format!("{base}/hhm/truncate")).await,
        Commands::Schedule { target_id } => {
            post_empty(&client, &format!("{base}/hhm/schedule/{target_id}")).await
        }
        Commands::Counters { target_id } => {
            get(&client, &format!("{base}/hhm/counters/{target_id}")).await
        }
        Commands::InsertHint {
            target_id,
            column_family,
            grace_window_secs,
            payload,
        } => {
            insert_hint_locally(target_id, column_family, grace_window_secs, payload)
                .await
                .map(|hint_id| format!("inserted hint {hint_id} for target {target_id}"))
        }
        Commands::Stats => local_stats_summary().await,
    };

    match result {
        Ok(body) => println!("{body}"),
        Err(err) => {
            eprintln!("hhm: {err}");
            std::process::exit(1);
        }
    }
}

async fn insert_hint_locally(
    target_id: uuid::Uuid,
    column_family: String,
    grace_window_secs: u64,
    payload: String,
) -> Result<hhm_core::types::HintId, String> {
    let config = hhm_utils::config::Config::from_env();
    let store = RocksDbHintStore::open(&config.hhm_dirs.hints_dir).map_err(|e| e.to_string())?;

    let mutation = Mutation {
        partition_key: target_id.as_bytes().to_vec(),
        column_families: vec![ColumnFamilyUpdate {
            name: column_family,
            grace_window_secs,
            payload: payload.into_bytes(),
        }],
    };

    let ttl_secs = codec::ttl_for(&mutation, config.max_hint_ttl_seconds).map_err(|e| e.to_string())?;
    let bytes = codec::serialize(&mutation).map_err(|e| e.to_string())?;
    let column_family_count = mutation.column_family_count();

    store
        .insert(target_id, codec::CURRENT_VERSION, bytes, ttl_secs, column_family_count)
        .await
        .map_err(|e| e.to_string())
}

async fn local_stats_summary() -> Result<String, String> {
    let config = hhm_utils::config::Config::from_env();
    let store = RocksDbHintStore::open(&config.hhm_dirs.hints_dir).map_err(|e| e.to_string())?;

    let targets = store.distinct_targets().await.map_err(|e| e.to_string())?;
    let mut summary = format!("targets with pending hints: {}\n", targets.len());
    for target in &targets {
        summary.push_str(&format!("  {target}\n"));
    }

    match store.mean_row_stats().await {
        Some((mean_bytes, mean_families)) => {
            summary.push_str(&format!(
                "mean row size: {mean_bytes:.1} bytes, mean column families: {mean_families:.1}"
            ));
        }
        None => summary.push_str("no hints stored yet"),
    }

    Ok(summary)
}

async fn get(client: &reqwest::Client, url: &str) -> Result<String, String> {
    let resp = client.get(url).send().await.map_err(|e| e.to_string())?;
    response_body(resp).await
}

async fn post_empty(client: &reqwest::Client, url: &str) -> Result<String, String> {
    let resp = client.post(url).send().await.map_err(|e| e.to_string())?;
    response_body(resp).await
}

async fn set_paused(client: &reqwest::Client, base: &str, paused: bool) -> Result<String, String> {
    let resp = client
        .post(format!("{base}/hhm/pause"))
        .json(&serde_json::json!({ "paused": paused }))
        .send()
        .await
        .map_err(|e| e.to_string())?;
    response_body(resp).await
}

async fn response_body(resp: reqwest::Response) -> Result<String, String> {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    if status.is_success() {
        Ok(if text.is_empty() { status.to_string() } else { text })
    } else {
        Err(format!("{status}: {text}"))
    }
}
