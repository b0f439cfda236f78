//! Implémentation des sous-commandes

use crate::{Command, Outcome, TargetArgs};
use anyhow::{Context, Result};
use pmoconfig::Config;
use pmoreorder::{
    Error, ExecutionResult, MoveExecutor, Order, PlanStrategy, RateGuard, RemotePlaylist,
    ReorderConfigExt, Snapshot, SnapshotStore, YoutubeClient, desired_order_by_timestamp,
    plan_moves,
};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub async fn run(config: &Config, command: Command) -> Result<Outcome> {
    let db_path = config.snapshot_db_path()?;
    let store = Arc::new(SnapshotStore::new(&db_path)?);
    info!(database = %db_path.display(), "Snapshot store opened");

    match command {
        Command::Fetch { playlist } => {
            let remote = youtube_client(config, &playlist)?;
            let mut guard = rate_guard(config)?;
            let order = refresh_snapshot(&store, &remote, &mut guard, config.list_cost()?).await?;
            println!("{}: {} items stored", playlist, order.len());
            Ok(Outcome::Completed)
        }
        Command::Import { file, playlist } => {
            import(&store, &file, playlist).await?;
            Ok(Outcome::Completed)
        }
        Command::Export { playlist, file } => {
            let snapshot = load_snapshot(&store, &playlist).await?;
            let json = snapshot.to_json()?;
            match file {
                Some(path) => fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => println!("{}", json),
            }
            Ok(Outcome::Completed)
        }
        Command::Plan { target } => {
            let order = load_snapshot(&store, &target.playlist).await?.to_order()?;
            let strategy = plan_strategy(config, &target)?;
            let desired = desired_ids(&target, &order)?;
            let plan = plan_moves(&order.ids(), &desired, strategy)?;

            println!(
                "{} moves for {} items ({} kept in place, strategy {})",
                plan.len(),
                order.len(),
                plan.skeleton().len(),
                strategy
            );
            for (i, op) in plan.iter().enumerate() {
                println!("{:>4}. {}", i + 1, op);
            }
            Ok(Outcome::Completed)
        }
        Command::Apply {
            target,
            live,
            refresh,
            json,
        } => {
            let snapshot = store.load_snapshot(&target.playlist).await?;
            let title = snapshot.as_ref().and_then(|s| s.title.clone());

            let (mut executor, order) = if live {
                let remote: Arc<dyn RemotePlaylist> =
                    Arc::new(youtube_client(config, &target.playlist)?);
                let mut guard = rate_guard(config)?;

                let order = match snapshot {
                    Some(snapshot) if !refresh => snapshot.to_order()?,
                    _ => {
                        refresh_snapshot(&store, remote.as_ref(), &mut guard, config.list_cost()?)
                            .await?
                    }
                };

                let executor = MoveExecutor::live(remote, guard)
                    .with_snapshots(Arc::clone(&store))
                    .with_title(title)
                    .with_move_cost(config.move_cost()?);
                (executor, order)
            } else {
                let snapshot =
                    snapshot.ok_or_else(|| Error::SnapshotNotFound(target.playlist.clone()))?;
                (MoveExecutor::dry_run(), snapshot.to_order()?)
            };

            let strategy = plan_strategy(config, &target)?;
            let desired = desired_ids(&target, &order)?;
            let plan = plan_moves(&order.ids(), &desired, strategy)?;

            let result = executor.apply(&order, &plan).await;
            report(&result, json)?;

            Ok(if result.is_halted() {
                Outcome::Halted
            } else {
                Outcome::Completed
            })
        }
    }
}

fn youtube_client(config: &Config, playlist: &str) -> Result<YoutubeClient> {
    let client = YoutubeClient::new(playlist, config.youtube_access_token()?)?
        .with_api_base(config.youtube_api_base()?);
    Ok(client)
}

fn rate_guard(config: &Config) -> Result<RateGuard> {
    Ok(RateGuard::new(config.retry_policy()?, config.quota_counter()?))
}

fn plan_strategy(config: &Config, target: &TargetArgs) -> Result<PlanStrategy> {
    match &target.strategy {
        Some(s) => Ok(s.parse()?),
        None => config.plan_strategy(),
    }
}

/// Ordre cible : fichier JSON (tableau d'identifiants) ou ordre chronologique
fn desired_ids(target: &TargetArgs, current: &Order) -> Result<Vec<String>> {
    match &target.desired {
        Some(path) => {
            let data = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&data)
                .with_context(|| format!("{} is not a JSON array of ids", path.display()))
        }
        None => Ok(desired_order_by_timestamp(current)),
    }
}

async fn load_snapshot(store: &SnapshotStore, playlist: &str) -> Result<Snapshot> {
    Ok(store
        .load_snapshot(playlist)
        .await?
        .ok_or_else(|| Error::SnapshotNotFound(playlist.to_string()))?)
}

async fn refresh_snapshot(
    store: &SnapshotStore,
    remote: &dyn RemotePlaylist,
    guard: &mut RateGuard,
    list_cost: u64,
) -> Result<Order> {
    let items = guard
        .call("fetch playlist items", list_cost, || remote.fetch_items())
        .await?;
    let order = Order::new(items)?;
    store
        .save_snapshot(remote.playlist_id(), None, &order)
        .await?;
    info!(playlist = remote.playlist_id(), items = order.len(), "Snapshot refreshed");
    Ok(order)
}

async fn import(store: &SnapshotStore, file: &Path, playlist: Option<String>) -> Result<()> {
    let data = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let snapshot = Snapshot::from_json(&data)?;
    let order = snapshot.to_order()?;
    let playlist = playlist.unwrap_or_else(|| snapshot.playlist_id.clone());

    store
        .save_snapshot(&playlist, snapshot.title.as_deref(), &order)
        .await?;
    println!("{}: {} items imported", playlist, order.len());
    Ok(())
}

fn report(result: &ExecutionResult, as_json: bool) -> Result<()> {
    if as_json {
        let value = json!({
            "mode": result.mode,
            "planned": result.planned,
            "attempted": result.attempted,
            "applied": result.applied,
            "skipped": result.skipped,
            "failed": result.failed,
            "not_attempted": result.not_attempted,
            "status": result.status,
            "log": result.log,
            "final_order": result.final_ids(),
            "stats": result.stats,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for entry in &result.log {
        println!("{}", entry);
    }
    println!("{}", result);
    if result.stats.calls > 0 {
        println!("remote: {}", result.stats);
    }
    println!("final order: {}", result.final_ids().join(" "));
    Ok(())
}
