//! Exécution d'un plan de déplacements
//!
//! Cycle de vie d'un déplacement :
//!
//! ```text
//! Pending -> Resolving -> Skipped
//!                      -> Calling-Remote -> Applied
//!                                        -> Failed   (on continue)
//!                                        -> Halted   (quota : arrêt du plan)
//! ```
//!
//! La résolution vérifie les références de l'opération puis la présence
//! d'un handle distant, dans les deux modes. En mode `DryRun`, l'étape
//! distante est remplacée par un déplacement en mémoire : le journal et
//! l'ordre final sont identiques à ceux d'une exécution réelle sans échec,
//! y compris pour les éléments sans handle.
//!
//! L'ordre local n'est modifié qu'après le succès de l'appel distant.
//!
//! En mode `Live`, chaque déplacement réussi est suivi de la réécriture du
//! snapshot, ce qui rend l'exécution interruptible et reprenable.

use crate::error::RemoteError;
use crate::guard::{GuardStats, RateGuard};
use crate::order::Order;
use crate::persistence::SnapshotStore;
use crate::plan::{MoveOperation, MovePlan};
use crate::remote::RemotePlaylist;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Coût en unités de quota d'un déplacement (YouTube : `playlistItems.update`)
pub const DEFAULT_MOVE_COST: u64 = 50;

/// Mode d'exécution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    DryRun,
    Live,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::DryRun => f.write_str("dry-run"),
            ExecutionMode::Live => f.write_str("live"),
        }
    }
}

/// Contexte de placement : en tête, ou après un élément
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Front,
    After(String),
}

impl From<Option<&str>> for Destination {
    fn from(after: Option<&str>) -> Self {
        match after {
            Some(id) => Destination::After(id.to_string()),
            None => Destination::Front,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Front => f.write_str("to front"),
            Destination::After(id) => write!(f, "after {}", id),
        }
    }
}

/// Raison pour laquelle un déplacement est ignoré
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// L'élément n'a pas de handle distant
    MissingHandle,
    /// L'opération référence un identifiant absent de l'ordre courant
    ReferenceNotFound(String),
    /// L'opération place un élément après lui-même
    SelfReference,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingHandle => f.write_str("missing remote handle"),
            SkipReason::ReferenceNotFound(id) => write!(f, "unknown reference {}", id),
            SkipReason::SelfReference => f.write_str("placed after itself"),
        }
    }
}

/// Raison de l'arrêt anticipé d'une exécution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    /// Quota ou limitation de débit distante
    Quota(RemoteError),
    /// Le snapshot n'a pas pu être réécrit
    Snapshot(String),
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::Quota(err) => write!(f, "quota exhausted: {}", err.message),
            HaltReason::Snapshot(msg) => write!(f, "snapshot write failed: {}", msg),
        }
    }
}

/// Issue d'un déplacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveOutcome {
    Applied,
    Skipped(SkipReason),
    Failed(RemoteError),
    Halted(HaltReason),
}

impl fmt::Display for MoveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveOutcome::Applied => f.write_str("applied"),
            MoveOutcome::Skipped(reason) => write!(f, "skipped ({})", reason),
            MoveOutcome::Failed(err) => write!(f, "failed ({}: {})", err.kind, err.message),
            MoveOutcome::Halted(reason) => write!(f, "halted ({})", reason),
        }
    }
}

/// Une ligne du journal d'exécution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    /// Rang de l'opération dans le plan (à partir de 1)
    pub index: usize,
    pub id: String,
    /// Placement avant le déplacement (None si l'élément est inconnu)
    pub from: Option<Destination>,
    pub to: Destination,
    /// Position cible transmise au service distant
    pub position: Option<usize>,
    pub outcome: MoveOutcome,
}

impl fmt::Display for ExecutionLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} ", self.index, self.id)?;
        if let Some(from) = &self.from {
            match from {
                Destination::Front => f.write_str("(was at front) ")?,
                Destination::After(id) => write!(f, "(was after {}) ", id)?,
            }
        }
        write!(f, "{}", self.to)?;
        if let Some(position) = self.position {
            write!(f, " [position {}]", position)?;
        }
        write!(f, ": {}", self.outcome)
    }
}

/// État final d'une exécution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Halted(HaltReason),
}

/// Résultat d'une exécution
///
/// Le déplacement sur lequel l'exécution s'arrête est compté comme non
/// tenté : il n'a eu aucun effet et figurera dans le prochain plan.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub mode: ExecutionMode,
    pub planned: usize,
    pub attempted: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub not_attempted: usize,
    pub status: RunStatus,
    /// Ordre résultant (toujours fourni, même après un arrêt)
    pub order: Order,
    pub log: Vec<ExecutionLogEntry>,
    pub stats: GuardStats,
}

impl ExecutionResult {
    pub fn is_halted(&self) -> bool {
        matches!(self.status, RunStatus::Halted(_))
    }

    pub fn final_ids(&self) -> Vec<String> {
        self.order.ids()
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} planned, {} attempted, {} applied, {} skipped, {} failed, {} not attempted",
            self.mode,
            self.planned,
            self.attempted,
            self.applied,
            self.skipped,
            self.failed,
            self.not_attempted
        )?;
        if let RunStatus::Halted(reason) = &self.status {
            write!(f, " (halted: {})", reason)?;
        }
        Ok(())
    }
}

struct LiveBackend {
    playlist_id: String,
    title: Option<String>,
    remote: Arc<dyn RemotePlaylist>,
    guard: RateGuard,
    move_cost: u64,
    snapshots: Option<Arc<SnapshotStore>>,
}

impl LiveBackend {
    /// Appelle la primitive distante pour `op` ; n'altère pas l'ordre local
    async fn call_remote(
        &mut self,
        op: &MoveOperation,
        handle: &str,
        position: usize,
    ) -> MoveOutcome {
        let LiveBackend {
            remote,
            guard,
            move_cost,
            ..
        } = self;
        let label = format!("relocate {}", op.id);
        let result = guard
            .call(&label, *move_cost, || {
                remote.relocate(handle, &op.id, position)
            })
            .await;

        match result {
            Ok(()) => MoveOutcome::Applied,
            Err(err) if err.is_quota() => {
                error!(item = %op.id, error = %err, "Quota exhausted, halting");
                MoveOutcome::Halted(HaltReason::Quota(err))
            }
            Err(err) => {
                warn!(item = %op.id, error = %err, "Move failed, continuing");
                MoveOutcome::Failed(err)
            }
        }
    }

    async fn persist(&self, order: &Order) -> crate::Result<()> {
        match &self.snapshots {
            Some(store) => {
                store
                    .save_snapshot(&self.playlist_id, self.title.as_deref(), order)
                    .await
            }
            None => Ok(()),
        }
    }
}

enum Backend {
    DryRun,
    Live(Box<LiveBackend>),
}

/// Exécuteur de plans
pub struct MoveExecutor {
    backend: Backend,
}

impl MoveExecutor {
    /// Exécuteur simulé : aucun appel distant, aucun snapshot
    pub fn dry_run() -> Self {
        Self {
            backend: Backend::DryRun,
        }
    }

    /// Exécuteur réel sur `remote`, sous la garde `guard`
    pub fn live(remote: Arc<dyn RemotePlaylist>, guard: RateGuard) -> Self {
        Self {
            backend: Backend::Live(Box::new(LiveBackend {
                playlist_id: remote.playlist_id().to_string(),
                title: None,
                remote,
                guard,
                move_cost: DEFAULT_MOVE_COST,
                snapshots: None,
            })),
        }
    }

    /// Réécrit le snapshot dans `store` après chaque déplacement réussi
    pub fn with_snapshots(mut self, store: Arc<SnapshotStore>) -> Self {
        if let Backend::Live(live) = &mut self.backend {
            live.snapshots = Some(store);
        }
        self
    }

    /// Titre enregistré avec le snapshot
    pub fn with_title(mut self, title: Option<String>) -> Self {
        if let Backend::Live(live) = &mut self.backend {
            live.title = title;
        }
        self
    }

    /// Coût en quota de chaque déplacement
    pub fn with_move_cost(mut self, cost: u64) -> Self {
        if let Backend::Live(live) = &mut self.backend {
            live.move_cost = cost;
        }
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        match self.backend {
            Backend::DryRun => ExecutionMode::DryRun,
            Backend::Live(_) => ExecutionMode::Live,
        }
    }

    /// Statistiques cumulées du garde (nulles en simulation)
    pub fn stats(&self) -> GuardStats {
        match &self.backend {
            Backend::DryRun => GuardStats::default(),
            Backend::Live(live) => live.guard.stats(),
        }
    }

    /// Applique `plan` à une copie de `order`, dans l'ordre du plan
    pub async fn apply(&mut self, order: &Order, plan: &MovePlan) -> ExecutionResult {
        let mode = self.mode();
        let mut order = order.clone();
        let mut log = Vec::with_capacity(plan.len());
        let mut status = RunStatus::Completed;
        let (mut applied, mut skipped, mut failed) = (0, 0, 0);

        info!(%mode, moves = plan.len(), items = order.len(), "Applying move plan");

        for (k, op) in plan.iter().enumerate() {
            let to = Destination::from(op.after.as_deref());
            let from = order
                .predecessor_of(&op.id)
                .ok()
                .map(Destination::from);

            // validation commune aux deux modes : références puis handle
            let prepared = order
                .prepare(&op.id, op.after.as_deref())
                .and_then(|relocation| {
                    order
                        .handle_of(&op.id)
                        .map(|handle| (relocation, handle.to_string()))
                });
            let (relocation, handle) = match prepared {
                Ok(prepared) => prepared,
                Err(err) => {
                    let reason = skip_reason(err);
                    warn!(item = %op.id, %reason, "Move skipped");
                    skipped += 1;
                    log.push(ExecutionLogEntry {
                        index: k + 1,
                        id: op.id.clone(),
                        from,
                        to,
                        position: None,
                        outcome: MoveOutcome::Skipped(reason),
                    });
                    continue;
                }
            };
            let position = relocation.to;

            let outcome = match &mut self.backend {
                Backend::DryRun => MoveOutcome::Applied,
                Backend::Live(live) => live.call_remote(op, &handle, position).await,
            };

            let mut halt = None;
            match &outcome {
                MoveOutcome::Applied => {
                    order.commit(relocation);
                    applied += 1;
                    info!(item = %op.id, %to, position, "Move applied");
                    if let Backend::Live(live) = &self.backend {
                        if let Err(err) = live.persist(&order).await {
                            error!(error = %err, "Failed to persist snapshot, halting");
                            halt = Some(HaltReason::Snapshot(err.to_string()));
                        }
                    }
                }
                MoveOutcome::Skipped(_) => skipped += 1,
                MoveOutcome::Failed(_) => failed += 1,
                MoveOutcome::Halted(reason) => halt = Some(reason.clone()),
            }

            log.push(ExecutionLogEntry {
                index: k + 1,
                id: op.id.clone(),
                from,
                to,
                position: Some(position),
                outcome,
            });

            if let Some(reason) = halt {
                status = RunStatus::Halted(reason);
                break;
            }
        }

        let attempted = applied + skipped + failed;
        let result = ExecutionResult {
            mode,
            planned: plan.len(),
            attempted,
            applied,
            skipped,
            failed,
            not_attempted: plan.len() - attempted,
            status,
            order,
            log,
            stats: self.stats(),
        };

        match &result.status {
            RunStatus::Completed => info!("{}", result),
            RunStatus::Halted(_) => error!("{}", result),
        }
        result
    }
}

fn skip_reason(err: Error) -> SkipReason {
    match err {
        Error::MissingHandle(_) => SkipReason::MissingHandle,
        Error::SelfReference(_) => SkipReason::SelfReference,
        Error::ReferenceNotFound(id) => SkipReason::ReferenceNotFound(id),
        other => SkipReason::ReferenceNotFound(other.to_string()),
    }
}
