//! # pmoreorder - Réordonnancement minimal d'une playlist distante
//!
//! Cette crate calcule et applique la plus petite suite de déplacements
//! unitaires qui transforme l'ordre courant d'une playlist en un ordre cible,
//! lorsque le service distant ne sait déplacer qu'un élément à la fois, à un
//! coût élevé et sous quota.
//!
//! # Architecture
//!
//! - **Order** : séquence ordonnée d'éléments indexée par identifiant
//! - **Planificateur** : squelette LIS, un déplacement par élément hors squelette
//! - **MoveExecutor** : simulation en mémoire ou application distante, avec
//!   snapshot réécrit après chaque déplacement réussi
//! - **RateGuard** : retry des échecs transitoires, arrêt sur quota
//! - **SnapshotStore** : persistance SQLite, seule trace durable de la progression
//!
//! # Exemple d'utilisation
//!
//! ```no_run
//! use pmoreorder::{plan_minimal_moves, MoveExecutor, Order};
//!
//! # #[tokio::main]
//! # async fn main() -> pmoreorder::Result<()> {
//! let current = Order::from_ids(["D", "A", "B", "C"])?;
//! let plan = plan_minimal_moves(&current.ids(), &["A", "B", "C", "D"])?;
//!
//! for op in &plan {
//!     println!("{}", op);
//! }
//!
//! let result = MoveExecutor::dry_run().apply(&current, &plan).await;
//! assert_eq!(result.final_ids(), vec!["A", "B", "C", "D"]);
//! # Ok(())
//! # }
//! ```

mod desired;
mod error;
mod executor;
mod guard;
mod order;
mod persistence;
mod plan;
mod remote;

#[cfg(feature = "pmoconfig")]
mod config_ext;

// Réexports publics
pub use desired::desired_order_by_timestamp;
pub use error::{Error, RemoteError, RemoteErrorKind, Result};
pub use executor::{
    Destination, ExecutionLogEntry, ExecutionMode, ExecutionResult, HaltReason, MoveExecutor,
    MoveOutcome, RunStatus, SkipReason, DEFAULT_MOVE_COST,
};
pub use guard::{classify, BackoffStrategy, GuardStats, QuotaCounter, RateGuard, RetryPolicy};
pub use order::{Item, ItemMetadata, Order};
pub use persistence::{Snapshot, SnapshotRecord, SnapshotStore};
pub use plan::{
    longest_increasing_subsequence, plan_minimal_moves, plan_moves, plan_naive_moves,
    MoveOperation, MovePlan, PlanStrategy,
};
pub use remote::{MemoryPlaylist, RemotePlaylist, YoutubeClient, DEFAULT_API_BASE};

#[cfg(feature = "pmoconfig")]
pub use config_ext::ReorderConfigExt;
