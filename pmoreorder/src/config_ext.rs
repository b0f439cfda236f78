//! Extension de pmoconfig pour le réordonnancement
//!
//! Ce module fournit le trait `ReorderConfigExt` qui ajoute à
//! `pmoconfig::Config` des accesseurs typés pour les clés `reorder.*` et
//! `youtube.*`.

use crate::executor::DEFAULT_MOVE_COST;
use crate::guard::{BackoffStrategy, QuotaCounter, RetryPolicy};
use crate::plan::PlanStrategy;
use crate::remote::DEFAULT_API_BASE;
use anyhow::{anyhow, Result};
use pmoconfig::Config;
use serde_yaml::Value;
use std::path::PathBuf;

const DEFAULT_LIST_COST: u64 = 1;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// Trait d'extension pour pmoconfig::Config
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::Config;
/// use pmoreorder::ReorderConfigExt;
///
/// let config = Config::load_config("")?;
/// let store = SnapshotStore::new(&config.snapshot_db_path()?)?;
/// let guard = RateGuard::new(config.retry_policy()?, config.quota_counter()?);
/// ```
pub trait ReorderConfigExt {
    /// Chemin de la base de snapshots (répertoire créé si nécessaire)
    fn snapshot_db_path(&self) -> Result<PathBuf>;

    /// Stratégie de planification
    fn plan_strategy(&self) -> Result<PlanStrategy>;

    /// Budget de quota par exécution (None = illimité)
    fn quota_budget(&self) -> Result<Option<u64>>;

    /// Coût d'un déplacement en unités de quota
    fn move_cost(&self) -> Result<u64>;

    /// Coût d'une page de liste en unités de quota
    fn list_cost(&self) -> Result<u64>;

    /// Compteur de quota initialisé avec le budget configuré
    fn quota_counter(&self) -> Result<QuotaCounter> {
        Ok(QuotaCounter::new(self.quota_budget()?))
    }

    /// Politique de retry des échecs transitoires
    fn retry_policy(&self) -> Result<RetryPolicy>;

    /// URL de base de l'API YouTube
    fn youtube_api_base(&self) -> Result<String>;

    /// Jeton d'accès OAuth (fourni de préférence par l'environnement)
    fn youtube_access_token(&self) -> Result<String>;
}

impl ReorderConfigExt for Config {
    fn snapshot_db_path(&self) -> Result<PathBuf> {
        let dir = self.get_managed_dir(&["reorder", "snapshots", "directory"], "snapshots")?;
        Ok(PathBuf::from(dir).join("snapshots.db"))
    }

    fn plan_strategy(&self) -> Result<PlanStrategy> {
        match self.get_value(&["reorder", "strategy"]) {
            Ok(Value::String(s)) => s.parse().map_err(|e| anyhow!("{}", e)),
            _ => Ok(PlanStrategy::default()),
        }
    }

    fn quota_budget(&self) -> Result<Option<u64>> {
        match self.get_value(&["reorder", "quota", "budget"]) {
            Ok(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| anyhow!("reorder.quota.budget must be a positive integer")),
            Ok(Value::Null) | Err(_) => Ok(None),
            Ok(other) => Err(anyhow!("Invalid reorder.quota.budget: {:?}", other)),
        }
    }

    fn move_cost(&self) -> Result<u64> {
        get_u64(self, &["reorder", "quota", "move_cost"], DEFAULT_MOVE_COST)
    }

    fn list_cost(&self) -> Result<u64> {
        get_u64(self, &["reorder", "quota", "list_cost"], DEFAULT_LIST_COST)
    }

    fn retry_policy(&self) -> Result<RetryPolicy> {
        let max_retries = get_u64(
            self,
            &["reorder", "retry", "max_retries"],
            DEFAULT_MAX_RETRIES as u64,
        )?;
        let base_delay_ms = get_u64(
            self,
            &["reorder", "retry", "base_delay_ms"],
            DEFAULT_BASE_DELAY_MS,
        )?;
        let strategy = match self.get_value(&["reorder", "retry", "strategy"]) {
            Ok(Value::String(s)) => s.parse::<BackoffStrategy>().map_err(|e| anyhow!(e))?,
            _ => BackoffStrategy::default(),
        };

        let max_retries = u32::try_from(max_retries)
            .map_err(|_| anyhow!("reorder.retry.max_retries is too large"))?;
        Ok(RetryPolicy::new(max_retries, strategy, base_delay_ms))
    }

    fn youtube_api_base(&self) -> Result<String> {
        match self.get_value(&["youtube", "api_base"]) {
            Ok(Value::String(s)) if !s.is_empty() => Ok(s),
            _ => Ok(DEFAULT_API_BASE.to_string()),
        }
    }

    fn youtube_access_token(&self) -> Result<String> {
        match self.get_value(&["youtube", "access_token"]) {
            Ok(Value::String(s)) if !s.is_empty() => Ok(s),
            _ => Err(anyhow!(
                "YouTube access token not configured (set PMOREORDER_CONFIG__YOUTUBE__ACCESS_TOKEN)"
            )),
        }
    }
}

fn get_u64(config: &Config, path: &[&str], default: u64) -> Result<u64> {
    match config.get_value(path) {
        Ok(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| anyhow!("{} must be a positive integer", path.join("."))),
        Ok(Value::Null) | Err(_) => Ok(default),
        Ok(other) => Err(anyhow!("Invalid {}: {:?}", path.join("."), other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config_with(yaml: &str) -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), yaml).unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_defaults() {
        let (_dir, config) = config_with("{}\n");
        assert_eq!(config.plan_strategy().unwrap(), PlanStrategy::Skeleton);
        assert_eq!(config.quota_budget().unwrap(), None);
        assert_eq!(config.move_cost().unwrap(), 50);
        assert_eq!(config.list_cost().unwrap(), 1);
        assert_eq!(config.retry_policy().unwrap(), RetryPolicy::default());
        assert_eq!(config.youtube_api_base().unwrap(), DEFAULT_API_BASE);
    }

    #[test]
    fn test_user_values() {
        let (dir, config) = config_with(
            "reorder:\n  strategy: naive\n  quota:\n    budget: 120\n  retry:\n    max_retries: 0\n    strategy: fixed\n",
        );
        assert_eq!(config.plan_strategy().unwrap(), PlanStrategy::Naive);
        assert_eq!(config.quota_budget().unwrap(), Some(120));
        assert_eq!(config.quota_counter().unwrap().remaining(), Some(120));

        let policy = config.retry_policy().unwrap();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.strategy, BackoffStrategy::Fixed);

        let db = config.snapshot_db_path().unwrap();
        assert!(db.starts_with(dir.path()));
        assert!(db.ends_with("snapshots/snapshots.db"));
    }

    #[test]
    fn test_invalid_strategy_is_an_error() {
        let (_dir, config) = config_with("reorder:\n  strategy: bubble\n");
        assert!(config.plan_strategy().is_err());
    }
}
