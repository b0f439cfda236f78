//! Garde des appels distants : classification des échecs, reprises et quota
//!
//! Chaque appel distant passe par [`RateGuard::call`] :
//! - le quota partagé est consulté avant l'appel ;
//! - les échecs `Transient` sont retentés selon la [`RetryPolicy`] ;
//! - un échec `QuotaExceeded` n'est jamais retenté et verrouille le compteur
//!   pour le reste du processus ;
//! - le coût est imputé après chaque succès.

use crate::error::{RemoteError, RemoteErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Raisons d'échec renvoyées par l'API qui relèvent du quota
const QUOTA_REASONS: &[&str] = &[
    "quotaexceeded",
    "dailylimitexceeded",
    "ratelimitexceeded",
    "userratelimitexceeded",
    "servinglimitexceeded",
];

/// Classe un échec distant à partir du statut HTTP et de la raison de l'API
///
/// C'est le seul endroit où la nature d'un échec est décidée.
pub fn classify(status: Option<u16>, reason: Option<&str>) -> RemoteErrorKind {
    if let Some(reason) = reason {
        let reason = reason.to_ascii_lowercase();
        if QUOTA_REASONS.contains(&reason.as_str()) {
            return RemoteErrorKind::QuotaExceeded;
        }
    }

    match status {
        Some(429) => RemoteErrorKind::QuotaExceeded,
        Some(408) | Some(500..=599) | None => RemoteErrorKind::Transient,
        Some(_) => RemoteErrorKind::Rejected,
    }
}

/// Stratégie d'espacement des reprises
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    #[default]
    Exponential,
}

impl FromStr for BackoffStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(BackoffStrategy::Fixed),
            "linear" => Ok(BackoffStrategy::Linear),
            "exponential" => Ok(BackoffStrategy::Exponential),
            other => Err(format!("Unknown backoff strategy: {}", other)),
        }
    }
}

/// Politique de reprise des échecs temporaires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub strategy: BackoffStrategy,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, strategy: BackoffStrategy, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            strategy,
            base_delay_ms,
        }
    }

    /// Aucune reprise
    pub fn none() -> Self {
        Self::new(0, BackoffStrategy::Fixed, 0)
    }

    /// Vrai si la reprise numéro `attempt` (0 = première) est autorisée
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Délai avant la reprise numéro `attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        let ms = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay_ms,
            BackoffStrategy::Linear => self.base_delay_ms.saturating_mul(attempt as u64 + 1),
            BackoffStrategy::Exponential => self
                .base_delay_ms
                .saturating_mul(2u64.saturating_pow(attempt)),
        };
        Duration::from_millis(ms)
    }
}

impl Default for RetryPolicy {
    /// 2 reprises, exponentiel, 500 ms
    fn default() -> Self {
        Self::new(2, BackoffStrategy::Exponential, 500)
    }
}

#[derive(Debug)]
struct QuotaInner {
    budget: Option<u64>,
    used: AtomicU64,
    exhausted: AtomicBool,
}

/// Compteur de quota partagé par tous les appels d'un même processus
///
/// Les clones partagent le même compteur.
#[derive(Debug, Clone)]
pub struct QuotaCounter {
    inner: Arc<QuotaInner>,
}

impl QuotaCounter {
    /// Compteur avec un budget en unités (None = illimité)
    pub fn new(budget: Option<u64>) -> Self {
        Self {
            inner: Arc::new(QuotaInner {
                budget,
                used: AtomicU64::new(0),
                exhausted: AtomicBool::new(false),
            }),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn budget(&self) -> Option<u64> {
        self.inner.budget
    }

    pub fn used(&self) -> u64 {
        self.inner.used.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> Option<u64> {
        self.inner
            .budget
            .map(|budget| budget.saturating_sub(self.used()))
    }

    pub fn is_exhausted(&self) -> bool {
        self.inner.exhausted.load(Ordering::SeqCst)
    }

    /// Verrouille le compteur après un refus de quota côté distant
    pub fn mark_exhausted(&self) {
        self.inner.exhausted.store(true, Ordering::SeqCst);
    }

    /// Vérifie qu'un appel de coût `cost` reste dans le budget
    pub fn check(&self, cost: u64) -> Result<(), RemoteError> {
        if self.is_exhausted() {
            return Err(RemoteError::quota("quota exhausted earlier in this run"));
        }
        if let Some(budget) = self.inner.budget {
            let used = self.used();
            if used.saturating_add(cost) > budget {
                return Err(RemoteError::quota(format!(
                    "local quota budget exhausted ({} + {} > {})",
                    used, cost, budget
                )));
            }
        }
        Ok(())
    }

    /// Impute le coût d'un appel réussi
    pub fn charge(&self, cost: u64) {
        self.inner.used.fetch_add(cost, Ordering::SeqCst);
    }
}

impl Default for QuotaCounter {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Statistiques d'appels d'un garde
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardStats {
    pub calls: u64,
    pub retries: u64,
    pub units: u64,
}

impl fmt::Display for GuardStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} call(s), {} retry(ies), {} quota unit(s)",
            self.calls, self.retries, self.units
        )
    }
}

/// Garde entourant chaque appel distant
#[derive(Debug, Clone)]
pub struct RateGuard {
    policy: RetryPolicy,
    quota: QuotaCounter,
    stats: GuardStats,
}

impl RateGuard {
    pub fn new(policy: RetryPolicy, quota: QuotaCounter) -> Self {
        Self {
            policy,
            quota,
            stats: GuardStats::default(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn quota(&self) -> &QuotaCounter {
        &self.quota
    }

    pub fn stats(&self) -> GuardStats {
        self.stats
    }

    /// Exécute `op` sous la politique du garde
    ///
    /// `op` est rappelée à chaque reprise. `cost` est imputé au quota une
    /// seule fois, après le succès.
    pub async fn call<T, F, Fut>(&mut self, label: &str, cost: u64, mut op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 0;
        loop {
            self.quota.check(cost)?;
            self.stats.calls += 1;

            match op().await {
                Ok(value) => {
                    self.quota.charge(cost);
                    self.stats.units += cost;
                    debug!(call = label, cost, used = self.quota.used(), "Remote call succeeded");
                    return Ok(value);
                }
                Err(err) if err.kind.is_fatal() => {
                    error!(call = label, error = %err, "Remote quota exhausted");
                    self.quota.mark_exhausted();
                    return Err(err);
                }
                Err(err) if err.kind.is_retryable() && self.policy.should_retry(attempt) => {
                    let delay = self.policy.delay(attempt);
                    warn!(
                        call = label,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient remote failure, retrying"
                    );
                    self.stats.retries += 1;
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RateGuard {
    fn default() -> Self {
        Self::new(RetryPolicy::default(), QuotaCounter::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_classify_by_reason() {
        assert_eq!(
            classify(Some(403), Some("quotaExceeded")),
            RemoteErrorKind::QuotaExceeded
        );
        assert_eq!(
            classify(Some(403), Some("rateLimitExceeded")),
            RemoteErrorKind::QuotaExceeded
        );
        assert_eq!(
            classify(Some(403), Some("forbidden")),
            RemoteErrorKind::Rejected
        );
    }

    #[test]
    fn test_classify_by_status() {
        assert_eq!(classify(Some(429), None), RemoteErrorKind::QuotaExceeded);
        assert_eq!(classify(Some(503), None), RemoteErrorKind::Transient);
        assert_eq!(classify(Some(408), None), RemoteErrorKind::Transient);
        assert_eq!(classify(None, None), RemoteErrorKind::Transient);
        assert_eq!(classify(Some(404), None), RemoteErrorKind::Rejected);
        assert_eq!(classify(Some(400), Some("invalidValue")), RemoteErrorKind::Rejected);
    }

    #[test]
    fn test_retry_delays() {
        let fixed = RetryPolicy::new(3, BackoffStrategy::Fixed, 100);
        assert_eq!(fixed.delay(0), Duration::from_millis(100));
        assert_eq!(fixed.delay(4), Duration::from_millis(100));

        let linear = RetryPolicy::new(3, BackoffStrategy::Linear, 100);
        assert_eq!(linear.delay(2), Duration::from_millis(300));

        let exp = RetryPolicy::new(3, BackoffStrategy::Exponential, 100);
        assert_eq!(exp.delay(0), Duration::from_millis(100));
        assert_eq!(exp.delay(3), Duration::from_millis(800));

        assert!(exp.should_retry(2));
        assert!(!exp.should_retry(3));
    }

    #[test]
    fn test_quota_counter_budget() {
        let quota = QuotaCounter::new(Some(100));
        assert!(quota.check(50).is_ok());
        quota.charge(60);
        assert_eq!(quota.remaining(), Some(40));
        let err = quota.check(50).unwrap_err();
        assert!(err.is_quota());

        let shared = quota.clone();
        shared.charge(10);
        assert_eq!(quota.used(), 70);
    }

    #[test]
    fn test_quota_counter_latch() {
        let quota = QuotaCounter::unlimited();
        assert!(quota.check(1_000_000).is_ok());
        quota.mark_exhausted();
        assert!(quota.check(0).unwrap_err().is_quota());
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let mut guard = RateGuard::new(
            RetryPolicy::new(2, BackoffStrategy::Fixed, 0),
            QuotaCounter::unlimited(),
        );
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = guard
            .call("test", 5, move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(RemoteError::transient("connection reset"))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(guard.stats().retries, 2);
        assert_eq!(guard.stats().units, 5);
        assert_eq!(guard.quota().used(), 5);
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let mut guard = RateGuard::new(
            RetryPolicy::new(1, BackoffStrategy::Fixed, 0),
            QuotaCounter::unlimited(),
        );
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = guard
            .call("test", 1, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::transient("timeout"))
            })
            .await;

        assert_eq!(result.unwrap_err().kind, RemoteErrorKind::Transient);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(guard.quota().used(), 0);
    }

    #[tokio::test]
    async fn test_quota_failure_is_not_retried() {
        let mut guard = RateGuard::new(
            RetryPolicy::new(5, BackoffStrategy::Fixed, 0),
            QuotaCounter::unlimited(),
        );
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = guard
            .call("test", 1, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::quota("quotaExceeded"))
            })
            .await;

        assert!(result.unwrap_err().is_quota());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(guard.quota().is_exhausted());
    }

    #[tokio::test]
    async fn test_budget_blocks_call_before_remote() {
        let mut guard = RateGuard::new(RetryPolicy::none(), QuotaCounter::new(Some(10)));
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = guard
            .call("test", 50, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(result.unwrap_err().is_quota());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(guard.stats().calls, 0);
    }
}
