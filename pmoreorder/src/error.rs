//! Types d'erreurs pour pmoreorder

use std::fmt;

/// Erreurs du planificateur, du modèle d'ordre et de l'exécuteur
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),

    #[error("Item {0} cannot be placed after itself")]
    SelfReference(String),

    #[error("Duplicate item id: {0}")]
    DuplicateId(String),

    #[error(
        "Current and desired orders diverge ({} only in current, {} only in desired)",
        only_in_current.len(),
        only_in_desired.len()
    )]
    DivergentOrders {
        only_in_current: Vec<String>,
        only_in_desired: Vec<String>,
    },

    #[error("Missing remote handle for item: {0}")]
    MissingHandle(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Type Result spécialisé pour pmoreorder
pub type Result<T> = std::result::Result<T, Error>;

/// Classe d'échec d'un appel distant
///
/// L'ensemble est fermé : c'est le garde ([`crate::guard`]) qui décide de la
/// classe à partir du statut HTTP et de la raison renvoyée par l'API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// Quota ou limitation de débit : arrête toute la suite du plan
    QuotaExceeded,
    /// Échec temporaire (réseau, 5xx) : peut être réessayé
    Transient,
    /// Refus définitif pour cet appel (requête invalide, élément introuvable)
    Rejected,
}

impl RemoteErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteErrorKind::QuotaExceeded => "quota_exceeded",
            RemoteErrorKind::Transient => "transient",
            RemoteErrorKind::Rejected => "rejected",
        }
    }

    /// Vrai si l'échec doit interrompre toute l'exécution
    pub fn is_fatal(&self) -> bool {
        matches!(self, RemoteErrorKind::QuotaExceeded)
    }

    /// Vrai si l'appel peut être retenté
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteErrorKind::Transient)
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Erreur renvoyée par un collaborateur distant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[error("Remote error ({kind}): {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn quota(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::QuotaExceeded, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Transient, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Rejected, message)
    }

    /// Crée une erreur depuis un code HTTP et la raison fournie par l'API
    pub fn from_status_code(code: u16, reason: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind: crate::guard::classify(Some(code), reason),
            status: Some(code),
            message: message.into(),
        }
    }

    pub fn is_quota(&self) -> bool {
        self.kind.is_fatal()
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => RemoteError::from_status_code(status.as_u16(), None, err.to_string()),
            None if err.is_decode() => RemoteError::rejected(err.to_string()),
            None => RemoteError::transient(err.to_string()),
        }
    }
}
