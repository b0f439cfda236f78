//! Item : un élément de la collection distante

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Métadonnées d'affichage d'un élément
///
/// Ces champs ne participent pas au réordonnancement ; ils sont conservés
/// dans le snapshot et servent à dériver un ordre cible par date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Date d'enregistrement (prioritaire pour le tri)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,

    /// Date de publication (repli)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl ItemMetadata {
    /// Meilleure date disponible : enregistrement, sinon publication
    pub fn best_timestamp(&self) -> Option<DateTime<Utc>> {
        self.recorded_at.or(self.published_at)
    }
}

/// Un élément de la playlist
///
/// `id` est la clé métier stable (ex : identifiant de la vidéo) ; `handle`
/// est la référence opaque exigée par l'API distante pour déplacer l'élément.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,

    #[serde(default)]
    pub handle: Option<String>,

    /// Position courante (renumérotée par [`super::Order`])
    #[serde(default)]
    pub position: usize,

    #[serde(default, flatten)]
    pub metadata: ItemMetadata,
}

impl Item {
    /// Crée un élément sans handle
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handle: None,
            position: 0,
            metadata: ItemMetadata::default(),
        }
    }

    /// Crée un élément avec son handle distant
    pub fn with_handle(id: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            handle: Some(handle.into()),
            ..Self::new(id)
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = Some(title.into());
        self
    }

    pub fn recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.metadata.recorded_at = Some(at);
        self
    }

    pub fn published_at(mut self, at: DateTime<Utc>) -> Self {
        self.metadata.published_at = Some(at);
        self
    }
}
