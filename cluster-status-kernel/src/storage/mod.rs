/**
 * STORAGE - Magasin clé/valeur des métriques cluster
 *
 * RÔLE :
 * Interface commune de persistance pour toutes les données produites par le
 * collecteur externe (load average, PBS, CPU, nœuds, historiques...).
 * Le kernel ne fait que LIRE ces données puis les remettre en forme.
 *
 * FONCTIONNEMENT :
 * - Storage trait = get/set/has/delete/list/close par clé string
 * - Record = objet JSON libre (aucun schéma imposé)
 * - Deux backends interchangeables : fichiers JSON ou table MySQL
 * - open_storage() = factory choisie au démarrage depuis la config
 *
 * CONVENTION DE CLÉS :
 * - facette globale : "load_average", "pbs_usage", "nodes_alive"...
 * - facette par cluster : "cluster_<nom>_<facette>"
 */

pub mod json;
pub mod mysql;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{StorageConfig, StorageKind};

pub use json::JsonStorage;
pub use mysql::MySqlStorage;

/// Valeur stockée sous une clé : un objet JSON arbitraire
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Erreurs possibles lors des opérations sur le storage
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Interface que chaque backend doit implémenter.
/// Une écriture remplace entièrement la valeur précédente (pas de merge).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Lit la valeur d'une clé, `NotFound` si jamais écrite (ou supprimée)
    async fn get(&self, key: &str) -> Result<Record, StorageError>;

    /// Écrase la valeur d'une clé ; un lecteur ne voit jamais d'état partiel
    async fn set(&self, key: &str, value: &Record) -> Result<(), StorageError>;

    /// Test d'existence best-effort : false sur toute erreur
    async fn has(&self, key: &str) -> bool;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Liste des clés ; l'ordre n'est pas garanti
    async fn list(&self) -> Result<Vec<String>, StorageError>;

    async fn close(&self) -> Result<(), StorageError>;

    /// Nom court du backend (logs)
    fn backend(&self) -> &'static str;

    /// Comme `get` mais une clé absente donne `None` au lieu d'une erreur
    async fn get_optional(&self, key: &str) -> Result<Option<Record>, StorageError> {
        match self.get(key).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Handle partagé entre toutes les requêtes HTTP
pub type SharedStorage = Arc<dyn Storage>;

/// Factory : instancie le backend décrit par la config
pub async fn open_storage(config: &StorageConfig) -> Result<SharedStorage, StorageError> {
    match config.kind {
        StorageKind::Mysql => {
            let mysql = config.mysql.as_ref().ok_or_else(|| {
                StorageError::InvalidConfig("MySQL configuration required".into())
            })?;
            Ok(Arc::new(MySqlStorage::connect(mysql).await?))
        }
        StorageKind::Json => Ok(Arc::new(JsonStorage::new(&config.json_path)?)),
    }
}
