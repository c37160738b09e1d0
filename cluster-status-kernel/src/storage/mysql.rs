/**
 * BACKEND MYSQL - Une ligne par clé
 *
 * Table unique `cluster_storage` : key_name (PK) + data (JSON) + horodatages
 * maintenus par MySQL. set = upsert, jamais de merge partiel.
 * Pas de transaction multi-clés : chaque requête est isolée par le moteur.
 */

use super::{Record, Storage, StorageError};
use crate::config::MySqlConfig;
use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::time::Duration;

const TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS cluster_storage (
    key_name VARCHAR(255) PRIMARY KEY,
    data JSON NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
"#;

const MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MySqlStorage {
    pool: MySqlPool,
}

impl MySqlStorage {
    /// Ouvre le pool, vérifie que la base répond puis crée la table si besoin.
    /// Échoue immédiatement si MySQL est injoignable.
    pub async fn connect(config: &MySqlConfig) -> Result<Self, StorageError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(config.connect_options())
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        sqlx::query(TABLE_DDL).execute(&pool).await?;

        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "mysql storage ready"
        );
        Ok(Self { pool })
    }
}

#[async_trait]
impl Storage for MySqlStorage {
    async fn get(&self, key: &str) -> Result<Record, StorageError> {
        // CAST : on relit le JSON sous forme texte, indépendamment du type colonne
        let raw: Option<String> = sqlx::query_scalar(
            "SELECT CAST(data AS CHAR) FROM cluster_storage WHERE key_name = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Err(StorageError::NotFound(key.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &Record) -> Result<(), StorageError> {
        let json = serde_json::to_string(value)?;
        sqlx::query(
            "INSERT INTO cluster_storage (key_name, data) VALUES (?, ?) \
             ON DUPLICATE KEY UPDATE data = VALUES(data)",
        )
        .bind(key)
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::warn!(key, error = %e, "mysql upsert failed");
            e
        })?;
        Ok(())
    }

    async fn has(&self, key: &str) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM cluster_storage WHERE key_name = ?")
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map(|count| count > 0)
            .unwrap_or(false)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM cluster_storage WHERE key_name = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let keys = sqlx::query_scalar::<_, String>(
            "SELECT key_name FROM cluster_storage ORDER BY key_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.pool.close().await;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "mysql"
    }
}
