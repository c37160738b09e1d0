/**
 * BACKEND JSON - Un fichier par clé
 *
 * FONCTIONNEMENT :
 * - Chaque clé = <dossier>/<clé nettoyée>.json (JSON indenté)
 * - Écriture atomique : <fichier>.tmp puis rename par-dessus la cible,
 *   le fichier cible contient toujours l'ancienne OU la nouvelle valeur
 * - Un seul RwLock par instance : lectures concurrentes, écritures exclusives
 *
 * LIMITE CONNUE :
 * Les clés sont nettoyées ([A-Za-z0-9_-] sinon '_') pour éviter toute
 * traversée de chemin ; "a/b" et "a_b" partagent donc le même fichier.
 */

use super::{Record, Storage, StorageError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

const EXTENSION: &str = "json";

/// Les accès disque et le verrou sont bloquants : chaque opération
/// s'exécute via spawn_blocking, hors des workers tokio.
pub struct JsonStorage {
    inner: Arc<Inner>,
}

struct Inner {
    data_dir: PathBuf,
    lock: RwLock<()>,
}

impl JsonStorage {
    /// Crée le backend ; le dossier est créé s'il n'existe pas
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Result<Self, StorageError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        tracing::info!(path = %data_dir.display(), "json storage ready");
        Ok(Self {
            inner: Arc::new(Inner {
                data_dir,
                lock: RwLock::new(()),
            }),
        })
    }

    async fn run_blocking<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Inner) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || op(&inner)).await?
    }
}

/// Remplace tout caractère hors [A-Za-z0-9_-] par '_'
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl Inner {
    fn file_path(&self, key: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", sanitize_key(key), EXTENSION))
    }

    fn get(&self, key: &str) -> Result<Record, StorageError> {
        let _guard = self.lock.read();
        let content = match fs::read(self.file_path(key)) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&content)?)
    }

    fn set(&self, key: &str, json: Vec<u8>) -> Result<(), StorageError> {
        let _guard = self.lock.write();
        let path = self.file_path(key);
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            tracing::warn!(key, error = %e, "rename failed, dropping temp file");
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        let _guard = self.lock.read();
        self.file_path(key).is_file()
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.write();
        match fs::remove_file(self.file_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<String>, StorageError> {
        let _guard = self.lock.read();
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl Storage for JsonStorage {
    async fn get(&self, key: &str) -> Result<Record, StorageError> {
        let key = key.to_string();
        self.run_blocking(move |inner| inner.get(&key)).await
    }

    async fn set(&self, key: &str, value: &Record) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(value)?;
        let key = key.to_string();
        self.run_blocking(move |inner| inner.set(&key, json)).await
    }

    async fn has(&self, key: &str) -> bool {
        let key = key.to_string();
        self.run_blocking(move |inner| Ok(inner.has(&key)))
            .await
            .unwrap_or(false)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let key = key.to_string();
        self.run_blocking(move |inner| inner.delete(&key)).await
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        self.run_blocking(|inner| inner.list()).await
    }

    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "json"
    }
}
