//! Key-value state store
//!
//! Invitations, the activity log and rate-limit counters are kept as JSON
//! documents under fixed keys. Backends: in-memory, a directory of JSON files,
//! or the `state_entries` table in PostgreSQL.

use crate::db::DatabasePool;
use async_trait::async_trait;
use planeja_common::config::Config;
use planeja_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Key of the invitation list
pub const INVITATIONS_KEY: &str = "invitations";
/// Key of the invitation activity log
pub const ACTIVITIES_KEY: &str = "invitation_activities";
/// Key of the per-scope rate-limit counters
pub const RATE_LIMITS_KEY: &str = "invitation_rate_limits";
/// Key of the locally stored report snapshot
pub const SNAPSHOT_KEY: &str = "report_snapshot";

/// State store trait
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the document stored under `key`
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Replace the document stored under `key`
    async fn save(&self, key: &str, value: serde_json::Value) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;

    /// List stored keys
    async fn keys(&self) -> Result<Vec<String>>;

    /// Backend name as configured: "memory", "file" or "postgres"
    fn backend(&self) -> &'static str;

    /// Backend health
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Load and deserialize a typed document
pub async fn load_json<T: DeserializeOwned>(store: &dyn StateStore, key: &str) -> Result<Option<T>> {
    match store.load(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| Error::Storage(format!("Corrupt state under {}: {}", key, e))),
        None => Ok(None),
    }
}

/// Serialize and store a typed document
pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn StateStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let value = serde_json::to_value(value)
        .map_err(|e| Error::Storage(format!("Failed to serialize {}: {}", key, e)))?;
    store.save(key, value).await
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(Error::Storage(format!("Invalid state key: {:?}", key)))
    }
}

/// In-memory state store
#[derive(Default)]
pub struct MemoryStateStore {
    entries: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        validate_key(key)?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: serde_json::Value) -> Result<()> {
        validate_key(key)?;
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// JSON file state store, one `<key>.json` per key
pub struct FileStateStore {
    base_path: PathBuf,
}

impl FileStateStore {
    /// Create a new file store rooted at `path`
    pub fn new(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .map_err(|e| Error::Storage(format!("Failed to create state directory: {}", e)))?;

        info!(path = %path.display(), "Initialized file state store");

        Ok(Self {
            base_path: path.to_path_buf(),
        })
    }

    fn full_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let path = self.full_path(key)?;

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Storage(format!("Failed to read {}: {}", key, e))),
        };

        debug!(key = %key, size = data.len(), "Loaded state");

        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| Error::Storage(format!("Corrupt state file {}: {}", key, e)))
    }

    async fn save(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let path = self.full_path(key)?;
        let tmp = self.base_path.join(format!(".{}.json.tmp", key));

        let data = serde_json::to_vec_pretty(&value)
            .map_err(|e| Error::Storage(format!("Failed to serialize {}: {}", key, e)))?;

        // Write then rename so a crash never leaves a truncated document
        fs::write(&tmp, &data)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write {}: {}", key, e)))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to replace {}: {}", key, e)))?;

        debug!(key = %key, size = data.len(), "Saved state");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.full_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("Failed to delete {}: {}", key, e))),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.base_path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to list state directory: {}", e)))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::Storage(format!("Failed to list state directory: {}", e)))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(key) = name.strip_suffix(".json") {
                if !key.starts_with('.') {
                    keys.push(key.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn health_check(&self) -> Result<()> {
        fs::metadata(&self.base_path)
            .await
            .map(|_| ())
            .map_err(|e| Error::Storage(format!("State directory unavailable: {}", e)))
    }
}

/// PostgreSQL state store backed by `state_entries`
pub struct PgStateStore {
    pool: DatabasePool,
}

impl PgStateStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        validate_key(key)?;
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT value FROM state_entries WHERE key = $1")
                .bind(key)
                .fetch_optional(self.pool.pool())
                .await
                .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row.map(|(value,)| value))
    }

    async fn save(&self, key: &str, value: serde_json::Value) -> Result<()> {
        validate_key(key)?;
        sqlx::query(
            r#"
            INSERT INTO state_entries (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key)
            DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(&value)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        sqlx::query("DELETE FROM state_entries WHERE key = $1")
            .bind(key)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT key FROM state_entries ORDER BY key")
            .fetch_all(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.into_iter().map(|(key,)| key).collect())
    }

    async fn health_check(&self) -> Result<()> {
        self.pool.health_check().await
    }
}

/// Create the state store selected by configuration
pub fn create_state_store(
    config: &Config,
    pool: Option<DatabasePool>,
) -> Result<Arc<dyn StateStore>> {
    match config.database.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryStateStore::new())),
        "file" => Ok(Arc::new(FileStateStore::new(&config.state.path)?)),
        "postgres" => {
            let pool = pool.ok_or_else(|| {
                Error::Config("PostgreSQL backend requires a database pool".to_string())
            })?;
            Ok(Arc::new(PgStateStore::new(pool)))
        }
        other => Err(Error::Config(format!(
            "Unsupported persistence backend: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RateLimitState;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStateStore::new();
        assert_eq!(store.backend(), "memory");
        assert_eq!(store.load("a").await.unwrap(), None);

        store.save("a", serde_json::json!({"n": 1})).await.unwrap();
        assert_eq!(store.load("a").await.unwrap(), Some(serde_json::json!({"n": 1})));
        assert_eq!(store.keys().await.unwrap(), vec!["a".to_string()]);

        store.remove("a").await.unwrap();
        store.remove("a").await.unwrap();
        assert_eq!(store.load("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_restores_timestamps() {
        let temp_dir = TempDir::new().unwrap();
        let window_start = Utc.with_ymd_and_hms(2024, 5, 10, 9, 30, 0).unwrap();
        let mut counters = HashMap::new();
        counters.insert(
            "user-1".to_string(),
            RateLimitState {
                count: 3,
                window_start,
                blocked_until: Some(window_start + chrono::Duration::seconds(30)),
            },
        );

        {
            let store = FileStateStore::new(temp_dir.path()).unwrap();
            save_json(&store, RATE_LIMITS_KEY, &counters).await.unwrap();
        }

        // A fresh instance sees what the first one wrote
        let store = FileStateStore::new(temp_dir.path()).unwrap();
        let loaded: HashMap<String, RateLimitState> =
            load_json(&store, RATE_LIMITS_KEY).await.unwrap().unwrap();
        assert_eq!(loaded, counters);
        assert_eq!(store.keys().await.unwrap(), vec![RATE_LIMITS_KEY.to_string()]);
        assert!(store.health_check().await.is_ok());
        assert_eq!(store.backend(), "file");
    }

    #[tokio::test]
    async fn test_file_store_rejects_traversal_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStateStore::new(temp_dir.path()).unwrap();

        assert!(store.load("../etc/passwd").await.is_err());
        assert!(store.save("a/b", serde_json::json!(1)).await.is_err());
        assert!(store.save(".hidden", serde_json::json!(1)).await.is_err());
        assert!(store.remove("").await.is_err());
        assert!(store.save("ok-key_1.v2", serde_json::json!(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_a_storage_error() {
        let store = MemoryStateStore::new();
        store.save(INVITATIONS_KEY, serde_json::json!("nope")).await.unwrap();

        let result: Result<Option<Vec<RateLimitState>>> = load_json(&store, INVITATIONS_KEY).await;
        assert!(matches!(result, Err(Error::Storage(_))));
    }

    #[test]
    fn test_create_state_store_by_backend() {
        let mut config = Config::default();
        config.database.backend = "memory".to_string();
        let store = create_state_store(&config, None).unwrap();
        assert_eq!(store.backend(), "memory");

        config.database.backend = "postgres".to_string();
        assert!(matches!(
            create_state_store(&config, None),
            Err(Error::Config(_))
        ));

        config.database.backend = "s3".to_string();
        assert!(create_state_store(&config, None).is_err());
    }
}
