//! Durable local storage for the offline queue.
//!
//! The queue survives process restarts as a single JSON snapshot keyed by a
//! fixed namespace in a local SQLite database. `QueueStorage` is the seam the
//! queue manager writes through; `SqliteStore` is the production impl.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

pub type Pool = SqlitePool;

const QUEUE_NAMESPACE: &str = "offline-donations";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the
/// parent directory exists. Leaves in-memory URLs and other schemes untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }
    let rest = url["sqlite:".len()..].trim_start_matches("//");
    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path.is_empty() {
        return url.to_string();
    }
    let expanded = match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path.to_string(),
    };
    if let Some(parent) = std::path::Path::new(&expanded).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
    match query {
        Some(q) => format!("sqlite://{}?{}", expanded, q),
        None => format!("sqlite://{}", expanded),
    }
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Key-value persistence for the serialized queue snapshot.
#[async_trait]
pub trait QueueStorage: Send + Sync {
    async fn load(&self) -> Result<Option<String>>;
    async fn save(&self, raw: &str) -> Result<()>;
}

pub struct SqliteStore {
    pool: Pool,
    namespace: String,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self::with_namespace(pool, QUEUE_NAMESPACE)
    }

    pub fn with_namespace(pool: Pool, namespace: &str) -> Self {
        Self {
            pool,
            namespace: namespace.to_string(),
        }
    }
}

#[async_trait]
impl QueueStorage for SqliteStore {
    async fn load(&self) -> Result<Option<String>> {
        let payload =
            sqlx::query_scalar::<_, String>("SELECT payload FROM sync_state WHERE namespace = ?")
                .bind(&self.namespace)
                .fetch_optional(&self.pool)
                .await?;
        Ok(payload)
    }

    async fn save(&self, raw: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO sync_state (namespace, payload, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP) \
             ON CONFLICT(namespace) DO UPDATE SET payload = excluded.payload, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(&self.namespace)
        .bind(raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
