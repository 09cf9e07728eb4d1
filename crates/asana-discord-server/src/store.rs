//! Action → Discord channel mapping storage.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::db;

/// Durable key-value map from an Asana action id to a Discord channel id.
#[async_trait]
pub trait ChannelMapStore: Send + Sync {
    async fn get(&self, action: &str) -> anyhow::Result<Option<String>>;

    /// Store `channel_id` for `action`, replacing any previous value.
    async fn put(&self, action: &str, channel_id: &str) -> anyhow::Result<()>;
}

pub struct SqliteChannelMap {
    pool: SqlitePool,
}

impl SqliteChannelMap {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChannelMapStore for SqliteChannelMap {
    async fn get(&self, action: &str) -> anyhow::Result<Option<String>> {
        db::get_channel_id(&self.pool, action).await
    }

    async fn put(&self, action: &str, channel_id: &str) -> anyhow::Result<()> {
        db::put_channel_id(&self.pool, action, channel_id).await
    }
}
