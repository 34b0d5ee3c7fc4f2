//! Database connection management and data access

pub mod models;
mod repository;
mod store;

pub use repository::Repository;
pub use store::{
    cosine_similarity, MatchedChunk, MemoryStore, NewChunk, NewWorkingPaper, ReviewStore,
};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// Database connection pool with an optional read replica
#[derive(Clone)]
pub struct DbPool {
    primary: DatabaseConnection,
    replica: Option<DatabaseConnection>,
}

impl DbPool {
    /// Connect to the database(s) described by the config
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let primary = Self::connect_one(&config.url, config).await?;
        info!("connected to primary database");

        let replica = match &config.read_url {
            Some(url) => {
                let conn = Self::connect_one(url, config).await?;
                info!("connected to read replica");
                Some(conn)
            }
            None => None,
        };

        Ok(Self { primary, replica })
    }

    async fn connect_one(url: &str, config: &DatabaseConfig) -> Result<DatabaseConnection> {
        let mut options = ConnectOptions::new(url.to_string());
        options
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        Database::connect(options)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: e.to_string(),
            })
    }

    /// Connection for writes
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Connection for reads, preferring the replica when configured
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Check connectivity on the primary
    pub async fn ping(&self) -> Result<()> {
        self.primary.ping().await.map_err(Into::into)
    }
}
