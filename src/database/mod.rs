// 数据库模块
// 实体定义、存储库 trait 及其 PostgreSQL / 内存实现

pub mod entities;
pub mod memory;
pub mod repositories;

use sqlx::Executor;
use sqlx::postgres::{PgPool, PgPoolOptions};

pub use entities::{NewSession, NewUser, PublicUser, UserEntity, UserPatch, UserSession};
pub use memory::{MemorySessionRepository, MemoryUserRepository};
pub use repositories::{
    PgSessionRepository, PgUserRepository, SessionRepository, UserRepository, hash_token,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("unique constraint violated: {0}")]
    Conflict(String),
}

/// 建立 PostgreSQL 连接池
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'gamebox_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}
