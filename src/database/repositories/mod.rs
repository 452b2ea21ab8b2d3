// 存储库：trait 定义 + PostgreSQL 实现

pub mod session;
pub mod user;

pub use session::{PgSessionRepository, SessionRepository, hash_token};
pub use user::{PgUserRepository, UserRepository};

use super::StoreError;

/// 唯一约束冲突单独归类，其余错误原样保留
pub(crate) fn map_unique_violation(err: sqlx::Error, fallback: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or(fallback).to_string();
            return StoreError::Conflict(constraint);
        }
    }
    StoreError::Database(err)
}
