// 缓存模块
// 缓存后端（进程内 / Redis）、缓存键以及用户资料读穿缓存

pub mod backend;
pub mod keys;
pub mod memory;
pub mod redis_cache;
pub mod user;

pub use backend::{CacheBackend, CacheError};
pub use memory::MemoryCache;
pub use redis_cache::RedisCache;
pub use user::UserCache;
