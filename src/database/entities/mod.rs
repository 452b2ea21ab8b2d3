// 数据库实体定义

pub mod session;
pub mod user;

pub use session::{NewSession, UserSession};
pub use user::{NewUser, PublicUser, UserEntity, UserPatch};
