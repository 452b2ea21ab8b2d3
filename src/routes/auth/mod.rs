mod handler;
mod model;

pub use handler::{login, logout, logout_all, me, register};
pub use model::{LoginRequest, LogoutAllResponse, RegisterRequest};
