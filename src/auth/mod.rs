// 认证与会话
// 密码校验、令牌编解码、登录限制、状态策略，以及组合它们的 AuthGate

pub mod contact;
pub mod gate;
pub mod limiter;
pub mod password;
pub mod policy;
pub mod token;

pub use gate::{AuthGate, LoginOutcome, Registration};
pub use limiter::LoginLimiter;
pub use password::{CredentialVerifier, PasswordStrength, StrengthViolation, check_strength};
pub use policy::{ActiveOnly, AllowAll, StatusPolicy};
pub use token::{Claims, Identity, TokenCodec, TokenError, extract_from_header};
