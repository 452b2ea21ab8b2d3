use crate::database::PublicUser;
use crate::database::entities::user::DEFAULT_STATUS;

/// 账号状态准入策略
///
/// 登录时总会检查；请求阶段是否检查由 `AUTH_ENFORCE_STATUS_ON_REQUESTS` 决定。
pub trait StatusPolicy: Send + Sync {
    fn admits(&self, user: &PublicUser) -> bool;
}

/// 不做任何限制
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl StatusPolicy for AllowAll {
    fn admits(&self, _user: &PublicUser) -> bool {
        true
    }
}

/// 只允许 status = active 的账号
#[derive(Debug, Clone, Copy, Default)]
pub struct ActiveOnly;

impl StatusPolicy for ActiveOnly {
    fn admits(&self, user: &PublicUser) -> bool {
        user.status == DEFAULT_STATUS
    }
}

impl<F> StatusPolicy for F
where
    F: Fn(&PublicUser) -> bool + Send + Sync,
{
    fn admits(&self, user: &PublicUser) -> bool {
        self(user)
    }
}
