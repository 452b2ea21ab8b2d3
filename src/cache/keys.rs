/// 用户资料缓存键前缀
const USER_INFO_PREFIX: &str = "user:";

/// 登录失败计数键前缀
const LOGIN_ATTEMPT_PREFIX: &str = "login:attempt:";

pub fn user_info_key(user_id: i64) -> String {
    format!("{}{}", USER_INFO_PREFIX, user_id)
}

pub fn login_attempt_key(identifier: &str) -> String {
    format!("{}{}", LOGIN_ATTEMPT_PREFIX, identifier)
}
