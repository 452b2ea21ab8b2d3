use std::sync::LazyLock;

use regex::Regex;

// 中国大陆手机号：1 开头，第二位 3-9，共 11 位
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^1[3-9]\d{9}$").expect("valid phone regex"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

// 用户名不能含 @，否则会与邮箱登录冲突
static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("valid username regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactKind {
    Phone,
    Email,
}

pub fn is_valid_username(value: &str) -> bool {
    USERNAME_RE.is_match(value)
}

pub fn is_valid_phone(value: &str) -> bool {
    PHONE_RE.is_match(value)
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

/// 注册时的联系方式：先判断手机号，再判断邮箱
pub fn classify(contact: &str) -> Option<ContactKind> {
    if is_valid_phone(contact) {
        Some(ContactKind::Phone)
    } else if is_valid_email(contact) {
        Some(ContactKind::Email)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_contacts() {
        assert_eq!(classify("13800138000"), Some(ContactKind::Phone));
        assert_eq!(classify("12800138000"), None);
        assert_eq!(classify("alice@example.com"), Some(ContactKind::Email));
        assert_eq!(classify("alice@example"), None);
        assert_eq!(classify("not a contact"), None);
    }

    #[test]
    fn usernames_exclude_email_characters() {
        assert!(is_valid_username("alice_01"));
        assert!(!is_valid_username("victim@mail.com"));
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username(""));
    }
}
