use std::fmt;

use bcrypt::{hash, verify};
use serde::Serialize;

const MIN_PASSWORD_LEN: usize = 8;

/// 密码哈希与校验，盐值随每次哈希随机生成并嵌入结果中
#[derive(Debug, Clone, Copy)]
pub struct CredentialVerifier {
    cost: u32,
}

impl CredentialVerifier {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        hash(password.as_bytes(), self.cost)
    }

    pub fn verify(&self, password: &str, digest: &str) -> Result<bool, bcrypt::BcryptError> {
        verify(password.as_bytes(), digest)
    }
}

impl Default for CredentialVerifier {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthViolation {
    TooShort,
    MissingLetter,
    MissingDigit,
}

impl fmt::Display for StrengthViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            StrengthViolation::TooShort => "too short",
            StrengthViolation::MissingLetter => "missing letter",
            StrengthViolation::MissingDigit => "missing digit",
        };
        f.write_str(msg)
    }
}

impl StrengthViolation {
    /// 返回给客户端的提示
    pub fn user_message(&self) -> &'static str {
        match self {
            StrengthViolation::TooShort => "密码长度至少 8 位",
            StrengthViolation::MissingLetter => "密码必须包含至少一个字母",
            StrengthViolation::MissingDigit => "密码必须包含至少一个数字",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordStrength {
    pub valid: bool,
    pub errors: Vec<StrengthViolation>,
}

impl PasswordStrength {
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn user_messages(&self) -> Vec<&'static str> {
        self.errors.iter().map(StrengthViolation::user_message).collect()
    }
}

/// 返回所有不满足的规则，而不仅仅是第一条
pub fn check_strength(password: &str) -> PasswordStrength {
    let mut errors = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(StrengthViolation::TooShort);
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        errors.push(StrengthViolation::MissingLetter);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push(StrengthViolation::MissingDigit);
    }

    PasswordStrength {
        valid: errors.is_empty(),
        errors,
    }
}
