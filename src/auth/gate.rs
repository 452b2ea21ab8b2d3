use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::contact::{self, ContactKind};
use super::limiter::LoginLimiter;
use super::password::{CredentialVerifier, check_strength};
use super::policy::{ActiveOnly, StatusPolicy};
use super::token::{Claims, Identity, TokenCodec, TokenError, extract_from_header};
use crate::cache::{CacheBackend, UserCache};
use crate::config::Config;
use crate::database::{
    NewSession, NewUser, PublicUser, SessionRepository, StoreError, UserEntity, UserPatch,
    UserRepository, hash_token,
};
use crate::error::AppError;
use crate::tasks::BackgroundTasks;
use crate::utils::ClientInfo;

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 50;
const NICKNAME_MAX_LEN: usize = 50;

/// 登录 / 注册成功后的结果
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub user: PublicUser,
    pub expires_at: DateTime<Utc>,
}

/// 注册信息，`contact` 为手机号或邮箱
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub contact: String,
    pub password: String,
    pub nickname: Option<String>,
}

/// 请求认证的唯一入口
///
/// 两层校验：令牌签名/过期（无状态）+ 会话表（可撤销），缺一不可。
/// 用户缓存只提供资料内容，从不参与认证判断。
#[derive(Clone)]
pub struct AuthGate {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    cache: UserCache,
    codec: TokenCodec,
    verifier: CredentialVerifier,
    limiter: LoginLimiter,
    policy: Arc<dyn StatusPolicy>,
    enforce_status_on_requests: bool,
}

impl AuthGate {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        cache: UserCache,
        codec: TokenCodec,
        verifier: CredentialVerifier,
        limiter: LoginLimiter,
    ) -> Self {
        Self {
            users,
            sessions,
            cache,
            codec,
            verifier,
            limiter,
            policy: Arc::new(ActiveOnly),
            enforce_status_on_requests: false,
        }
    }

    pub fn from_config(
        config: &Config,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        cache_backend: Arc<dyn CacheBackend>,
    ) -> Self {
        let cache = UserCache::new(cache_backend.clone(), config.user_cache_ttl());
        let limiter = LoginLimiter::new(
            cache_backend,
            config.login_max_attempts,
            config.login_attempt_window(),
        );

        Self::new(
            users,
            sessions,
            cache,
            TokenCodec::new(&config.jwt_secret, config.jwt_expiration()),
            CredentialVerifier::new(config.bcrypt_cost),
            limiter,
        )
        .with_policy(ActiveOnly, config.enforce_status_on_requests)
    }

    /// 替换账号状态策略；`on_requests` 为 true 时每个请求都会检查
    pub fn with_policy(mut self, policy: impl StatusPolicy + 'static, on_requests: bool) -> Self {
        self.policy = Arc::new(policy);
        self.enforce_status_on_requests = on_requests;
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn verifier(&self) -> CredentialVerifier {
        self.verifier
    }

    pub fn cache(&self) -> &UserCache {
        &self.cache
    }

    /// 根据 Authorization 头判断请求是否已认证
    pub async fn authenticate(&self, header: Option<&str>) -> Result<Claims, AppError> {
        let token = extract_from_header(header).ok_or(TokenError::Missing)?;
        self.authenticate_token(token).await
    }

    pub async fn authenticate_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims = self.codec.verify(token)?;

        let session = self.sessions.get_by_token_hash(&hash_token(token)).await?;
        match session {
            Some(session) if session.user_id == claims.user_id => {}
            Some(session) => {
                warn!(
                    session_user = session.user_id,
                    token_user = claims.user_id,
                    "session row does not belong to token subject"
                );
                return Err(AppError::SessionRevoked);
            }
            None => return Err(AppError::SessionRevoked),
        }

        if self.enforce_status_on_requests {
            let profile = self
                .cache
                .get_or_load(claims.user_id, self.users.as_ref())
                .await?
                .ok_or(AppError::SessionRevoked)?;
            if !self.policy.admits(&profile) {
                return Err(AppError::AccountDisabled);
            }
        }

        Ok(claims)
    }

    /// 用户名或邮箱登录；用户不存在与密码错误返回同一个错误
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<LoginOutcome, AppError> {
        self.limiter.check(identifier).await?;

        let Some(user) = self.users.find_by_username_or_email(identifier).await? else {
            debug!("login rejected: unknown identifier");
            self.limiter.record_failure(identifier).await;
            return Err(AppError::InvalidCredentials);
        };

        if !self.password_matches(password, &user.password_hash).await? {
            debug!(user_id = user.id, "login rejected: password mismatch");
            self.limiter.record_failure(identifier).await;
            return Err(AppError::InvalidCredentials);
        }

        let profile = PublicUser::from(&user);
        if !self.policy.admits(&profile) {
            info!(user_id = user.id, status = %profile.status, "login refused by status policy");
            return Err(AppError::AccountDisabled);
        }

        self.limiter.reset(identifier).await;
        self.users.touch_last_login(user.id).await?;

        self.start_session(profile, client).await
    }

    pub async fn register(
        &self,
        registration: Registration,
        client: &ClientInfo,
    ) -> Result<LoginOutcome, AppError> {
        let Registration {
            username,
            contact,
            password,
            nickname,
        } = registration;

        let username_len = username.chars().count();
        if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&username_len) {
            return Err(AppError::Validation(format!(
                "用户名长度必须在{}到{}个字符之间",
                USERNAME_MIN_LEN, USERNAME_MAX_LEN
            )));
        }
        if !contact::is_valid_username(&username) {
            return Err(AppError::Validation("用户名只能包含字母、数字和下划线".into()));
        }
        let nickname = nickname.filter(|n| !n.trim().is_empty());
        if nickname
            .as_ref()
            .is_some_and(|n| n.chars().count() > NICKNAME_MAX_LEN)
        {
            return Err(AppError::Validation(format!(
                "昵称最多{}个字符",
                NICKNAME_MAX_LEN
            )));
        }

        let Some(kind) = contact::classify(&contact) else {
            return Err(AppError::Validation("请输入有效的手机号或邮箱".into()));
        };

        let strength = check_strength(&password);
        if !strength.valid {
            return Err(AppError::Validation(strength.user_messages().join("；")));
        }

        if self.users.find_by_username(&username).await?.is_some() {
            return Err(AppError::Conflict("用户名已存在".into()));
        }

        let (email, phone) = match kind {
            ContactKind::Phone => {
                if self.users.find_by_phone(&contact).await?.is_some() {
                    return Err(AppError::Conflict("该手机号已被注册".into()));
                }
                (None, Some(contact))
            }
            ContactKind::Email => {
                if self.email_taken(&contact, None).await? {
                    return Err(AppError::Conflict("该邮箱已被注册".into()));
                }
                (Some(contact), None)
            }
        };

        let password_hash = self.hash_password(password).await?;
        let user = self
            .users
            .create(NewUser {
                username,
                email,
                phone,
                password_hash,
                nickname,
                role: None,
                status: None,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AppError::Conflict("用户已存在".into()),
                other => other.into(),
            })?;

        info!(user_id = user.id, "user registered");
        self.start_session(PublicUser::from(&user), client).await
    }

    /// 撤销单个令牌；重复调用无副作用
    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        self.sessions.delete_by_token_hash(&hash_token(token)).await?;

        match self.codec.verify(token) {
            Ok(claims) => {
                self.cache.invalidate(claims.user_id).await;
                info!(user_id = claims.user_id, "session revoked");
            }
            Err(e) => debug!(reason = %e, "revoked session for unverifiable token"),
        }
        Ok(())
    }

    /// 撤销该用户的所有会话，返回撤销数量
    pub async fn logout_everywhere(&self, user_id: i64) -> Result<u64, AppError> {
        let revoked = self.sessions.delete_all_for_user(user_id).await?;
        self.cache.invalidate(user_id).await;
        info!(user_id, revoked, "all sessions revoked");
        Ok(revoked)
    }

    /// 读穿缓存获取用户资料
    pub async fn profile(&self, user_id: i64) -> Result<PublicUser, AppError> {
        self.cache
            .get_or_load(user_id, self.users.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("用户不存在".into()))
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        patch: UserPatch,
    ) -> Result<PublicUser, AppError> {
        if patch.is_empty() {
            return Err(AppError::Validation("没有提供需要更新的字段".into()));
        }
        if patch
            .nickname
            .as_ref()
            .is_some_and(|n| n.trim().is_empty() || n.chars().count() > NICKNAME_MAX_LEN)
        {
            return Err(AppError::Validation(format!(
                "昵称长度必须在1到{}个字符之间",
                NICKNAME_MAX_LEN
            )));
        }
        if patch
            .email
            .as_deref()
            .is_some_and(|e| !contact::is_valid_email(e))
        {
            return Err(AppError::Validation("邮箱格式不正确".into()));
        }
        if let Some(Some(phone)) = &patch.phone {
            if !contact::is_valid_phone(phone) {
                return Err(AppError::Validation("手机号格式不正确".into()));
            }
        }
        if let Some(email) = &patch.email {
            if self.email_taken(email, Some(user_id)).await? {
                return Err(AppError::Conflict("该邮箱已被使用".into()));
            }
        }

        let updated = self
            .users
            .update(user_id, &patch)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AppError::Conflict("邮箱或手机号已被使用".into()),
                other => other.into(),
            })?
            .ok_or_else(|| AppError::NotFound("用户不存在".into()))?;

        let profile = PublicUser::from(&updated);
        self.cache.invalidate(user_id).await;
        self.cache.put(&profile).await;
        Ok(profile)
    }

    /// 启动过期会话的定期清理
    pub fn start_session_sweeper(&self, tasks: &mut BackgroundTasks, interval: Duration) {
        let sessions = self.sessions.clone();
        tasks.spawn_periodic("session-sweep", interval, move || {
            let sessions = sessions.clone();
            async move {
                match sessions.sweep_expired().await {
                    Ok(0) => {}
                    Ok(removed) => debug!(removed, "expired sessions swept"),
                    Err(e) => error!(error = %e, "session sweep failed"),
                }
            }
        });
    }

    async fn start_session(
        &self,
        profile: PublicUser,
        client: &ClientInfo,
    ) -> Result<LoginOutcome, AppError> {
        let identity = Identity {
            user_id: profile.id,
            username: profile.username.clone(),
            email: profile.email.clone(),
        };
        let (token, claims) = self.codec.issue(&identity)?;
        let expires_at = claims.expires_at().unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.sessions
            .create(NewSession {
                user_id: profile.id,
                token_hash: hash_token(&token),
                device_info: client.device_info.clone(),
                ip_address: client.ip_address.clone(),
                expires_at,
            })
            .await?;

        self.cache.put(&profile).await;
        info!(user_id = profile.id, %expires_at, "session started");

        Ok(LoginOutcome {
            token,
            user: profile,
            expires_at,
        })
    }

    /// 邮箱与任何其他账号的邮箱或用户名相同都视为占用
    async fn email_taken(&self, email: &str, owner: Option<i64>) -> Result<bool, AppError> {
        let other = |user: Option<UserEntity>| {
            user.is_some_and(|u| Some(u.id) != owner)
        };
        Ok(other(self.users.find_by_email(email).await?)
            || other(self.users.find_by_username(email).await?))
    }

    async fn password_matches(&self, password: &str, digest: &str) -> Result<bool, AppError> {
        let verifier = self.verifier;
        let password = password.to_owned();
        let digest = digest.to_owned();

        let result = tokio::task::spawn_blocking(move || verifier.verify(&password, &digest)).await?;
        match result {
            Ok(matches) => Ok(matches),
            Err(e) => {
                // 存储的哈希无法解析，按密码错误处理
                error!(error = %e, "stored password digest is unusable");
                Ok(false)
            }
        }
    }

    async fn hash_password(&self, password: String) -> Result<String, AppError> {
        let verifier = self.verifier;
        let digest = tokio::task::spawn_blocking(move || verifier.hash(&password)).await??;
        Ok(digest)
    }
}
