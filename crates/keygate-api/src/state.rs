//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! 협력 객체는 여기서 한 번만 연결됩니다. 디스패처는 토큰 서비스를 모르고,
//! 인증 서비스만 디스패처와 토큰 서비스를 함께 사용합니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use keygate_core::auth::{
    Argon2CredentialEncoder, AuthenticationDispatcher, CredentialEncoder, InMemoryUserDirectory,
    PasswordStrategy, PhoneCodeStrategy, UserDirectory,
};
use keygate_core::{AppConfig, AuthService, KeyManager, SmsCodeService, TokenService};

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 로드된 설정
    pub config: Arc<AppConfig>,
    /// 활성 RSA 키쌍 관리자
    pub keys: Arc<KeyManager>,
    /// 토큰 발급/검증
    pub tokens: Arc<TokenService>,
    /// 사용자 디렉터리
    pub directory: Arc<dyn UserDirectory>,
    /// SMS 인증 코드 캐시
    pub sms: Arc<SmsCodeService>,
    /// 로그인/갱신/토큰 확인
    pub auth: Arc<AuthService>,
    /// 서버 시작 시각
    pub started_at: DateTime<Utc>,
    /// 서버 버전
    pub version: String,
}

impl AppState {
    /// 설정의 초기 사용자로 메모리 디렉터리를 만들어 상태를 구성합니다.
    pub fn new(config: AppConfig, keys: Arc<KeyManager>) -> Self {
        let directory: Arc<dyn UserDirectory> =
            Arc::new(InMemoryUserDirectory::from_seed(&config.users));
        Self::with_directory(config, keys, directory)
    }

    /// 외부 사용자 디렉터리로 상태를 구성합니다.
    pub fn with_directory(
        config: AppConfig,
        keys: Arc<KeyManager>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        let encoder: Arc<dyn CredentialEncoder> = Arc::new(Argon2CredentialEncoder);
        let sms = Arc::new(SmsCodeService::new(config.sms.clone()));
        let tokens = Arc::new(TokenService::new(keys.clone(), &config.token));

        let dispatcher = AuthenticationDispatcher::new()
            .with_strategy(Arc::new(PasswordStrategy::new(directory.clone(), encoder)))
            .with_strategy(Arc::new(PhoneCodeStrategy::new(
                directory.clone(),
                sms.clone(),
            )));

        let auth = Arc::new(AuthService::new(
            Arc::new(dispatcher),
            tokens.clone(),
            directory.clone(),
            keys.clone(),
        ));

        Self {
            config: Arc::new(config),
            keys,
            tokens,
            directory,
            sms,
            auth,
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 가동 시간 (초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

/// 테스트용 AppState 생성.
///
/// 고정 키쌍과 사용자 `alice` (id 7, 비밀번호 `pw123`, 휴대폰 `13800138000`)를 포함합니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    use keygate_core::auth::hash_password;
    use keygate_core::{KeyMaterial, KeySource, SecretConfig, SeedUser, UserStatus};

    const PRIVATE_KEY: &str = include_str!("../tests/fixtures/private_key.pem");
    const PUBLIC_KEY: &str = include_str!("../tests/fixtures/public_key.pem");

    let material = KeyMaterial::from_strings(PRIVATE_KEY, PUBLIC_KEY, KeySource::Config)
        .expect("test key fixtures must parse");
    let keys = Arc::new(KeyManager::from_material(material, &SecretConfig::default()));

    let mut config = AppConfig::default();
    config.sms.expose_code = true;
    config.users.push(SeedUser {
        id: 7,
        user_id: "u-7".to_string(),
        username: "alice".to_string(),
        avatar: None,
        status: UserStatus::Active,
        password_hash: Some(hash_password("pw123").expect("hashing must succeed")),
        email: Some("alice@example.com".to_string()),
        phone: Some("13800138000".to_string()),
    });

    AppState::new(config, keys)
}
