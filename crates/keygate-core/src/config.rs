//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//! 로드 순서: 기본값 → TOML 파일 → `KEYGATE__` 접두사 환경 변수.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::principal::UserStatus;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// RSA 키 소스 설정
    #[serde(default)]
    pub secret: SecretConfig,
    /// 토큰 수명 설정
    #[serde(default)]
    pub token: TokenConfig,
    /// SMS 인증 코드 설정
    #[serde(default)]
    pub sms: SmsConfig,
    /// 메모리 사용자 디렉터리 초기 데이터
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// RSA 키 소스 설정.
///
/// 우선순위: 환경 변수 `SECRET_PRIVATE_KEY`/`SECRET_PUBLIC_KEY`
/// → 외부 파일 (`use_external_file`) → 이 설정의 `private_key`/`public_key`.
#[derive(Clone, Deserialize, Serialize)]
pub struct SecretConfig {
    /// Base64 PKCS#8 또는 PEM 개인키
    #[serde(default)]
    pub private_key: Option<String>,
    /// Base64 SPKI 또는 PEM 공개키
    #[serde(default)]
    pub public_key: Option<String>,
    /// `private_key.pem`, `public_key.pem`이 위치한 디렉터리
    #[serde(default = "default_key_file_path")]
    pub key_file_path: PathBuf,
    /// 외부 키 파일 사용 여부 (재로드 가능 조건)
    #[serde(default)]
    pub use_external_file: bool,
}

fn default_key_file_path() -> PathBuf {
    PathBuf::from("./keys")
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            private_key: None,
            public_key: None,
            key_file_path: default_key_file_path(),
            use_external_file: false,
        }
    }
}

impl fmt::Debug for SecretConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretConfig")
            .field("private_key", &self.private_key.as_ref().map(|_| "[REDACTED]"))
            .field("public_key", &self.public_key.is_some())
            .field("key_file_path", &self.key_file_path)
            .field("use_external_file", &self.use_external_file)
            .finish()
    }
}

/// 토큰 수명 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    /// 액세스 토큰 수명 (초)
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: u64,
    /// 리프레시 토큰 수명 (초)
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,
}

fn default_access_ttl() -> u64 {
    7 * 24 * 60 * 60
}
fn default_refresh_ttl() -> u64 {
    30 * 24 * 60 * 60
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
        }
    }
}

/// SMS 인증 코드 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmsConfig {
    /// 코드 자릿수
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    /// 코드 유효 시간 (초)
    #[serde(default = "default_code_ttl")]
    pub code_ttl_secs: u64,
    /// 재발송 최소 간격 (초)
    #[serde(default = "default_resend_interval")]
    pub resend_interval_secs: u64,
    /// 응답에 코드를 포함할지 여부 (개발/테스트 환경 전용)
    #[serde(default)]
    pub expose_code: bool,
}

fn default_code_length() -> usize {
    6
}
fn default_code_ttl() -> u64 {
    300
}
fn default_resend_interval() -> u64 {
    60
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
            code_ttl_secs: default_code_ttl(),
            resend_interval_secs: default_resend_interval(),
            expose_code: false,
        }
    }
}

/// 메모리 디렉터리에 등록할 사용자.
#[derive(Clone, Deserialize, Serialize)]
pub struct SeedUser {
    /// 내부 숫자 ID
    pub id: i64,
    /// 외부 사용자 ID
    pub user_id: String,
    /// 사용자명 (비밀번호 로그인 계정)
    pub username: String,
    /// 아바타 URL
    #[serde(default)]
    pub avatar: Option<String>,
    /// 계정 상태
    #[serde(default)]
    pub status: UserStatus,
    /// Argon2 PHC 형식 비밀번호 해시
    #[serde(default)]
    pub password_hash: Option<String>,
    /// 이메일 (비밀번호 로그인 계정으로도 사용)
    #[serde(default)]
    pub email: Option<String>,
    /// 휴대폰 번호 (SMS 로그인 계정)
    #[serde(default)]
    pub phone: Option<String>,
}

impl fmt::Debug for SeedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedUser")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("status", &self.status)
            .field("has_password", &self.password_hash.is_some())
            .field("email", &self.email)
            .field("phone", &self.phone)
            .finish()
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        Self::build(Some(path.as_ref()))
    }

    /// 설정 파일 없이 기본값과 환경 변수만으로 로드합니다.
    pub fn load_from_env() -> Result<Self, config::ConfigError> {
        Self::build(None)
    }

    fn build(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            // 기본값으로 시작
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?;

        // 파일에서 로드
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        // 환경 변수로 오버라이드
        let builder = builder.add_source(
            config::Environment::with_prefix("KEYGATE")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }

    /// 설정 값의 일관성을 검사합니다.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.token.access_ttl_secs == 0 {
            return Err(config::ConfigError::Message(
                "token.access_ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.token.refresh_ttl_secs <= self.token.access_ttl_secs {
            return Err(config::ConfigError::Message(format!(
                "token.refresh_ttl_secs ({}) must exceed token.access_ttl_secs ({})",
                self.token.refresh_ttl_secs, self.token.access_ttl_secs
            )));
        }
        if self.sms.code_length == 0 || self.sms.code_length > 10 {
            return Err(config::ConfigError::Message(format!(
                "sms.code_length must be between 1 and 10, got {}",
                self.sms.code_length
            )));
        }
        if self.sms.code_ttl_secs == 0 {
            return Err(config::ConfigError::Message(
                "sms.code_ttl_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.token.access_ttl_secs, 604_800);
        assert_eq!(config.token.refresh_ttl_secs, 2_592_000);
        assert_eq!(config.secret.key_file_path, PathBuf::from("./keys"));
        assert!(!config.secret.use_external_file);
        assert_eq!(config.sms.code_length, 6);
        assert_eq!(config.sms.code_ttl_secs, 300);
        assert_eq!(config.sms.resend_interval_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_refresh_must_exceed_access() {
        let mut config = AppConfig::default();
        config.token.refresh_ttl_secs = config.token.access_ttl_secs;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secret_debug_redacts_private_key() {
        let secret = SecretConfig {
            private_key: Some("MIIEvQIBADANBgkqhkiG9w0BAQEFAASC".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", secret);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("MIIEvQ"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[secret]
key_file_path = "/etc/keygate/keys"
use_external_file = true

[token]
access_ttl_secs = 60
refresh_ttl_secs = 120

[[users]]
id = 7
user_id = "u-7"
username = "alice"
phone = "13800138000"
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.secret.use_external_file);
        assert_eq!(config.secret.key_file_path, PathBuf::from("/etc/keygate/keys"));
        assert_eq!(config.token.access_ttl_secs, 60);
        assert_eq!(config.users.len(), 1);
        assert_eq!(config.users[0].status, UserStatus::Active);
    }
}
