//! 로그인 자격증명.

use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// 인증 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMethod {
    /// 계정 + 비밀번호
    Password,
    /// 휴대폰 번호 + SMS 코드
    PhoneCode,
    /// 외부 ID 제공자 (OAuth 등)
    Federated,
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Password => write!(f, "password"),
            AuthMethod::PhoneCode => write!(f, "phone_code"),
            AuthMethod::Federated => write!(f, "federated"),
        }
    }
}

/// 인증 한 번에 사용되는 자격증명.
///
/// 새 인증 방식은 변형을 추가하면 `method()`에서 누락 없이 처리해야 합니다.
#[derive(Clone)]
pub enum Credential {
    /// 계정(사용자명 또는 이메일) + 비밀번호
    Password { account: String, secret: SecretString },
    /// 휴대폰 번호 + SMS 코드
    PhoneCode { phone: String, code: String },
    /// 외부 제공자 인가 코드
    Federated {
        provider: String,
        authorization_code: String,
    },
}

impl Credential {
    /// 비밀번호 자격증명 생성.
    pub fn password(account: impl Into<String>, secret: impl Into<String>) -> Self {
        Credential::Password {
            account: account.into(),
            secret: SecretString::from(secret.into()),
        }
    }

    /// SMS 코드 자격증명 생성.
    pub fn phone_code(phone: impl Into<String>, code: impl Into<String>) -> Self {
        Credential::PhoneCode {
            phone: phone.into(),
            code: code.into(),
        }
    }

    /// 이 자격증명을 처리할 인증 방식.
    pub fn method(&self) -> AuthMethod {
        match self {
            Credential::Password { .. } => AuthMethod::Password,
            Credential::PhoneCode { .. } => AuthMethod::PhoneCode,
            Credential::Federated { .. } => AuthMethod::Federated,
        }
    }

    /// 계정 식별자 (로그용).
    pub fn account(&self) -> &str {
        match self {
            Credential::Password { account, .. } => account,
            Credential::PhoneCode { phone, .. } => phone,
            Credential::Federated { provider, .. } => provider,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password { account, .. } => f
                .debug_struct("Password")
                .field("account", account)
                .field("secret", &"[REDACTED]")
                .finish(),
            Credential::PhoneCode { phone, .. } => f
                .debug_struct("PhoneCode")
                .field("phone", phone)
                .field("code", &"[REDACTED]")
                .finish(),
            Credential::Federated { provider, .. } => f
                .debug_struct("Federated")
                .field("provider", provider)
                .field("authorization_code", &"[REDACTED]")
                .finish(),
        }
    }
}
