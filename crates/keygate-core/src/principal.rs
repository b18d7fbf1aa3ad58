//! 인증된 사용자 표현.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 계정 상태.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// 정상
    #[default]
    Active,
    /// 비활성화
    Disabled,
    /// 잠김
    Locked,
}

/// 인증 레코드의 식별자 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    /// 사용자명 + 비밀번호
    Password,
    /// 이메일 + 비밀번호
    Email,
    /// 휴대폰 번호 + SMS 코드
    Phone,
    /// 외부 OAuth2 제공자
    Oauth2,
}

/// 사용자 한 명의 인증 레코드.
///
/// 한 사용자는 식별자 종류별로 여러 레코드를 가질 수 있습니다.
#[derive(Clone)]
pub struct AuthRecord {
    /// 식별자 종류
    pub credential_type: CredentialType,
    /// 계정 식별자 (사용자명, 이메일, 휴대폰 번호)
    pub identifier: String,
    /// 저장된 비밀값 다이제스트 (SMS 레코드는 없음)
    pub credential: Option<SecretString>,
}

impl AuthRecord {
    /// 비밀번호 레코드를 생성합니다.
    pub fn password(
        credential_type: CredentialType,
        identifier: impl Into<String>,
        digest: impl Into<String>,
    ) -> Self {
        Self {
            credential_type,
            identifier: identifier.into(),
            credential: Some(SecretString::from(digest.into())),
        }
    }

    /// 휴대폰 레코드를 생성합니다.
    pub fn phone(phone: impl Into<String>) -> Self {
        Self {
            credential_type: CredentialType::Phone,
            identifier: phone.into(),
            credential: None,
        }
    }
}

impl fmt::Debug for AuthRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRecord")
            .field("credential_type", &self.credential_type)
            .field("identifier", &self.identifier)
            .field("credential", &self.credential.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// 인증된 사용자.
///
/// 인증 또는 토큰 검증마다 새로 만들어지며 요청 간에 공유되지 않습니다.
/// 동일성은 `id`로만 판단합니다.
#[derive(Debug, Clone)]
pub struct Principal {
    /// 내부 숫자 ID
    pub id: i64,
    /// 외부 사용자 ID
    pub user_id: String,
    /// 사용자명
    pub username: String,
    /// 아바타 URL
    pub avatar: Option<String>,
    /// 계정 상태
    pub status: UserStatus,
    /// 인증에 사용된 레코드
    pub auth: AuthRecord,
}

impl PartialEq for Principal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Principal {}

/// 외부로 노출 가능한 사용자 정보 (비밀값 제외).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalView {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    pub avatar: Option<String>,
    pub status: UserStatus,
    pub credential_type: CredentialType,
}

impl From<&Principal> for PrincipalView {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.id,
            user_id: principal.user_id.clone(),
            username: principal.username.clone(),
            avatar: principal.avatar.clone(),
            status: principal.status,
            credential_type: principal.auth.credential_type,
        }
    }
}
