//! 인증 시스템의 에러 타입.
//!
//! 키 로딩, 토큰 처리, 자격증명 인증 단계별 에러를 정의합니다.
//! 암호화 에러는 [`crate::crypto::CryptoError`]에 있습니다.

use std::path::PathBuf;

use thiserror::Error;

use crate::auth::AuthMethod;
use crate::crypto::CryptoError;
use crate::keys::KeySource;

/// RSA 키 로딩 에러.
///
/// 시작 시점에 발생하면 프로세스가 기동하지 않습니다.
/// 재로드 중에 발생하면 기존 키쌍이 그대로 유지됩니다.
#[derive(Debug, Error)]
pub enum KeyLoadError {
    /// 어떤 소스에서도 키를 찾지 못함
    #[error("키가 설정되지 않았습니다 (환경 변수, 외부 파일, 설정 모두 비어 있음)")]
    NotConfigured,

    /// 외부 파일 모드가 아닌데 재로드 요청
    #[error("외부 키 파일 모드가 비활성화되어 있어 재로드할 수 없습니다")]
    ExternalFileDisabled,

    /// 키 파일 읽기 실패
    #[error("키 파일을 읽을 수 없습니다 ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 키 파일이 비어 있음
    #[error("키 파일이 비어 있습니다: {0}")]
    EmptyFile(PathBuf),

    /// 키 파싱 실패
    #[error("{source_kind} 키 파싱 실패: {error}")]
    Parse {
        source_kind: KeySource,
        #[source]
        error: CryptoError,
    },

    /// 개인키와 공개키가 서로 맞지 않음
    #[error("{0} 키쌍 불일치: 공개키가 개인키와 대응하지 않습니다")]
    Mismatch(KeySource),

    /// 토큰 서명용 키 인코딩 실패
    #[error("토큰 서명 키 준비 실패: {0}")]
    Encoding(String),
}

/// 토큰 검증/발급 에러.
///
/// 검증 실패는 항상 `Expired`, `Malformed`, `SignatureInvalid`, `Parse` 중 하나입니다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// 만료된 토큰
    #[error("토큰이 만료되었습니다")]
    Expired,

    /// 구조가 잘못된 토큰
    #[error("토큰 형식이 올바르지 않습니다")]
    Malformed,

    /// 서명 검증 실패
    #[error("토큰 서명 검증에 실패했습니다")]
    SignatureInvalid,

    /// 그 외 파싱 실패 (클레임, 알고리즘, subject 등)
    #[error("토큰 파싱 실패: {0}")]
    Parse(String),

    /// 토큰 서명 생성 실패
    #[error("토큰 발급 실패: {0}")]
    Issue(String),
}

impl TokenError {
    /// 만료 에러인지 확인합니다.
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenError::Expired)
    }
}

/// 자격증명 인증 에러.
#[derive(Debug, Error)]
pub enum AuthError {
    /// 계정이 없거나 비밀값이 일치하지 않음
    #[error("계정 또는 인증 정보가 올바르지 않습니다")]
    InvalidCredentials,

    /// 등록되지 않은 인증 방식
    #[error("지원하지 않는 인증 방식: {0}")]
    UnsupportedAuthMethod(AuthMethod),

    /// 토큰의 subject에 해당하는 사용자 없음
    #[error("사용자가 존재하지 않습니다: {0}")]
    UserNotFound(String),

    /// 인증되지 않은 요청
    #[error("인증이 필요합니다")]
    NotAuthenticated,

    /// 다른 사용자의 리소스 접근
    #[error("접근 권한이 없습니다")]
    Forbidden,

    /// 잘못된 요청 값
    #[error("잘못된 요청: {0}")]
    InvalidRequest(String),

    /// 토큰 에러
    #[error(transparent)]
    Token(#[from] TokenError),

    /// 암호화 에러
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// 사용자 디렉터리 조회 실패
    #[error("사용자 디렉터리 에러: {0}")]
    Directory(String),
}

/// 인증 작업을 위한 Result 타입.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// 로그용 짧은 사유 문자열.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::UnsupportedAuthMethod(_) => "unsupported_method",
            AuthError::UserNotFound(_) => "user_not_found",
            AuthError::NotAuthenticated => "not_authenticated",
            AuthError::Forbidden => "forbidden",
            AuthError::InvalidRequest(_) => "invalid_request",
            AuthError::Token(TokenError::Expired) => "token_expired",
            AuthError::Token(_) => "token_invalid",
            AuthError::Crypto(_) => "crypto",
            AuthError::Directory(_) => "directory",
        }
    }

    /// 서버 내부 문제로 인한 에러인지 확인합니다.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::Crypto(_) | AuthError::Directory(_) | AuthError::Token(TokenError::Issue(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_error_expired() {
        assert!(TokenError::Expired.is_expired());
        assert!(!TokenError::Malformed.is_expired());
    }

    #[test]
    fn test_auth_error_reason() {
        assert_eq!(AuthError::InvalidCredentials.reason(), "invalid_credentials");
        assert_eq!(
            AuthError::from(TokenError::Expired).reason(),
            "token_expired"
        );
        assert_eq!(
            AuthError::from(TokenError::SignatureInvalid).reason(),
            "token_invalid"
        );
    }

    #[test]
    fn test_auth_error_internal() {
        assert!(AuthError::Directory("down".to_string()).is_internal());
        assert!(AuthError::Token(TokenError::Issue("bad key".to_string())).is_internal());
        assert!(!AuthError::InvalidCredentials.is_internal());
        assert!(!AuthError::Token(TokenError::Malformed).is_internal());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            AuthError::UnsupportedAuthMethod(AuthMethod::Federated).to_string(),
            "지원하지 않는 인증 방식: federated"
        );
        assert_eq!(
            KeyLoadError::Mismatch(KeySource::Config).to_string(),
            "config 키쌍 불일치: 공개키가 개인키와 대응하지 않습니다"
        );
    }
}
