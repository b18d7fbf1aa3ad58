//! 서명 토큰 처리.
//!
//! RS256 JWT 발급/검증/갱신. 서명 키는 [`KeyManager`]의 활성 스냅샷에서 가져오며,
//! 호출 한 번은 스냅샷 하나만 사용합니다. 폐기 목록은 없으므로 토큰은 만료 전까지 유효합니다.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::TokenConfig;
use crate::error::TokenError;
use crate::keys::KeyManager;

/// 토큰 페이로드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - 사용자 ID
    pub sub: String,
    /// Issued At - 발급 시각 (Unix timestamp)
    pub iat: i64,
    /// Expiration - 만료 시각 (Unix timestamp)
    pub exp: i64,
    /// JWT ID - 토큰 고유 식별자
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// 확장 클레임
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// 현재 시각 기준으로 새 Claims를 만듭니다.
    pub fn new(subject: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            sub: subject.into(),
            iat: now,
            exp: now.saturating_add(ttl),
            jti: Some(uuid::Uuid::new_v4().to_string()),
            extra: Map::new(),
        }
    }

    /// 확장 클레임을 추가합니다.
    pub fn with_claim(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Access Token + Refresh Token 페어.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Access Token
    pub access_token: String,
    /// Refresh Token
    pub refresh_token: String,
    /// Access Token 만료 시간 (초)
    pub expires_in: u64,
    /// 토큰 타입 (항상 "Bearer")
    pub token_type: String,
}

/// 토큰 서비스.
pub struct TokenService {
    keys: Arc<KeyManager>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    /// 새 토큰 서비스를 생성합니다.
    pub fn new(keys: Arc<KeyManager>, config: &TokenConfig) -> Self {
        Self {
            keys,
            access_ttl: Duration::from_secs(config.access_ttl_secs),
            refresh_ttl: Duration::from_secs(config.refresh_ttl_secs),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// 지정한 수명으로 토큰을 발급합니다.
    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<String, TokenError> {
        self.sign(&Claims::new(subject, ttl))
    }

    /// 주어진 Claims에 서명합니다.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let keys = self.keys.current();
        let token = encode(
            &Header::new(Algorithm::RS256),
            claims,
            keys.encoding_key(),
        )
        .map_err(|e| TokenError::Issue(e.to_string()))?;

        debug!(
            subject = %claims.sub,
            exp = claims.exp,
            key = %keys.fingerprint(),
            "Token issued"
        );
        Ok(token)
    }

    /// Access Token 발급.
    pub fn issue_access(&self, subject: &str) -> Result<String, TokenError> {
        self.issue(subject, self.access_ttl)
    }

    /// Refresh Token 발급.
    pub fn issue_refresh(&self, subject: &str) -> Result<String, TokenError> {
        self.issue(subject, self.refresh_ttl)
    }

    /// Access Token + Refresh Token 쌍 발급.
    pub fn issue_pair(&self, subject: &str) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access(subject)?,
            refresh_token: self.issue_refresh(subject)?,
            expires_in: self.access_ttl.as_secs(),
            token_type: "Bearer".to_string(),
        })
    }

    /// 토큰을 검증하고 Claims를 반환합니다.
    ///
    /// 만료 판단에 여유 시간(leeway)을 두지 않습니다.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let keys = self.keys.current();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<Claims>(token, keys.decoding_key(), &validation)
            .map(|data| data.claims)
            .map_err(|err| map_decode_error(token, err))
    }

    /// 유효한 토큰으로 새 Access Token을 발급합니다.
    ///
    /// 만료된 토큰이면 `Ok(None)`, 그 외 검증 실패는 에러입니다.
    /// 기존 토큰은 폐기되지 않습니다.
    pub fn refresh(&self, token: &str) -> Result<Option<String>, TokenError> {
        match self.validate(token) {
            Ok(claims) => self.issue_access(&claims.sub).map(Some),
            Err(e) if e.is_expired() => {
                debug!("Refresh rejected: token expired");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// 토큰의 subject를 반환합니다.
    pub fn subject(&self, token: &str) -> Result<String, TokenError> {
        self.validate(token).map(|claims| claims.sub)
    }
}

fn map_decode_error(token: &str, err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
        ErrorKind::Base64(_) if only_signature_undecodable(token) => TokenError::SignatureInvalid,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Utf8(_) => {
            TokenError::Malformed
        }
        _ => TokenError::Parse(err.to_string()),
    }
}

/// 헤더와 페이로드는 디코딩되고 서명 구간만 base64가 아닌지 확인합니다.
///
/// 서명 마지막 문자의 패딩 비트만 바뀐 경우도 여기에 해당합니다.
fn only_signature_undecodable(token: &str) -> bool {
    let mut segments = token.split('.');
    match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(header), Some(payload), Some(signature), None) => {
            URL_SAFE_NO_PAD.decode(header).is_ok()
                && URL_SAFE_NO_PAD.decode(payload).is_ok()
                && URL_SAFE_NO_PAD.decode(signature).is_err()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecretConfig;
    use crate::crypto::test_keys::*;
    use crate::keys::{KeyMaterial, KeySource};
    use proptest::prelude::*;

    fn key_manager(private_key: &str, public_key: &str) -> Arc<KeyManager> {
        let material =
            KeyMaterial::from_strings(private_key, public_key, KeySource::Config).unwrap();
        Arc::new(KeyManager::from_material(material, &SecretConfig::default()))
    }

    fn service() -> TokenService {
        TokenService::new(
            key_manager(PRIMARY_PRIVATE, PRIMARY_PUBLIC),
            &TokenConfig::default(),
        )
    }

    /// 서명 구간의 `position` 위치 문자를 `replacement`로 바꿉니다.
    ///
    /// 원래 문자와 같으면 `None`.
    fn corrupt_signature(token: &str, position: usize, replacement: char) -> Option<String> {
        let (head, signature) = token.rsplit_once('.').unwrap();
        let mut chars: Vec<char> = signature.chars().collect();
        let position = position % chars.len();
        if chars[position] == replacement {
            return None;
        }
        chars[position] = replacement;
        Some(format!("{}.{}", head, chars.into_iter().collect::<String>()))
    }

    #[test]
    fn test_issue_and_validate() {
        let service = service();
        let token = service.issue_access("42").unwrap();

        assert_eq!(token.split('.').count(), 3);
        let claims = service.validate(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
        assert!(claims.jti.is_some());
    }

    #[test]
    fn test_header_is_rs256() {
        let token = service().issue_access("42").unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.typ.as_deref(), Some("JWT"));
    }

    #[test]
    fn test_pair_refresh_outlives_access() {
        let service = service();
        let pair = service.issue_pair("7").unwrap();

        let access = service.validate(&pair.access_token).unwrap();
        let refresh = service.validate(&pair.refresh_token).unwrap();
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 604_800);
        assert!(refresh.exp > access.exp);
    }

    #[test]
    fn test_expired_token() {
        let service = service();
        let claims = Claims {
            sub: "42".to_string(),
            iat: Utc::now().timestamp() - 20,
            exp: Utc::now().timestamp() - 10,
            jti: None,
            extra: Map::new(),
        };
        let token = service.sign(&claims).unwrap();

        assert_eq!(service.validate(&token), Err(TokenError::Expired));
        assert_eq!(service.subject(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_corrupted_signature() {
        let service = service();
        let token = service.issue_access("42").unwrap();
        let len = token.rsplit_once('.').unwrap().1.len();

        // 마지막 문자는 패딩 비트만 바뀌는 치환도 포함
        for position in [0, len / 2, len - 1] {
            for replacement in ['A', 'B', 'Q', 'R', 'g', 'h', 'w', 'x'] {
                let Some(corrupted) = corrupt_signature(&token, position, replacement) else {
                    continue;
                };
                assert_eq!(
                    service.validate(&corrupted),
                    Err(TokenError::SignatureInvalid),
                    "position {position} replaced with {replacement}"
                );
            }
        }
    }

    #[test]
    fn test_undecodable_header_or_payload_is_malformed() {
        let service = service();
        let token = service.issue_access("42").unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let bad_header = format!("{}!.{}.{}", parts[0], parts[1], parts[2]);
        assert_eq!(service.validate(&bad_header), Err(TokenError::Malformed));

        // 서명은 맞지만 페이로드가 base64가 아님
        let message = format!("{}.{}!", parts[0], parts[1]);
        let signature = jsonwebtoken::crypto::sign(
            message.as_bytes(),
            service.keys.current().encoding_key(),
            Algorithm::RS256,
        )
        .unwrap();
        let bad_payload = format!("{message}.{signature}");
        assert_eq!(service.validate(&bad_payload), Err(TokenError::Malformed));
    }

    #[test]
    fn test_foreign_key_signature_invalid() {
        let foreign = TokenService::new(
            key_manager(ROTATED_PRIVATE, ROTATED_PUBLIC),
            &TokenConfig::default(),
        );
        let token = foreign.issue_access("42").unwrap();
        assert_eq!(service().validate(&token), Err(TokenError::SignatureInvalid));
    }

    #[test]
    fn test_malformed_tokens() {
        let service = service();
        assert_eq!(service.validate("not-a-token"), Err(TokenError::Malformed));
        assert_eq!(service.validate(""), Err(TokenError::Malformed));
        assert_eq!(service.validate("a.b"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_unparseable_claims() {
        let service = service();
        let token = service.issue_access("42").unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let forged = format!("{}.{}.{}", header, parts[1], parts[2]);
        assert!(matches!(service.validate(&forged), Err(TokenError::Parse(_))));
    }

    #[test]
    fn test_refresh() {
        let service = service();
        let token = service.issue_refresh("7").unwrap();
        let original = service.validate(&token).unwrap();

        let refreshed = service.refresh(&token).unwrap().unwrap();
        let claims = service.validate(&refreshed).unwrap();
        assert_eq!(claims.sub, "7");
        assert_ne!(claims.jti, original.jti);
        assert!(claims.iat >= original.iat);

        // 상태가 없으므로 원래 토큰도 여전히 유효
        assert!(service.validate(&token).is_ok());
    }

    #[test]
    fn test_refresh_expired_returns_none() {
        let service = service();
        let mut claims = Claims::new("7", Duration::from_secs(1));
        claims.exp = Utc::now().timestamp() - 1;
        let token = service.sign(&claims).unwrap();

        assert_eq!(service.refresh(&token), Ok(None));
    }

    #[test]
    fn test_refresh_propagates_other_errors() {
        let service = service();
        assert_eq!(service.refresh("garbage"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_extension_claims_round_trip() {
        let service = service();
        let claims = Claims::new("7", Duration::from_secs(60))
            .with_claim("platform", Value::String("web".to_string()));
        let token = service.sign(&claims).unwrap();

        let decoded = service.validate(&token).unwrap();
        assert_eq!(decoded.extra.get("platform"), Some(&Value::String("web".to_string())));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn issued_subject_survives_validation(subject in "[a-zA-Z0-9_-]{1,40}", ttl in 1u64..100_000) {
            let service = service();
            let token = service.issue(&subject, Duration::from_secs(ttl)).unwrap();
            let claims = service.validate(&token).unwrap();
            prop_assert_eq!(claims.sub, subject);
            prop_assert_eq!(claims.exp - claims.iat, ttl as i64);
        }

        #[test]
        fn corrupted_signature_never_validates(
            subject in "[0-9]{1,12}",
            position in 0usize..512,
            replacement in "[A-Za-z0-9_-]",
        ) {
            let service = service();
            let token = service.issue_access(&subject).unwrap();
            let replacement = replacement.chars().next().unwrap();
            let corrupted = corrupt_signature(&token, position, replacement);
            prop_assume!(corrupted.is_some());
            prop_assert_eq!(
                service.validate(&corrupted.unwrap()),
                Err(TokenError::SignatureInvalid)
            );
        }
    }
}
