//! 로그인 및 토큰 기반 사용자 확인.
//!
//! 디스패처, 토큰 서비스, 사용자 디렉터리를 묶어 로그인/갱신/토큰 확인 흐름을 제공합니다.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{AuthenticationDispatcher, Credential, UserDirectory};
use crate::crypto::RsaCryptoProvider;
use crate::error::{AuthError, AuthResult, TokenError};
use crate::keys::KeyManager;
use crate::principal::Principal;
use crate::token::TokenService;

/// 로그인 응답.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// 내부 숫자 ID
    pub id: i64,
    /// 외부 사용자 ID
    pub user_id: String,
    /// Access Token
    pub token: String,
    /// Refresh Token
    pub refresh_token: String,
    /// Access Token 만료 시간 (초)
    pub expires_in: u64,
    /// 토큰 타입 (항상 "Bearer")
    pub token_type: String,
}

/// 토큰 갱신 응답.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub token: String,
    pub expires_in: u64,
    pub token_type: String,
}

/// 인증 서비스.
pub struct AuthService {
    dispatcher: Arc<AuthenticationDispatcher>,
    tokens: Arc<TokenService>,
    directory: Arc<dyn UserDirectory>,
    keys: Arc<KeyManager>,
}

impl AuthService {
    pub fn new(
        dispatcher: Arc<AuthenticationDispatcher>,
        tokens: Arc<TokenService>,
        directory: Arc<dyn UserDirectory>,
        keys: Arc<KeyManager>,
    ) -> Self {
        Self {
            dispatcher,
            tokens,
            directory,
            keys,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    /// 자격증명으로 로그인하고 토큰 쌍을 발급합니다.
    pub async fn login(&self, credential: &Credential) -> AuthResult<LoginResponse> {
        let principal = self.dispatcher.dispatch(credential).await?;
        let pair = self.tokens.issue_pair(&principal.id.to_string())?;

        Ok(LoginResponse {
            id: principal.id,
            user_id: principal.user_id,
            token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
            token_type: pair.token_type,
        })
    }

    /// 공개키로 암호화된 비밀값을 활성 개인키로 복호화합니다.
    pub fn decrypt_secret(&self, encrypted: &str) -> AuthResult<SecretString> {
        let keys = self.keys.current();
        RsaCryptoProvider::decrypt(encrypted, keys.private_key())
            .map(SecretString::from)
            .map_err(|e| {
                debug!(error = %e, "Encrypted secret could not be decrypted");
                AuthError::InvalidRequest("암호화된 비밀값을 복호화할 수 없습니다".to_string())
            })
    }

    /// Refresh Token으로 새 Access Token을 발급합니다.
    ///
    /// 만료된 토큰은 [`TokenError::Expired`]로 거부됩니다.
    pub fn refresh(&self, refresh_token: &str) -> AuthResult<RefreshResponse> {
        match self.tokens.refresh(refresh_token)? {
            Some(token) => Ok(RefreshResponse {
                token,
                expires_in: self.tokens.access_ttl().as_secs(),
                token_type: "Bearer".to_string(),
            }),
            None => Err(AuthError::Token(TokenError::Expired)),
        }
    }

    /// Bearer 토큰으로 요청 사용자를 확인합니다.
    pub async fn authenticate_token(&self, token: &str) -> AuthResult<Principal> {
        let claims = self.tokens.validate(token)?;

        let id: i64 = claims
            .sub
            .parse()
            .map_err(|_| TokenError::Parse(format!("subject is not a user id: {}", claims.sub)))?;

        match self.directory.find_by_id(id).await? {
            Some(principal) => Ok(principal),
            None => {
                warn!(user_id = id, "Token subject no longer exists");
                Err(AuthError::UserNotFound(claims.sub))
            }
        }
    }

    /// 로그인 요청 비밀값을 준비합니다 (필요 시 복호화).
    pub fn prepare_secret(&self, secret: &str, encrypted: bool) -> AuthResult<SecretString> {
        if encrypted {
            self.decrypt_secret(secret)
        } else {
            Ok(SecretString::from(secret.to_string()))
        }
    }

    /// 활성 공개키 (클라이언트 측 비밀값 암호화용).
    pub fn public_key(&self) -> String {
        self.keys.public_key_string()
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("methods", &self.dispatcher.methods())
            .field("keys", &self.keys)
            .finish()
    }
}

/// 비밀값 노출 없이 길이만 확인합니다.
pub fn is_blank(secret: &SecretString) -> bool {
    secret.expose_secret().trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        Argon2CredentialEncoder, CredentialEncoder, InMemoryUserDirectory, PasswordStrategy,
        UserRecord,
    };
    use crate::config::{SecretConfig, TokenConfig};
    use crate::crypto::test_keys::*;
    use crate::keys::{KeyMaterial, KeySource};
    use crate::principal::{AuthRecord, CredentialType};

    async fn auth_service() -> AuthService {
        let material =
            KeyMaterial::from_strings(PRIMARY_PRIVATE, PRIMARY_PUBLIC, KeySource::Config).unwrap();
        let keys = Arc::new(KeyManager::from_material(material, &SecretConfig::default()));
        let tokens = Arc::new(TokenService::new(keys.clone(), &TokenConfig::default()));

        let directory = Arc::new(InMemoryUserDirectory::new());
        let digest = Argon2CredentialEncoder.encode("pw123").unwrap();
        directory
            .insert(
                UserRecord::new(7, "u-7", "alice")
                    .with_record(AuthRecord::password(CredentialType::Password, "alice", digest)),
            )
            .await
            .unwrap();

        let dispatcher = AuthenticationDispatcher::new().with_strategy(Arc::new(
            PasswordStrategy::new(directory.clone(), Arc::new(Argon2CredentialEncoder)),
        ));

        AuthService::new(Arc::new(dispatcher), tokens, directory, keys)
    }

    #[tokio::test]
    async fn test_login_issues_tokens_for_principal() {
        let service = auth_service().await;
        let response = service
            .login(&Credential::password("alice", "pw123"))
            .await
            .unwrap();

        assert_eq!(response.id, 7);
        assert_eq!(response.user_id, "u-7");
        let access = service.tokens().validate(&response.token).unwrap();
        let refresh = service.tokens().validate(&response.refresh_token).unwrap();
        assert_eq!(access.sub, "7");
        assert!(refresh.exp - refresh.iat > access.exp - access.iat);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let service = auth_service().await;
        let result = service.login(&Credential::password("alice", "wrong")).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_with_encrypted_secret() {
        let service = auth_service().await;
        let public_key = RsaCryptoProvider::parse_public_key(&service.public_key()).unwrap();
        let encrypted = RsaCryptoProvider::encrypt("pw123", &public_key).unwrap();

        let secret = service.prepare_secret(&encrypted, true).unwrap();
        let credential = Credential::Password {
            account: "alice".to_string(),
            secret,
        };
        assert!(service.login(&credential).await.is_ok());
    }

    #[tokio::test]
    async fn test_undecryptable_secret() {
        let service = auth_service().await;
        assert!(matches!(
            service.prepare_secret("bm90IGVuY3J5cHRlZA==", true),
            Err(AuthError::InvalidRequest(_))
        ));
        assert!(!is_blank(&service.prepare_secret("pw123", false).unwrap()));
    }

    #[tokio::test]
    async fn test_authenticate_token() {
        let service = auth_service().await;
        let token = service.tokens().issue_access("7").unwrap();
        assert_eq!(service.authenticate_token(&token).await.unwrap().id, 7);

        let missing = service.tokens().issue_access("99").unwrap();
        assert!(matches!(
            service.authenticate_token(&missing).await,
            Err(AuthError::UserNotFound(_))
        ));

        let non_numeric = service.tokens().issue_access("alice").unwrap();
        assert!(matches!(
            service.authenticate_token(&non_numeric).await,
            Err(AuthError::Token(TokenError::Parse(_)))
        ));
    }

    #[tokio::test]
    async fn test_refresh() {
        let service = auth_service().await;
        let refresh_token = service.tokens().issue_refresh("7").unwrap();

        let response = service.refresh(&refresh_token).unwrap();
        assert_eq!(service.tokens().subject(&response.token).unwrap(), "7");
        assert!(matches!(
            service.refresh("garbage"),
            Err(AuthError::Token(TokenError::Malformed))
        ));
    }
}
