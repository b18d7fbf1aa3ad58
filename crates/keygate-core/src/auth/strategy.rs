//! 인증 전략.
//!
//! 인증 방식별 자격증명 검증 구현. 각 전략은 [`AuthMethod`] 하나를 담당하며
//! [`super::AuthenticationDispatcher`]에 등록됩니다.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;

use super::credential::{AuthMethod, Credential};
use super::directory::UserDirectory;
use super::encoder::CredentialEncoder;
use crate::error::{AuthError, AuthResult};
use crate::principal::{CredentialType, Principal};

/// 인증 방식 하나를 처리하는 전략.
#[async_trait]
pub trait AuthenticationStrategy: Send + Sync {
    /// 담당하는 인증 방식.
    fn method(&self) -> AuthMethod;

    /// 자격증명을 검증하고 Principal을 반환합니다.
    async fn authenticate(&self, credential: &Credential) -> AuthResult<Principal>;
}

/// SMS 인증 코드 검증기.
#[async_trait]
pub trait SmsCodeVerifier: Send + Sync {
    /// 코드가 맞으면 `true`. 성공한 코드는 재사용할 수 없습니다.
    async fn verify(&self, phone: &str, code: &str) -> bool;
}

/// 계정 + 비밀번호 전략.
pub struct PasswordStrategy {
    directory: Arc<dyn UserDirectory>,
    encoder: Arc<dyn CredentialEncoder>,
}

impl PasswordStrategy {
    pub fn new(directory: Arc<dyn UserDirectory>, encoder: Arc<dyn CredentialEncoder>) -> Self {
        Self { directory, encoder }
    }
}

#[async_trait]
impl AuthenticationStrategy for PasswordStrategy {
    fn method(&self) -> AuthMethod {
        AuthMethod::Password
    }

    async fn authenticate(&self, credential: &Credential) -> AuthResult<Principal> {
        let Credential::Password { account, secret } = credential else {
            return Err(AuthError::UnsupportedAuthMethod(credential.method()));
        };

        let principal = self
            .directory
            .find_by_account(account)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !matches!(
            principal.auth.credential_type,
            CredentialType::Password | CredentialType::Email
        ) {
            return Err(AuthError::InvalidCredentials);
        }

        let digest = principal
            .auth
            .credential
            .as_ref()
            .ok_or(AuthError::InvalidCredentials)?;

        if !self
            .encoder
            .matches(secret.expose_secret(), digest.expose_secret())
        {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(principal)
    }
}

/// 휴대폰 번호 + SMS 코드 전략.
pub struct PhoneCodeStrategy {
    directory: Arc<dyn UserDirectory>,
    verifier: Arc<dyn SmsCodeVerifier>,
}

impl PhoneCodeStrategy {
    pub fn new(directory: Arc<dyn UserDirectory>, verifier: Arc<dyn SmsCodeVerifier>) -> Self {
        Self {
            directory,
            verifier,
        }
    }
}

#[async_trait]
impl AuthenticationStrategy for PhoneCodeStrategy {
    fn method(&self) -> AuthMethod {
        AuthMethod::PhoneCode
    }

    async fn authenticate(&self, credential: &Credential) -> AuthResult<Principal> {
        let Credential::PhoneCode { phone, code } = credential else {
            return Err(AuthError::UnsupportedAuthMethod(credential.method()));
        };

        let principal = self
            .directory
            .find_by_account(phone)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if principal.auth.credential_type != CredentialType::Phone {
            return Err(AuthError::InvalidCredentials);
        }

        if !self.verifier.verify(phone, code).await {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(principal)
    }
}
