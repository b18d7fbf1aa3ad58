//! 비밀번호 다이제스트 처리.
//!
//! Argon2 기반 비밀번호 해싱 및 검증.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// 비밀번호 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("비밀번호 해싱 실패")]
    HashingFailed,
    #[error("잘못된 해시 형식")]
    InvalidHashFormat,
}

/// 저장된 비밀값 다이제스트와 입력값을 비교하는 인코더.
pub trait CredentialEncoder: Send + Sync {
    /// 평문을 저장용 다이제스트로 변환합니다.
    fn encode(&self, raw: &str) -> Result<String, PasswordError>;

    /// 평문이 다이제스트와 일치하는지 확인합니다.
    ///
    /// 다이제스트 형식이 잘못된 경우도 불일치로 취급합니다.
    fn matches(&self, raw: &str, digest: &str) -> bool;
}

/// Argon2id 인코더.
///
/// PHC 형식(`$argon2id$v=19$...`) 해시를 사용하며 솔트는 자동으로 생성됩니다.
#[derive(Debug, Default, Clone)]
pub struct Argon2CredentialEncoder;

impl CredentialEncoder for Argon2CredentialEncoder {
    fn encode(&self, raw: &str) -> Result<String, PasswordError> {
        hash_password(raw)
    }

    fn matches(&self, raw: &str, digest: &str) -> bool {
        match PasswordHash::new(digest) {
            Ok(parsed) => Argon2::default()
                .verify_password(raw.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => {
                tracing::warn!("Stored credential digest is not a valid PHC string");
                false
            }
        }
    }
}

/// 비밀번호 해싱.
///
/// ```rust,ignore
/// let hash = hash_password("my_secure_password").unwrap();
/// // "$argon2id$v=19$m=19456,t=2,p=1$..."
/// ```
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| PasswordError::HashingFailed)?;

    Ok(hash.to_string())
}
