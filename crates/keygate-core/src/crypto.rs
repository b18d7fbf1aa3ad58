//! # 암호화 모듈
//!
//! RSA 키쌍 기반의 암호화/복호화, 서명/검증 및 키 직렬화 기능을 제공합니다.
//!
//! ## 형식
//! - 암호화: RSA PKCS#1 v1.5 패딩
//! - 서명: SHA256withRSA (PKCS#1 v1.5)
//! - 개인키: PKCS#8 DER, 공개키: X.509 SubjectPublicKeyInfo DER
//! - 모든 바이너리 값은 표준 Base64로 인코딩
//!
//! 키 문자열은 Base64 DER 또는 PEM 형식 모두 허용합니다.

use base64::{engine::general_purpose::STANDARD, Engine};
use rsa::{
    pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey},
    pkcs1v15::{Signature, SigningKey, VerifyingKey},
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding},
    sha2::Sha256,
    signature::{SignatureEncoding, Signer, Verifier},
    Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey,
};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// 기본 RSA 키 길이 (비트)
pub const DEFAULT_KEY_BITS: usize = 2048;

/// 허용하는 최소 RSA 키 길이 (비트)
pub const MIN_KEY_BITS: usize = 2048;

/// 암호화 에러
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Key size too small: expected at least 2048 bits, got {0}")]
    KeyTooSmall(usize),

    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Key encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Base64 decode error: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),

    #[error("UTF-8 decode error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),
}

/// 인코딩된 RSA 키쌍.
///
/// 개인키는 Base64 PKCS#8, 공개키는 Base64 SPKI 형식입니다.
#[derive(Debug, Clone)]
pub struct EncodedKeyPair {
    /// Base64 PKCS#8 개인키
    pub private_key: SecretString,
    /// Base64 SPKI 공개키
    pub public_key: String,
}

/// RSA 암호화 제공자.
///
/// 상태가 없으며 모든 연산은 호출자가 전달한 키로 수행됩니다.
pub struct RsaCryptoProvider;

impl RsaCryptoProvider {
    /// 새 RSA 키쌍을 생성합니다.
    ///
    /// 부트스트랩 및 테스트 용도입니다. `bits`가 [`MIN_KEY_BITS`]보다 작으면 실패합니다.
    pub fn generate_key_pair(bits: usize) -> Result<EncodedKeyPair, CryptoError> {
        if bits < MIN_KEY_BITS {
            return Err(CryptoError::KeyTooSmall(bits));
        }

        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;
        let public_key = RsaPublicKey::from(&private_key);

        Ok(EncodedKeyPair {
            private_key: Self::encode_private_key(&private_key)?,
            public_key: Self::encode_public_key(&public_key)?,
        })
    }

    /// 평문을 공개키로 암호화하여 Base64 문자열로 반환합니다.
    pub fn encrypt(plaintext: &str, public_key: &RsaPublicKey) -> Result<String, CryptoError> {
        let mut rng = rand::thread_rng();
        let ciphertext = public_key
            .encrypt(&mut rng, Pkcs1v15Encrypt, plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(STANDARD.encode(ciphertext))
    }

    /// Base64 암호문을 개인키로 복호화합니다.
    ///
    /// 잘못된 Base64, 잘못된 키/패딩, UTF-8이 아닌 결과는 모두 에러입니다.
    pub fn decrypt(ciphertext: &str, private_key: &RsaPrivateKey) -> Result<String, CryptoError> {
        let bytes = STANDARD.decode(ciphertext.trim())?;
        let plaintext = private_key
            .decrypt(Pkcs1v15Encrypt, &bytes)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        Ok(String::from_utf8(plaintext)?)
    }

    /// 데이터에 SHA256withRSA 서명을 생성하여 Base64로 반환합니다.
    pub fn sign(data: &[u8], private_key: &RsaPrivateKey) -> Result<String, CryptoError> {
        let signing_key = SigningKey::<Sha256>::new(private_key.clone());
        let signature = signing_key
            .try_sign(data)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

        Ok(STANDARD.encode(signature.to_vec()))
    }

    /// SHA256withRSA 서명을 검증합니다.
    ///
    /// 서명이 암호학적으로 맞지 않으면 `Ok(false)`를 반환하고,
    /// 서명 문자열 자체를 해석할 수 없을 때만 에러를 반환합니다.
    pub fn verify(
        data: &[u8],
        signature: &str,
        public_key: &RsaPublicKey,
    ) -> Result<bool, CryptoError> {
        let bytes = STANDARD.decode(signature.trim())?;
        if bytes.is_empty() {
            return Err(CryptoError::MalformedSignature("empty signature".to_string()));
        }
        let signature = Signature::try_from(bytes.as_slice())
            .map_err(|e| CryptoError::MalformedSignature(e.to_string()))?;

        let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
        Ok(verifying_key.verify(data, &signature).is_ok())
    }

    /// 개인키 문자열을 파싱합니다 (Base64 PKCS#8/PKCS#1 DER 또는 PEM).
    pub fn parse_private_key(encoded: &str) -> Result<RsaPrivateKey, CryptoError> {
        let encoded = encoded.trim();
        if encoded.starts_with("-----BEGIN") {
            return if encoded.contains("BEGIN RSA PRIVATE KEY") {
                RsaPrivateKey::from_pkcs1_pem(encoded)
                    .map_err(|e| CryptoError::InvalidKey(e.to_string()))
            } else {
                RsaPrivateKey::from_pkcs8_pem(encoded)
                    .map_err(|e| CryptoError::InvalidKey(e.to_string()))
            };
        }

        let der = decode_base64_body(encoded)?;
        RsaPrivateKey::from_pkcs8_der(&der)
            .or_else(|_| RsaPrivateKey::from_pkcs1_der(&der))
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// 공개키 문자열을 파싱합니다 (Base64 SPKI/PKCS#1 DER 또는 PEM).
    pub fn parse_public_key(encoded: &str) -> Result<RsaPublicKey, CryptoError> {
        let encoded = encoded.trim();
        if encoded.starts_with("-----BEGIN") {
            return if encoded.contains("BEGIN RSA PUBLIC KEY") {
                RsaPublicKey::from_pkcs1_pem(encoded)
                    .map_err(|e| CryptoError::InvalidKey(e.to_string()))
            } else {
                RsaPublicKey::from_public_key_pem(encoded)
                    .map_err(|e| CryptoError::InvalidKey(e.to_string()))
            };
        }

        let der = decode_base64_body(encoded)?;
        RsaPublicKey::from_public_key_der(&der)
            .or_else(|_| RsaPublicKey::from_pkcs1_der(&der))
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// 개인키를 Base64 PKCS#8 DER로 인코딩합니다.
    pub fn encode_private_key(private_key: &RsaPrivateKey) -> Result<SecretString, CryptoError> {
        let der = private_key
            .to_pkcs8_der()
            .map_err(|e| CryptoError::EncodingFailed(e.to_string()))?;
        Ok(SecretString::from(STANDARD.encode(der.as_bytes())))
    }

    /// 공개키를 Base64 SPKI DER로 인코딩합니다.
    pub fn encode_public_key(public_key: &RsaPublicKey) -> Result<String, CryptoError> {
        let der = public_key
            .to_public_key_der()
            .map_err(|e| CryptoError::EncodingFailed(e.to_string()))?;
        Ok(STANDARD.encode(der.as_bytes()))
    }

    /// 인코딩된 키쌍을 PEM 문자열 쌍 `(private, public)`으로 변환합니다.
    pub fn to_pem(pair: &EncodedKeyPair) -> Result<(SecretString, String), CryptoError> {
        let private_key = Self::parse_private_key(pair.private_key.expose_secret())?;
        let public_key = Self::parse_public_key(&pair.public_key)?;

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::EncodingFailed(e.to_string()))?;
        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::EncodingFailed(e.to_string()))?;

        Ok((SecretString::from(private_pem.as_str()), public_pem))
    }
}

/// 공백과 줄바꿈을 제거한 뒤 Base64 디코딩
fn decode_base64_body(encoded: &str) -> Result<Vec<u8>, CryptoError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(STANDARD.decode(compact)?)
}
