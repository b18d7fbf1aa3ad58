//! RSA 키쌍 관리.
//!
//! 활성 키쌍은 불변 스냅샷([`KeyMaterial`])으로 보관되며 `ArcSwap`으로 원자적으로 교체됩니다.
//! 토큰 발급/검증 한 번은 항상 하나의 스냅샷만 사용하므로
//! 재로드 중에도 이전 키와 새 키가 섞이지 않습니다.
//!
//! 키 소스 우선순위:
//! 1. 환경 변수 `SECRET_PRIVATE_KEY` + `SECRET_PUBLIC_KEY` (둘 다 있어야 함)
//! 2. 외부 파일 `<key_file_path>/private_key.pem`, `public_key.pem` (`use_external_file`일 때)
//! 3. 설정의 `secret.private_key`, `secret.public_key`

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::{
    pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey},
    pkcs8::EncodePublicKey,
    sha2::{Digest, Sha256},
    RsaPrivateKey, RsaPublicKey,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SecretConfig;
use crate::crypto::RsaCryptoProvider;
use crate::error::KeyLoadError;

/// 개인키 환경 변수 이름
pub const ENV_PRIVATE_KEY: &str = "SECRET_PRIVATE_KEY";
/// 공개키 환경 변수 이름
pub const ENV_PUBLIC_KEY: &str = "SECRET_PUBLIC_KEY";
/// 외부 개인키 파일 이름
pub const PRIVATE_KEY_FILE: &str = "private_key.pem";
/// 외부 공개키 파일 이름
pub const PUBLIC_KEY_FILE: &str = "public_key.pem";

/// 활성 키쌍을 가져온 소스.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// 환경 변수
    Environment,
    /// 외부 PEM 파일
    ExternalFile,
    /// 정적 설정
    Config,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Environment => write!(f, "environment"),
            KeySource::ExternalFile => write!(f, "external_file"),
            KeySource::Config => write!(f, "config"),
        }
    }
}

/// 불변 키쌍 스냅샷.
///
/// 파싱된 키, 인코딩된 문자열, JWT 서명/검증 키를 함께 보관합니다.
pub struct KeyMaterial {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    private_key_string: SecretString,
    public_key_string: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    source: KeySource,
    fingerprint: String,
    loaded_at: DateTime<Utc>,
}

impl KeyMaterial {
    /// 인코딩된 키 문자열 쌍으로 스냅샷을 만듭니다.
    ///
    /// 두 키가 서로 대응하지 않으면 [`KeyLoadError::Mismatch`]를 반환합니다.
    pub fn from_strings(
        private_key: &str,
        public_key: &str,
        source: KeySource,
    ) -> Result<Self, KeyLoadError> {
        let parse_err = |error| KeyLoadError::Parse {
            source_kind: source,
            error,
        };
        let private = RsaCryptoProvider::parse_private_key(private_key).map_err(parse_err)?;
        let public = RsaCryptoProvider::parse_public_key(public_key).map_err(parse_err)?;

        Self::from_keys(private, public, source)
    }

    /// 파싱된 키쌍으로 스냅샷을 만듭니다.
    pub fn from_keys(
        private_key: RsaPrivateKey,
        public_key: RsaPublicKey,
        source: KeySource,
    ) -> Result<Self, KeyLoadError> {
        if RsaPublicKey::from(&private_key) != public_key {
            return Err(KeyLoadError::Mismatch(source));
        }

        let private_der = private_key
            .to_pkcs1_der()
            .map_err(|e| KeyLoadError::Encoding(e.to_string()))?;
        let public_der = public_key
            .to_pkcs1_der()
            .map_err(|e| KeyLoadError::Encoding(e.to_string()))?;
        let spki_der = public_key
            .to_public_key_der()
            .map_err(|e| KeyLoadError::Encoding(e.to_string()))?;

        let private_key_string = RsaCryptoProvider::encode_private_key(&private_key)
            .map_err(|e| KeyLoadError::Encoding(e.to_string()))?;
        let public_key_string = RsaCryptoProvider::encode_public_key(&public_key)
            .map_err(|e| KeyLoadError::Encoding(e.to_string()))?;

        Ok(Self {
            encoding_key: EncodingKey::from_rsa_der(private_der.as_bytes()),
            decoding_key: DecodingKey::from_rsa_der(public_der.as_bytes()),
            fingerprint: fingerprint(spki_der.as_bytes()),
            private_key,
            public_key,
            private_key_string,
            public_key_string,
            source,
            loaded_at: Utc::now(),
        })
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Base64 PKCS#8 개인키. 로그에 남기지 마십시오.
    pub fn private_key_string(&self) -> &SecretString {
        &self.private_key_string
    }

    /// Base64 SPKI 공개키.
    pub fn public_key_string(&self) -> &str {
        &self.public_key_string
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    pub fn source(&self) -> KeySource {
        self.source
    }

    /// 공개키 SPKI DER의 SHA-256 앞 16자리 (진단용)
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("source", &self.source)
            .field("fingerprint", &self.fingerprint)
            .field("loaded_at", &self.loaded_at)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

fn fingerprint(spki_der: &[u8]) -> String {
    Sha256::digest(spki_der)
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// 활성 RSA 키쌍 관리자.
///
/// 초기화에 성공한 뒤에는 항상 일관된 키쌍 하나를 보유합니다.
pub struct KeyManager {
    active: ArcSwap<KeyMaterial>,
    key_file_path: PathBuf,
    use_external_file: bool,
}

impl KeyManager {
    /// 설정과 프로세스 환경 변수로 키를 로드합니다.
    pub fn load(config: &SecretConfig) -> Result<Self, KeyLoadError> {
        Self::load_with_env(config, |name| std::env::var(name).ok())
    }

    /// 환경 변수 조회 함수를 주입하여 키를 로드합니다.
    pub fn load_with_env<F>(config: &SecretConfig, env: F) -> Result<Self, KeyLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let material = resolve(config, env)?;
        info!(
            source = %material.source(),
            fingerprint = %material.fingerprint(),
            "RSA key pair loaded"
        );

        Ok(Self::from_material(material, config))
    }

    /// 이미 만들어진 스냅샷으로 관리자를 생성합니다.
    pub fn from_material(material: KeyMaterial, config: &SecretConfig) -> Self {
        Self {
            active: ArcSwap::from_pointee(material),
            key_file_path: config.key_file_path.clone(),
            use_external_file: config.use_external_file,
        }
    }

    /// 현재 활성 스냅샷.
    ///
    /// 반환된 `Arc`는 이후 재로드와 무관하게 같은 키쌍을 가리킵니다.
    pub fn current(&self) -> Arc<KeyMaterial> {
        self.active.load_full()
    }

    pub fn private_key(&self) -> RsaPrivateKey {
        self.active.load().private_key().clone()
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.active.load().public_key().clone()
    }

    pub fn private_key_string(&self) -> SecretString {
        self.active.load().private_key_string().clone()
    }

    pub fn public_key_string(&self) -> String {
        self.active.load().public_key_string().to_string()
    }

    /// 활성 키쌍의 소스.
    pub fn source(&self) -> KeySource {
        self.active.load().source()
    }

    /// 외부 파일 모드 여부.
    pub fn is_external_file_enabled(&self) -> bool {
        self.use_external_file
    }

    /// 외부 키 파일에서 키쌍을 다시 읽어 원자적으로 교체합니다.
    ///
    /// 시작 시 어느 소스를 사용했든 항상 외부 파일만 읽습니다.
    /// 파일 읽기를 동반하므로 요청 처리 경로에서 호출하지 마십시오.
    /// 실패하면 기존 키쌍이 그대로 유지됩니다.
    pub fn reload(&self) -> Result<Arc<KeyMaterial>, KeyLoadError> {
        if !self.use_external_file {
            return Err(KeyLoadError::ExternalFileDisabled);
        }

        let material = Arc::new(load_from_files(&self.key_file_path)?);
        let previous = self.active.swap(Arc::clone(&material));

        info!(
            previous = %previous.fingerprint(),
            current = %material.fingerprint(),
            path = %self.key_file_path.display(),
            "RSA key pair reloaded"
        );

        Ok(material)
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("active", &*self.active.load())
            .field("key_file_path", &self.key_file_path)
            .field("use_external_file", &self.use_external_file)
            .finish()
    }
}

fn resolve<F>(config: &SecretConfig, env: F) -> Result<KeyMaterial, KeyLoadError>
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

    match (
        non_empty(env(ENV_PRIVATE_KEY)),
        non_empty(env(ENV_PUBLIC_KEY)),
    ) {
        (Some(private_key), Some(public_key)) => {
            debug!("Using RSA keys from environment");
            return KeyMaterial::from_strings(&private_key, &public_key, KeySource::Environment);
        }
        (Some(_), None) | (None, Some(_)) => {
            warn!(
                "Only one of {} / {} is set, ignoring environment keys",
                ENV_PRIVATE_KEY, ENV_PUBLIC_KEY
            );
        }
        (None, None) => {}
    }

    if config.use_external_file {
        match load_from_files(&config.key_file_path) {
            Ok(material) => return Ok(material),
            Err(e) => warn!(
                error = %e,
                path = %config.key_file_path.display(),
                "External key files unavailable, falling back to configuration"
            ),
        }
    }

    match (
        non_empty(config.private_key.clone()),
        non_empty(config.public_key.clone()),
    ) {
        (Some(private_key), Some(public_key)) => {
            debug!("Using RSA keys from configuration");
            KeyMaterial::from_strings(&private_key, &public_key, KeySource::Config)
        }
        _ => Err(KeyLoadError::NotConfigured),
    }
}

fn load_from_files(dir: &Path) -> Result<KeyMaterial, KeyLoadError> {
    let private_key = SecretString::from(read_key_file(&dir.join(PRIVATE_KEY_FILE))?);
    let public_key = read_key_file(&dir.join(PUBLIC_KEY_FILE))?;

    KeyMaterial::from_strings(
        private_key.expose_secret(),
        &public_key,
        KeySource::ExternalFile,
    )
}

fn read_key_file(path: &Path) -> Result<String, KeyLoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| KeyLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(KeyLoadError::EmptyFile(path.to_path_buf()));
    }
    Ok(trimmed.to_string())
}

/// PEM 키쌍을 디렉터리에 기록합니다 (`private_key.pem`, `public_key.pem`).
///
/// 키 부트스트랩용입니다.
pub fn write_key_files(
    dir: &Path,
    private_pem: &SecretString,
    public_pem: &str,
) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(PRIVATE_KEY_FILE), private_pem.expose_secret())?;
    std::fs::write(dir.join(PUBLIC_KEY_FILE), public_pem)?;
    Ok(())
}
