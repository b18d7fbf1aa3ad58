//! # Keygate Core
//!
//! RSA 키쌍 기반 인증 서브시스템의 핵심 구성 요소를 제공합니다.
//!
//! - RSA 암호화/서명 및 키 직렬화
//! - 계층형 키 소스와 원자적 키 재로드
//! - RS256 토큰 발급/검증/갱신
//! - 인증 방식별 전략 디스패치
//! - SMS 인증 코드 캐시
//! - 설정 관리 및 로깅 인프라

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod logging;
pub mod principal;
pub mod service;
pub mod sms;
pub mod token;

pub use auth::{AuthMethod, AuthenticationDispatcher, Credential, UserDirectory};
pub use config::*;
pub use crypto::{CryptoError, EncodedKeyPair, RsaCryptoProvider};
pub use error::*;
pub use keys::{KeyManager, KeyMaterial, KeySource};
pub use logging::*;
pub use principal::*;
pub use service::{AuthService, LoginResponse, RefreshResponse};
pub use sms::{SmsCodeService, SmsError};
pub use token::{Claims, TokenPair, TokenService};
