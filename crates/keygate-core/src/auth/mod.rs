//! 자격증명 인증.
//!
//! 인증 방식별 전략을 등록하고 자격증명을 알맞은 전략으로 전달합니다.
//!
//! # 구성 요소
//!
//! - [`Credential`]: 인증 방식별 자격증명
//! - [`AuthenticationStrategy`]: 인증 방식 하나를 처리하는 전략
//! - [`AuthenticationDispatcher`]: 방식별 전략 레지스트리
//! - [`UserDirectory`], [`CredentialEncoder`], [`SmsCodeVerifier`]: 외부 협력자
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! let dispatcher = AuthenticationDispatcher::new()
//!     .with_strategy(Arc::new(PasswordStrategy::new(directory, encoder)));
//!
//! let principal = dispatcher.dispatch(&Credential::password("alice", "pw123")).await?;
//! ```

mod credential;
mod directory;
mod dispatcher;
mod encoder;
mod strategy;

pub use credential::{AuthMethod, Credential};
pub use directory::{InMemoryUserDirectory, UserDirectory, UserRecord};
pub use dispatcher::AuthenticationDispatcher;
pub use encoder::{hash_password, Argon2CredentialEncoder, CredentialEncoder, PasswordError};
pub use strategy::{AuthenticationStrategy, PasswordStrategy, PhoneCodeStrategy, SmsCodeVerifier};
