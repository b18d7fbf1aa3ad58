//! SMS 인증 코드 관리.
//!
//! 코드 발급/검증을 위한 메모리 TTL 캐시입니다. 실제 문자 발송 게이트웨이는 없으며
//! 발급된 코드는 호출자에게 반환됩니다.
//!
//! - 휴대폰 번호 형식: `1[3-9]` + 숫자 9자리 (총 11자리)
//! - 코드는 한 번만 사용할 수 있으며 만료된 코드는 검증 시 제거됩니다.
//! - 같은 번호로 재발송하려면 `resend_interval_secs`가 지나야 합니다.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::auth::SmsCodeVerifier;
use crate::config::SmsConfig;

/// SMS 코드 에러.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SmsError {
    /// 휴대폰 번호 형식 오류
    #[error("휴대폰 번호 형식이 올바르지 않습니다: {0}")]
    InvalidPhone(String),

    /// 재발송 간격 미달
    #[error("인증 코드 요청이 너무 잦습니다. {retry_after_secs}초 후 다시 시도하세요")]
    TooFrequent { retry_after_secs: u64 },
}

#[derive(Debug)]
struct CodeEntry {
    code: String,
    issued_at: Instant,
    expires_at: Instant,
}

/// 발급된 인증 코드.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    pub phone: String,
    pub code: String,
    pub expires_in: Duration,
}

/// SMS 인증 코드 서비스.
pub struct SmsCodeService {
    config: SmsConfig,
    codes: Mutex<HashMap<String, CodeEntry>>,
}

impl SmsCodeService {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            config,
            codes: Mutex::new(HashMap::new()),
        }
    }

    /// 휴대폰 번호 형식 검사.
    pub fn is_valid_phone(phone: &str) -> bool {
        let bytes = phone.as_bytes();
        bytes.len() == 11
            && bytes.iter().all(u8::is_ascii_digit)
            && bytes[0] == b'1'
            && (b'3'..=b'9').contains(&bytes[1])
    }

    /// 새 코드를 발급합니다. 같은 번호의 이전 코드는 대체됩니다.
    pub async fn send_code(&self, phone: &str) -> Result<IssuedCode, SmsError> {
        if !Self::is_valid_phone(phone) {
            return Err(SmsError::InvalidPhone(phone.to_string()));
        }

        let code = self.generate_code();
        let ttl = Duration::from_secs(self.config.code_ttl_secs);
        let interval = Duration::from_secs(self.config.resend_interval_secs);
        let now = Instant::now();

        let mut codes = self.codes.lock().await;
        if let Some(existing) = codes.get(phone) {
            let elapsed = now.duration_since(existing.issued_at);
            if elapsed < interval && existing.expires_at > now {
                let remaining = interval - elapsed;
                return Err(SmsError::TooFrequent {
                    retry_after_secs: remaining.as_secs().max(1),
                });
            }
        }

        codes.insert(
            phone.to_string(),
            CodeEntry {
                code: code.clone(),
                issued_at: now,
                expires_at: now + ttl,
            },
        );

        info!(phone = %mask_phone(phone), ttl_secs = ttl.as_secs(), "SMS code issued");
        Ok(IssuedCode {
            phone: phone.to_string(),
            code,
            expires_in: ttl,
        })
    }

    /// 코드를 검증합니다. 일치하면 코드를 소비합니다.
    pub async fn verify_code(&self, phone: &str, code: &str) -> bool {
        let now = Instant::now();
        let mut codes = self.codes.lock().await;

        let Some(entry) = codes.get(phone) else {
            debug!(phone = %mask_phone(phone), "No SMS code pending");
            return false;
        };

        if entry.expires_at <= now {
            codes.remove(phone);
            debug!(phone = %mask_phone(phone), "SMS code expired");
            return false;
        }

        if entry.code != code {
            return false;
        }

        codes.remove(phone);
        true
    }

    /// 만료된 코드를 모두 제거하고 제거 개수를 반환합니다.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut codes = self.codes.lock().await;
        let before = codes.len();
        codes.retain(|_, entry| entry.expires_at > now);
        before - codes.len()
    }

    /// 대기 중인 코드 수.
    pub async fn pending(&self) -> usize {
        self.codes.lock().await.len()
    }

    fn generate_code(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..self.config.code_length)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect()
    }
}

#[async_trait]
impl SmsCodeVerifier for SmsCodeService {
    async fn verify(&self, phone: &str, code: &str) -> bool {
        self.verify_code(phone, code).await
    }
}

/// 로그용 휴대폰 번호 마스킹 (`138****8000`).
pub fn mask_phone(phone: &str) -> String {
    if phone.len() == 11 && phone.is_ascii() {
        format!("{}****{}", &phone[..3], &phone[7..])
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHONE: &str = "13800138000";

    fn service() -> SmsCodeService {
        SmsCodeService::new(SmsConfig::default())
    }

    #[test]
    fn test_phone_format() {
        assert!(SmsCodeService::is_valid_phone("13800138000"));
        assert!(SmsCodeService::is_valid_phone("19912345678"));
        assert!(!SmsCodeService::is_valid_phone("12800138000"));
        assert!(!SmsCodeService::is_valid_phone("1380013800"));
        assert!(!SmsCodeService::is_valid_phone("23800138000"));
        assert!(!SmsCodeService::is_valid_phone("1380013800a"));
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone(PHONE), "138****8000");
        assert_eq!(mask_phone("bad"), "***");
    }

    #[tokio::test]
    async fn test_send_and_verify_once() {
        let service = service();
        let issued = service.send_code(PHONE).await.unwrap();

        assert_eq!(issued.code.len(), 6);
        assert!(issued.code.chars().all(|c| c.is_ascii_digit()));
        assert!(service.verify_code(PHONE, &issued.code).await);
        // 한 번만 사용 가능
        assert!(!service.verify_code(PHONE, &issued.code).await);
    }

    #[tokio::test]
    async fn test_wrong_code_keeps_entry() {
        let service = service();
        let issued = service.send_code(PHONE).await.unwrap();
        let wrong = if issued.code == "000000" { "111111" } else { "000000" };

        assert!(!service.verify_code(PHONE, wrong).await);
        assert!(service.verify_code(PHONE, &issued.code).await);
    }

    #[tokio::test]
    async fn test_invalid_phone() {
        let result = service().send_code("12345").await;
        assert_eq!(result.unwrap_err(), SmsError::InvalidPhone("12345".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resend_interval() {
        let service = service();
        service.send_code(PHONE).await.unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(
            service.send_code(PHONE).await.unwrap_err(),
            SmsError::TooFrequent {
                retry_after_secs: 50
            }
        );

        tokio::time::advance(Duration::from_secs(50)).await;
        assert!(service.send_code(PHONE).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_code_removed_on_verify() {
        let service = service();
        let issued = service.send_code(PHONE).await.unwrap();

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(!service.verify_code(PHONE, &issued.code).await);
        assert_eq!(service.pending().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let service = service();
        service.send_code(PHONE).await.unwrap();
        service.send_code("13900139000").await.unwrap();

        tokio::time::advance(Duration::from_secs(200)).await;
        assert_eq!(service.purge_expired().await, 0);

        tokio::time::advance(Duration::from_secs(200)).await;
        assert_eq!(service.purge_expired().await, 2);
    }
}
