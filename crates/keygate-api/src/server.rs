//! 라우터 조립과 백그라운드 태스크.
//!
//! - 전체 라우터: 인증 필터, 요청 추적, 30초 타임아웃, CORS
//! - SIGHUP 키 재로드 태스크
//! - 만료 SMS 코드 정리 태스크

use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, middleware, Router};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use keygate_core::{KeyLoadError, KeyManager, KeyMaterial, SmsCodeService};

use crate::auth::authenticate_request;
use crate::routes::create_api_router;
use crate::state::AppState;

/// 요청 타임아웃.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 키 재로드 실패.
#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error(transparent)]
    Load(#[from] KeyLoadError),

    #[error("reload task panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// CORS 레이어 생성.
///
/// CORS_ORIGINS 환경변수가 설정되어 있으면 해당 origin만 허용합니다.
/// 설정되지 않으면 개발 모드로 간주하여 모든 origin을 허용합니다.
/// 클라이언트가 토큰을 읽을 수 있도록 `Authorization` 헤더를 노출합니다.
///
/// # 환경변수
///
/// - `CORS_ORIGINS`: 쉼표로 구분된 허용 origin 목록
///   예: `https://app.example.com,https://admin.example.com`
pub fn cors_layer() -> CorsLayer {
    let configured = std::env::var("CORS_ORIGINS")
        .ok()
        .filter(|origins| !origins.is_empty());

    let (allow_origin, restricted) = match &configured {
        Some(origins) => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                warn!("CORS_ORIGINS is set but contains no valid origins, allowing any");
                (AllowOrigin::any(), false)
            } else {
                info!("CORS configured with {} allowed origins", origins.len());
                (AllowOrigin::list(origins), true)
            }
        }
        None => {
            warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
            (AllowOrigin::any(), false)
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        .expose_headers([axum::http::header::AUTHORIZATION])
        // 와일드카드 origin과 함께 쓸 수 없음
        .allow_credentials(restricted)
        .max_age(Duration::from_secs(3600))
}

/// 전체 라우터 생성.
///
/// 인증 필터는 모든 라우트 앞에서 실행되며, 토큰이 없는 요청은 미인증 상태로 통과합니다.
pub fn create_router(state: Arc<AppState>) -> Router {
    create_api_router()
        .layer(middleware::from_fn_with_state(
            state.clone(),
            authenticate_request,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 전역 타임아웃 (30초) - 408 상태 코드 반환
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(cors_layer())
}

/// 외부 키 파일을 다시 읽습니다.
///
/// 파일 I/O는 blocking 풀에서 실행됩니다. 실패해도 기존 키쌍은 유지됩니다.
pub async fn reload_keys(keys: Arc<KeyManager>) -> Result<Arc<KeyMaterial>, ReloadError> {
    let material = tokio::task::spawn_blocking(move || keys.reload()).await??;
    Ok(material)
}

/// SIGHUP 수신 시 키쌍을 재로드하는 태스크를 시작합니다.
///
/// 시그널 핸들러를 설치할 수 없으면 `None`을 반환합니다.
#[cfg(unix)]
pub fn spawn_key_reload_task(
    keys: Arc<KeyManager>,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    if !keys.is_external_file_enabled() {
        info!("External key files disabled, SIGHUP reload not installed");
        return None;
    }

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "Failed to install SIGHUP handler, key reload disabled");
            return None;
        }
    };

    info!("SIGHUP key reload handler installed");

    Some(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    info!("Received SIGHUP, reloading RSA key pair");
                    match reload_keys(keys.clone()).await {
                        Ok(material) => info!(
                            fingerprint = %material.fingerprint(),
                            "Key reload completed"
                        ),
                        Err(e) => error!(
                            error = %e,
                            "Key reload failed, keeping previous key pair"
                        ),
                    }
                }
            }
        }
        debug!("Key reload task stopped");
    }))
}

#[cfg(not(unix))]
pub fn spawn_key_reload_task(
    _keys: Arc<KeyManager>,
    _shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    warn!("SIGHUP is not available on this platform, key reload disabled");
    None
}

/// 만료된 SMS 코드를 주기적으로 정리하는 태스크를 시작합니다.
pub fn spawn_sms_purge_task(
    sms: Arc<SmsCodeService>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let purged = sms.purge_expired().await;
                    if purged > 0 {
                        debug!(purged, "Expired SMS codes purged");
                    }
                }
            }
        }
    })
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
/// 핸들러 설치에 실패한 시그널은 무시하고 나머지 시그널을 기다립니다.
pub async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
        _ = shutdown_token.cancelled() => {}
    }

    // 모든 백그라운드 태스크에 종료 시그널 전파
    shutdown_token.cancel();
    info!("Shutdown signal propagated to background tasks");
}
