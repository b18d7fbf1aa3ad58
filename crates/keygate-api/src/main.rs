//! 인증 API 서버.
//!
//! 설정과 RSA 키쌍을 로드한 뒤 Axum 서버를 시작합니다.
//! `--generate-keys <dir>`로 실행하면 새 PEM 키쌍을 기록하고 종료합니다.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use keygate_api::server::{
    create_router, shutdown_signal, spawn_key_reload_task, spawn_sms_purge_task,
};
use keygate_api::state::AppState;
use keygate_core::crypto::DEFAULT_KEY_BITS;
use keygate_core::keys::write_key_files;
use keygate_core::{init_logging, AppConfig, KeyManager, LogConfig, RsaCryptoProvider};

/// 기본 설정 파일 경로.
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// SMS 코드 정리 주기.
const SMS_PURGE_PERIOD: Duration = Duration::from_secs(60);

/// 키 생성 처리.
///
/// `--generate-keys <dir>` 플래그가 있으면 새 키쌍을 `<dir>`에 기록하고
/// 프로세스를 종료합니다.
fn handle_generate_keys() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(_) = args.by_ref().find(|arg| arg == "--generate-keys") else {
        return Ok(());
    };

    let dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./keys"));

    let pair = RsaCryptoProvider::generate_key_pair(DEFAULT_KEY_BITS)?;
    let (private_pem, public_pem) = RsaCryptoProvider::to_pem(&pair)?;
    write_key_files(&dir, &private_pem, &public_pem)?;

    println!("RSA key pair written to {}", dir.display());
    std::process::exit(0);
}

/// 설정 로드.
///
/// `KEYGATE_CONFIG` 환경변수가 있으면 해당 파일을, 없으면 기본 경로를 사용합니다.
/// 기본 경로에 파일이 없으면 기본값과 환경변수만으로 구성합니다.
fn load_config() -> anyhow::Result<AppConfig> {
    match std::env::var("KEYGATE_CONFIG") {
        Ok(path) => Ok(AppConfig::load(path)?),
        Err(_) if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Ok(AppConfig::load_default()?)
        }
        Err(_) => Ok(AppConfig::load_from_env()?),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    // 키 생성 처리 (서버 시작 전)
    handle_generate_keys()?;

    let config = load_config()?;

    // tracing 초기화
    init_logging(LogConfig::from_settings(&config.logging).with_env_overrides())
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    info!("Starting Keygate API server...");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| {
            error!(
                host = %config.server.host,
                port = config.server.port,
                error = %e,
                "소켓 주소 설정이 유효하지 않습니다. server.host, server.port 설정을 확인하세요."
            );
            e
        })?;

    // 키쌍 로드 (실패 시 시작 중단)
    let keys = match KeyManager::load(&config.secret) {
        Ok(keys) => Arc::new(keys),
        Err(e) => {
            error!(error = %e, "Failed to load RSA key pair");
            return Err(e.into());
        }
    };

    let state = Arc::new(AppState::new(config, keys.clone()));
    info!(
        version = %state.version,
        key_source = %keys.source(),
        fingerprint = %keys.current().fingerprint(),
        auth = ?state.auth,
        "Application state initialized"
    );

    // 전역 종료 토큰 생성 (graceful shutdown용, 백그라운드 태스크에서 사용)
    let shutdown_token = CancellationToken::new();

    let reload_task = spawn_key_reload_task(keys, shutdown_token.clone());
    let purge_task = spawn_sms_purge_task(state.sms.clone(), SMS_PURGE_PERIOD, shutdown_token.clone());

    let app = create_router(state);

    info!(%addr, "API server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    info!("Server shutdown initiated, cleaning up...");

    // 종료 토큰 취소 (백그라운드 태스크에 종료 시그널 전파)
    shutdown_token.cancel();

    // 정리 작업에 최대 10초 대기
    let cleanup = tokio::time::timeout(Duration::from_secs(10), async {
        if let Some(task) = reload_task {
            let _ = task.await;
        }
        let _ = purge_task.await;
    })
    .await;

    if cleanup.is_err() {
        warn!("Cleanup timeout, forcing shutdown");
    }

    info!("Server stopped gracefully");

    Ok(())
}
