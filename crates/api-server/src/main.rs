use std::sync::Arc;

use api_server::http;
use shared::answer_cache::AnswerCache;
use shared::answers::AnswerService;
use shared::chat_log::ChatLog;
use shared::config::{ApiConfig, load_dotenv};
use shared::faq::FaqCatalog;
use shared::llm::OpenAiGateway;
use shared::security::{NonceCipher, ReplayGuard, TokenService};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(err) = load_dotenv() {
        eprintln!("{err}");
        std::process::exit(1);
    }

    init_tracing();

    let config = match ApiConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to read config");
            std::process::exit(1);
        }
    };

    let cipher = match NonceCipher::new(config.nonce_encryption_key.as_bytes()) {
        Ok(cipher) => cipher,
        Err(err) => {
            error!(error = %err, "failed to initialise nonce cipher");
            std::process::exit(1);
        }
    };

    let faqs = match FaqCatalog::load(&config.faq_path) {
        Ok(faqs) => faqs,
        Err(err) => {
            error!(error = %err, "failed to load faq catalog");
            std::process::exit(1);
        }
    };

    let chat_log = match ChatLog::new(config.chat_log_dir.clone()) {
        Ok(chat_log) => chat_log,
        Err(err) => {
            error!(error = %err, "failed to prepare chat log directory");
            std::process::exit(1);
        }
    };

    let gateway = match OpenAiGateway::new(config.openai.clone()) {
        Ok(gateway) => gateway,
        Err(err) => {
            error!(error = %err, "failed to initialise language model gateway");
            std::process::exit(1);
        }
    };

    let replay_guard = Arc::new(ReplayGuard::new(cipher, config.replay_policy));
    if let Some(interval) = config.replay_sweep_interval {
        replay_guard.spawn_sweeper(interval);
    }

    let app = http::build_router(http::AppState {
        tokens: TokenService::new(config.jwt_secret.as_bytes(), config.token_ttl_seconds),
        replay_guard,
        answers: AnswerService::new(
            faqs,
            Arc::new(gateway),
            AnswerCache::new(config.answer_cache_capacity),
            chat_log,
        ),
    });

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, bind_addr = %config.bind_addr, "failed to bind listener");
            std::process::exit(1);
        }
    };

    info!(
        bind_addr = %config.bind_addr,
        max_age_ms = config.replay_policy.max_age_ms,
        clock_skew_ms = config.replay_policy.clock_skew_ms,
        min_interval_ms = config.replay_policy.min_interval_ms,
        "api server listening"
    );

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %err, "server failed");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "api_server=debug,shared=info,tower_http=info".to_string());
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
}
