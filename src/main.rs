use std::sync::Arc;

use anyhow::Context;

use sofia_intake::api::{ApiState, api_routes};
use sofia_intake::backend::{
    HttpRecordApi, MetadataTokenProvider, RecordClient, StaticTokenProvider, TokenProvider,
};
use sofia_intake::bridge::{
    AgentClient, BridgeState, HttpAgentClient, LocalAgent, TwilioSmsSender, bridge_routes,
};
use sofia_intake::config::IntakeConfig;
use sofia_intake::dialogue::{DialogueEngine, RuleInterpreter};
use sofia_intake::session::{LibSqlSessionStore, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = IntakeConfig::from_env().context("invalid configuration")?;

    eprintln!("Sofía intake v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   App: {}", config.app_name);
    eprintln!("   Record API: {}", config.backend.base_url);
    eprintln!("   Database: {}", config.db_path.display());

    // ── Session store ────────────────────────────────────────────────────
    let store: Arc<dyn SessionStore> = Arc::new(
        LibSqlSessionStore::new_local(&config.db_path)
            .await
            .with_context(|| format!("failed to open session store at {}", config.db_path.display()))?,
    );

    // ── Record backend ───────────────────────────────────────────────────
    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let tokens: Arc<dyn TokenProvider> = match &config.backend.static_token {
        Some(token) => {
            eprintln!("   Auth: static token");
            Arc::new(StaticTokenProvider::new(token.clone()))
        }
        None => {
            eprintln!("   Auth: metadata identity token");
            Arc::new(MetadataTokenProvider::new(http.clone()))
        }
    };
    let records = RecordClient::new(Arc::new(HttpRecordApi::new(
        config.backend.base_url.clone(),
        http.clone(),
        tokens,
        config.backend.timeouts,
    )));

    // ── Dialogue ─────────────────────────────────────────────────────────
    let mut engine = DialogueEngine::new(store, records, Arc::new(RuleInterpreter::new()))
        .with_policy(config.verification);
    if let Some(year) = config.reference_year {
        engine = engine.with_reference_year(year);
    }
    let engine = Arc::new(engine);

    let mut app = api_routes(ApiState {
        engine: Arc::clone(&engine),
    });

    // ── Telephony bridge ─────────────────────────────────────────────────
    match &config.twilio {
        Some(twilio) => {
            let agent: Arc<dyn AgentClient> = match &config.agent_base_url {
                Some(url) => {
                    eprintln!("   Bridge: forwarding to {url}");
                    Arc::new(HttpAgentClient::new(url.clone(), http.clone()))
                }
                None => Arc::new(LocalAgent::new(Arc::clone(&engine))),
            };
            let sms = Arc::new(TwilioSmsSender::new(
                http.clone(),
                twilio.account_sid.clone(),
                twilio.auth_token.clone(),
                twilio.phone_number.clone(),
            ));
            app = app.merge(bridge_routes(BridgeState {
                agent,
                sms,
                app_name: config.app_name.clone(),
                voice_language: config.voice_language.clone(),
            }));
            eprintln!("   Bridge: enabled (SMS from {})", twilio.phone_number);
        }
        None => eprintln!("   Bridge: disabled"),
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Sofía intake listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
