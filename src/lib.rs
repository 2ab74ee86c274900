pub mod config;
pub mod context;
pub mod documents;
pub mod logging;
pub mod model;
pub mod model_gateway;
pub mod providers;
pub mod repl;
pub mod session;
pub mod transcript;

use anyhow::Result;
use tracing::info;

use config::Config;
use model_gateway::OpenRouterGateway;
use repl::run_repl;
use session::ChatSession;

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init();

    let cfg = Config::from_env();
    info!(
        api_url = %cfg.api_url,
        model = %cfg.model,
        max_tokens = cfg.max_tokens,
        api_key_set = cfg.api_key.is_some(),
        context_max_messages = ?cfg.context_max_messages,
        document_max_bytes = ?cfg.document_limit.max_bytes,
        document_oversize = cfg.document_limit.on_oversize.as_str(),
        "loaded runtime configuration"
    );

    let gateway = OpenRouterGateway::new(cfg.clone())?;
    let mut session = ChatSession::from_config(gateway, &cfg);
    run_repl(&mut session).await
}
