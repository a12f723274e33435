use std::sync::Arc;

use relay_core::config::Config;
use relay_openai::{OpenAiAssistantClient, OpenAiConfig};

#[tokio::main]
async fn main() -> Result<(), relay_core::Error> {
    relay_core::logging::init("relay")?;

    let cfg = Arc::new(Config::load()?);

    let completion = Arc::new(OpenAiAssistantClient::new(OpenAiConfig::from(
        cfg.as_ref(),
    ))?);

    relay_telegram::router::run_polling(cfg, completion)
        .await
        .map_err(|e| relay_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
