use std::sync::Arc;

use chat_metrics::MetricsAggregator;

use crate::bot_client::{BotBackend, RasaBotClient};
use crate::server::ServerConfig;

/// Shared by every worker. Created once at startup and dropped on
/// shutdown.
pub struct AppState {
    pub metrics: Arc<MetricsAggregator>,
    pub bot: Arc<dyn BotBackend>,
}

impl AppState {
    pub fn new(metrics: Arc<MetricsAggregator>, bot: Arc<dyn BotBackend>) -> Self {
        Self { metrics, bot }
    }

    pub fn from_config(config: &ServerConfig) -> crate::bot_client::Result<Self> {
        log::info!(
            "Creating bot client for {} (timeout {:?})",
            config.bot_url,
            config.bot_timeout
        );
        let bot = RasaBotClient::with_timeout(config.bot_url.clone(), config.bot_timeout)?;
        Ok(Self::new(Arc::new(MetricsAggregator::new()), Arc::new(bot)))
    }
}
