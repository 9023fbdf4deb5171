pub mod bot_client;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod server;
pub mod state;

pub use bot_client::{BotBackend, BotButton, BotError, BotReply, RasaBotClient};
pub use error::AppError;
pub use server::{app_config, run_server, ServerConfig};
pub use state::AppState;
