/// Cached group administrator lookups
pub mod admin_cache;
/// `ChatGateway` implementation over the Bot API
pub mod gateway;
/// Command parsing and handler dispatch
pub mod handlers;
/// Conversion of Telegram messages into the core message model
pub mod inbound;
/// Retry of Telegram API operations on transient failures
pub mod resilient;

pub use admin_cache::AdminCache;
pub use gateway::TelegramGateway;
