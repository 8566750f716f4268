//! # StoreWatch Channels
//! Messaging channels notifications are delivered through.

pub mod console;
pub mod discord;

pub use console::ConsoleChannel;
pub use discord::{DiscordChannel, DiscordGatewayStream, GatewayEvent};
