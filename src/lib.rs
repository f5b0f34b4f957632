pub mod application;
pub mod authz;
pub mod commands;
pub mod config;
pub mod control;
pub mod decision;
pub mod discord;
pub mod error;
pub mod interactions;
pub mod sweep;
pub mod ticket;
pub mod welcome;

pub use error::IntakeError;

use application::DraftStore;
use config::Config;
use discord::{DiscordClient, Snowflake};

/// Shared state behind every interaction handler. Everything durable lives
/// on Discord's side; the only mutable piece here is the draft store, and
/// losing it merely restarts in-flight form fills.
pub struct AppState {
    pub config: Config,
    pub discord: DiscordClient,
    /// The bot's own user id, fetched at startup; identifies our welcome
    /// prompt and appears in every ticket's permission overwrites.
    pub bot_user_id: Snowflake,
    /// The application id slash commands are registered under.
    pub application_id: Snowflake,
    pub drafts: DraftStore,
}
