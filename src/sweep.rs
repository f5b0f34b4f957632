use std::sync::Arc;

use tracing::{error, info, warn};

use crate::commands;
use crate::welcome;
use crate::AppState;

/// Startup pass over every guild the bot lives in: refresh the slash-command
/// registration, then make sure the welcome prompt is in place. Runs off the
/// serving path; one guild failing never blocks the rest, and a total
/// failure leaves a ready-but-unswept bot rather than a dead one.
pub async fn startup_sweep(state: Arc<AppState>) {
    let guilds = match state.discord.current_user_guilds().await {
        Ok(guilds) => guilds,
        Err(e) => {
            error!("Failed to list guilds for startup sweep: {}", e);
            return;
        }
    };
    info!("Startup sweep over {} guild(s)", guilds.len());

    for guild in &guilds {
        if let Err(e) = commands::register_guild_commands(&state, guild.id).await {
            warn!(
                "Failed to register commands for guild {} ({}): {}",
                guild.name, guild.id, e
            );
        }
    }

    match welcome::ensure_welcome_message(&state).await {
        Ok(outcome) => info!("Welcome prompt after sweep: {:?}", outcome),
        Err(e) => warn!("Failed to ensure welcome prompt: {}", e),
    }
}
