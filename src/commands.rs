use tracing::{info, warn};

use crate::authz::is_reviewer;
use crate::discord::{command_type, CommandSpec, DiscordError, Member, Snowflake};
use crate::error::{IntakeError, Missing, Rejection};
use crate::interactions::{Interaction, InteractionResponse};
use crate::welcome;
use crate::AppState;

/// The guild slash-command set. Registered with the bulk-overwrite endpoint,
/// so the definitions here are the whole truth: anything not listed is
/// removed from the guild on the next sync.
pub fn command_set() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: "ping".to_string(),
            description: "Проверка бота".to_string(),
            kind: command_type::CHAT_INPUT,
        },
        CommandSpec {
            name: "resync".to_string(),
            description: "Пересинхронизировать слэш-команды (только для модов)".to_string(),
            kind: command_type::CHAT_INPUT,
        },
        CommandSpec {
            name: "setup_welcome".to_string(),
            description: "Переотправить привет-сообщение в #анкета (только для модов)".to_string(),
            kind: command_type::CHAT_INPUT,
        },
    ]
}

pub async fn register_guild_commands(
    state: &AppState,
    guild_id: Snowflake,
) -> Result<(), DiscordError> {
    let commands = command_set();
    state
        .discord
        .set_guild_commands(state.application_id, guild_id, &commands)
        .await?;
    info!(
        "Registered {} command(s) for guild {}",
        commands.len(),
        guild_id
    );
    Ok(())
}

/// Slash-command dispatcher.
pub async fn handle_command(
    state: &AppState,
    interaction: &Interaction,
) -> Result<InteractionResponse, IntakeError> {
    let name = interaction
        .data
        .as_ref()
        .and_then(|data| data.name.as_deref())
        .unwrap_or_default();
    match name {
        "ping" => Ok(InteractionResponse::ephemeral("Pong!")),
        "resync" => resync(state, interaction).await,
        "setup_welcome" => setup_welcome(state, interaction).await,
        other => {
            warn!("Unknown command: '{}'", other);
            Err(IntakeError::Platform(DiscordError::Payload(format!(
                "unknown command '{}'",
                other
            ))))
        }
    }
}

fn require_reviewer_member<'a>(
    state: &AppState,
    interaction: &'a Interaction,
) -> Result<&'a Member, IntakeError> {
    let member = interaction
        .member
        .as_ref()
        .ok_or(IntakeError::NotFound(Missing::Guild))?;
    if !is_reviewer(&member.roles, &state.config.reviewer_role_ids) {
        return Err(IntakeError::Unauthorized(Rejection::NotReviewer));
    }
    Ok(member)
}

async fn resync(
    state: &AppState,
    interaction: &Interaction,
) -> Result<InteractionResponse, IntakeError> {
    let member = require_reviewer_member(state, interaction)?;
    let guild_id = interaction
        .guild_id
        .ok_or(IntakeError::NotFound(Missing::Guild))?;
    register_guild_commands(state, guild_id).await?;
    info!("Commands resynced on request of {}", member.user.username);
    Ok(InteractionResponse::ephemeral("Команды пересинхронизированы."))
}

async fn setup_welcome(
    state: &AppState,
    interaction: &Interaction,
) -> Result<InteractionResponse, IntakeError> {
    require_reviewer_member(state, interaction)?;
    interaction
        .guild_id
        .ok_or(IntakeError::NotFound(Missing::Guild))?;
    // An unusable channel is already logged inside; the reviewer still gets
    // an acknowledgement either way, like any other idempotent re-run.
    welcome::ensure_welcome_message(state).await?;
    Ok(InteractionResponse::ephemeral("Готово."))
}
