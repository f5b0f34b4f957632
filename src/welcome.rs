use tracing::{info, warn};

use crate::control::ControlId;
use crate::discord::{
    button_style, channel_type, Component, CreateMessage, DiscordError, EditMessage, Embed,
    Message, Snowflake,
};
use crate::AppState;

/// Marker baked into the welcome prompt so it can be recognised across
/// restarts. Lives in the embed title; never change it, or every deployed
/// guild gets a second prompt.
pub const WELCOME_TAG: &str = "LS_APPLY_WELCOME";

/// How far back the intake channel is scanned for an existing prompt.
const HISTORY_SCAN_LIMIT: u8 = 50;

const WELCOME_COLOR: u32 = 0xF1C40F;

/// What `ensure_welcome_message` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WelcomeOutcome {
    /// An existing prompt was found; its button row was re-attached.
    Refreshed,
    /// No prompt was found, so a fresh one was sent.
    Sent,
    /// The configured intake channel is missing or not a text channel.
    ChannelUnavailable,
}

/// True for a message of ours carrying the welcome marker. The marker lives
/// in the embed title, but content and descriptions are checked too so
/// prompts sent by earlier versions still count.
pub fn is_welcome_message(message: &Message, bot_user_id: Snowflake) -> bool {
    if message.author.id != bot_user_id {
        return false;
    }
    if message.content.contains(WELCOME_TAG) {
        return true;
    }
    message.embeds.iter().any(|embed| {
        embed
            .title
            .as_deref()
            .is_some_and(|title| title.contains(WELCOME_TAG))
            || embed
                .description
                .as_deref()
                .is_some_and(|description| description.contains(WELCOME_TAG))
    })
}

fn welcome_embed() -> Embed {
    Embed {
        title: Some(WELCOME_TAG.to_string()),
        description: Some(
            "👋 **Здравствуйте!** Хотите стать членом команды **Lone Samurai**?\n\n\
             Нажмите кнопку ниже, чтобы заполнить анкету. После отправки для вас \
             **создастся приватный тикет-канал** с модераторами."
                .to_string(),
        ),
        color: Some(WELCOME_COLOR),
        fields: Vec::new(),
    }
}

fn welcome_button_row() -> Vec<Component> {
    vec![Component::action_row(vec![Component::button(
        button_style::PRIMARY,
        "Заполнить анкету",
        ControlId::StartApplication.to_string(),
        None,
    )])]
}

/// Keep the intake channel at exactly one welcome prompt.
///
/// Scans recent messages for the marker: if a prompt exists, its button row
/// is refreshed in place; otherwise a new prompt is sent. An unusable
/// channel is logged and reported, never an error, so startup and the
/// `setup_welcome` command both survive a misconfigured channel id.
pub async fn ensure_welcome_message(state: &AppState) -> Result<WelcomeOutcome, DiscordError> {
    let channel_id = state.config.welcome_channel_id;
    let channel = match state.discord.get_channel(channel_id).await {
        Ok(channel) => channel,
        Err(e) => {
            warn!("Intake channel {} could not be resolved: {}", channel_id, e);
            return Ok(WelcomeOutcome::ChannelUnavailable);
        }
    };
    if channel.kind != channel_type::GUILD_TEXT {
        warn!(
            "WELCOME_CHANNEL_ID {} is not a text channel (type {})",
            channel_id, channel.kind
        );
        return Ok(WelcomeOutcome::ChannelUnavailable);
    }

    let messages = state.discord.channel_messages(channel_id, HISTORY_SCAN_LIMIT).await?;
    if let Some(existing) = messages
        .iter()
        .find(|message| is_welcome_message(message, state.bot_user_id))
    {
        // Re-attach the button so it works again after a restart. A failed
        // refresh still leaves a usable prompt in place.
        let edit = EditMessage {
            components: Some(welcome_button_row()),
        };
        if let Err(e) = state.discord.edit_message(channel_id, existing.id, &edit).await {
            warn!("Failed to refresh welcome prompt {}: {}", existing.id, e);
        }
        info!("Welcome prompt already present in channel {}", channel_id);
        return Ok(WelcomeOutcome::Refreshed);
    }

    let message = CreateMessage {
        content: None,
        embeds: vec![welcome_embed()],
        components: welcome_button_row(),
    };
    state.discord.create_message(channel_id, &message).await?;
    info!("Sent welcome prompt to channel {}", channel_id);
    Ok(WelcomeOutcome::Sent)
}
