//! Ticket-channel provisioning: one private text channel per submitted
//! application, visible to the applicant, the reviewer roles and the bot,
//! and nobody else.

use tracing::{info, warn};

use crate::application::FormAnswers;
use crate::control::ControlId;
use crate::discord::{
    button_style, channel_type, mention_role, mention_user, overwrite_type, permissions,
    Component, CreateGuildChannel, CreateMessage, Embed, EmbedField, Member,
    PermissionOverwrite, Snowflake,
};
use crate::error::IntakeError;
use crate::AppState;

/// Discord rejects channel names longer than 100 characters.
const CHANNEL_NAME_MAX: usize = 100;

const TICKET_COLOR: u32 = 0x5865F2;

const CATEGORY_MISSING: &str =
    "Категория для тикетов не найдена. Проверьте TICKETS_CATEGORY_ID.";

/// A freshly provisioned ticket.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub channel_id: Snowflake,
    pub message_id: Snowflake,
}

/// Channel name derived from the applicant's handle: prefixed, lower-cased,
/// spaces folded to hyphens, truncated to the platform limit on a character
/// boundary.
pub fn derive_channel_name(username: &str) -> String {
    format!("заявка-{}", username)
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .take(CHANNEL_NAME_MAX)
        .collect()
}

/// The overwrite set that scopes a ticket to {applicant, reviewers, bot}.
/// @everyone (whose role id is the guild id) is denied outright; the bot
/// keeps MANAGE_CHANNELS so it can delete the ticket later.
pub fn build_permission_overwrites(
    guild_id: Snowflake,
    applicant_id: Snowflake,
    reviewer_roles: &[Snowflake],
    bot_user_id: Snowflake,
) -> Vec<PermissionOverwrite> {
    let participant =
        permissions::VIEW_CHANNEL | permissions::SEND_MESSAGES | permissions::READ_MESSAGE_HISTORY;
    let mut overwrites = vec![
        PermissionOverwrite {
            id: guild_id,
            kind: overwrite_type::ROLE,
            allow: 0,
            deny: permissions::VIEW_CHANNEL,
        },
        PermissionOverwrite {
            id: applicant_id,
            kind: overwrite_type::MEMBER,
            allow: participant,
            deny: 0,
        },
        PermissionOverwrite {
            id: bot_user_id,
            kind: overwrite_type::MEMBER,
            allow: permissions::VIEW_CHANNEL
                | permissions::SEND_MESSAGES
                | permissions::MANAGE_CHANNELS,
            deny: 0,
        },
    ];
    for role_id in reviewer_roles {
        overwrites.push(PermissionOverwrite {
            id: *role_id,
            kind: overwrite_type::ROLE,
            allow: participant,
            deny: 0,
        });
    }
    overwrites
}

/// The application summary posted into the ticket channel. The candidate
/// role renders as a mention when the catalog resolves it, otherwise the
/// raw label survives so reviewers still see what was applied for.
pub fn application_embed(
    applicant: &Member,
    role_label: &str,
    role_id: Option<Snowflake>,
    answers: &FormAnswers,
) -> Embed {
    let role_value = match role_id {
        Some(id) => mention_role(id),
        None => role_label.to_string(),
    };
    let mut fields = vec![
        EmbedField {
            name: "Кандидат".to_string(),
            value: format!("{} (`{}`)", mention_user(applicant.user.id), applicant.user.id),
            inline: false,
        },
        EmbedField {
            name: "Роль".to_string(),
            value: role_value,
            inline: true,
        },
        EmbedField {
            name: "Ник".to_string(),
            value: answers.nickname.clone(),
            inline: true,
        },
        EmbedField {
            name: "Возраст".to_string(),
            value: answers.age.clone(),
            inline: true,
        },
        EmbedField {
            name: "Город/страна".to_string(),
            value: answers.location.clone(),
            inline: true,
        },
        EmbedField {
            name: "Часовой пояс (к МСК)".to_string(),
            value: answers.timezone.clone(),
            inline: true,
        },
    ];
    if !answers.about.trim().is_empty() {
        fields.push(EmbedField {
            name: "О себе / опыт".to_string(),
            value: answers.about.clone(),
            inline: false,
        });
    }
    Embed {
        title: Some("🆕 Новая заявка".to_string()),
        description: None,
        color: Some(TICKET_COLOR),
        fields,
    }
}

/// The Approve / Deny / Close row attached to the application message. Each
/// button carries the applicant (and role) in its custom_id, so decisions
/// survive restarts with no stored state.
pub fn decision_row(applicant_id: Snowflake, role_id: Option<Snowflake>) -> Vec<Component> {
    vec![Component::action_row(vec![
        Component::button(
            button_style::SUCCESS,
            "Одобрить",
            ControlId::Approve {
                applicant_id,
                role_id,
            }
            .to_string(),
            Some("✅"),
        ),
        Component::button(
            button_style::DANGER,
            "Отклонить",
            ControlId::Deny {
                applicant_id,
                role_id,
            }
            .to_string(),
            Some("❌"),
        ),
        Component::button(
            button_style::SECONDARY,
            "Закрыть тикет",
            ControlId::CloseTicket { applicant_id }.to_string(),
            Some("🔒"),
        ),
    ])]
}

/// Provision the private ticket channel and post the application summary
/// with its decision controls.
///
/// The tickets category must resolve to an actual category channel; anything
/// else is a configuration error reported back to the applicant, and no
/// channel is created.
pub async fn create_ticket(
    state: &AppState,
    guild_id: Snowflake,
    applicant: &Member,
    role_label: &str,
    answers: &FormAnswers,
) -> Result<Ticket, IntakeError> {
    let category_id = state.config.tickets_category_id;
    let category = match state.discord.get_channel(category_id).await {
        Ok(channel) if channel.kind == channel_type::GUILD_CATEGORY => channel,
        Ok(channel) => {
            warn!(
                "TICKETS_CATEGORY_ID {} resolves to channel type {}, not a category",
                category_id, channel.kind
            );
            return Err(IntakeError::Configuration(CATEGORY_MISSING.to_string()));
        }
        Err(e) => {
            warn!("Failed to resolve tickets category {}: {}", category_id, e);
            return Err(IntakeError::Configuration(CATEGORY_MISSING.to_string()));
        }
    };

    let role_id = state.config.role_catalog.resolve(role_label);
    let request = CreateGuildChannel {
        name: derive_channel_name(&applicant.user.username),
        kind: channel_type::GUILD_TEXT,
        parent_id: category.id,
        permission_overwrites: build_permission_overwrites(
            guild_id,
            applicant.user.id,
            &state.config.reviewer_role_ids,
            state.bot_user_id,
        ),
    };
    let reason = format!(
        "Тикет заявки для {} ({})",
        applicant.user.username, applicant.user.id
    );
    let channel = state
        .discord
        .create_guild_channel(guild_id, &request, &reason)
        .await?;

    let message = state
        .discord
        .create_message(
            channel.id,
            &CreateMessage {
                content: Some("Заявка создана. Ожидайте решения модерации.".to_string()),
                embeds: vec![application_embed(applicant, role_label, role_id, answers)],
                components: decision_row(applicant.user.id, role_id),
            },
        )
        .await?;

    info!(
        "Ticket channel {} created under category {}",
        channel.id, category.id
    );
    Ok(Ticket {
        channel_id: channel.id,
        message_id: message.id,
    })
}
