//! Reviewer verdicts and ticket closure. Every handler re-reads its actor
//! and applicant from the interaction and the live guild, never from stored
//! state, so restarting the bot between submission and decision costs
//! nothing.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::authz::is_reviewer;
use crate::control::ControlId;
use crate::discord::{button_style, mention_user, Component, CreateMessage, Member, Snowflake};
use crate::error::{IntakeError, Missing, Rejection};
use crate::interactions::{Interaction, InteractionResponse};
use crate::AppState;

/// Pause between the closing acknowledgement and channel deletion, so the
/// confirmation reaches the actor before the channel disappears.
const CLOSE_GRACE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Denied,
}

/// The row that replaces the decision buttons once a verdict lands: a
/// single "Аригато" close button reserved for the applicant.
pub fn closure_row(applicant_id: Snowflake) -> Vec<Component> {
    vec![Component::action_row(vec![Component::button(
        button_style::SECONDARY,
        "Аригато",
        ControlId::ThankAndClose { applicant_id }.to_string(),
        Some("🫶"),
    )])]
}

fn require_reviewer(state: &AppState, actor: &Member) -> Result<(), IntakeError> {
    if is_reviewer(&actor.roles, &state.config.reviewer_role_ids) {
        Ok(())
    } else {
        Err(IntakeError::Unauthorized(Rejection::NotReviewer))
    }
}

/// Fetch the applicant's live membership; someone who left the guild since
/// applying surfaces as a candidate-not-found.
async fn resolve_applicant(
    state: &AppState,
    guild_id: Snowflake,
    applicant_id: Snowflake,
) -> Result<Member, IntakeError> {
    state
        .discord
        .guild_member(guild_id, applicant_id)
        .await
        .map_err(|e| {
            warn!("Applicant {} could not be resolved: {}", applicant_id, e);
            IntakeError::NotFound(Missing::Candidate)
        })
}

/// A reviewer pressed Approve or Deny.
///
/// Approval grants the candidate role when it still exists; either verdict
/// posts its announcement into the ticket and then swaps the decision row
/// for the applicant's close button, so a verdict can land only once.
pub async fn on_decision(
    state: &AppState,
    interaction: &Interaction,
    verdict: Verdict,
    applicant_id: Snowflake,
    role_id: Option<Snowflake>,
) -> Result<InteractionResponse, IntakeError> {
    let (guild_id, actor) = interaction.guild_context()?;
    require_reviewer(state, actor)?;

    let applicant = resolve_applicant(state, guild_id, applicant_id).await?;

    if verdict == Verdict::Approved {
        grant_candidate_role(state, guild_id, &applicant, role_id).await;
    }

    let channel_id = interaction.channel()?;
    let announcement = match verdict {
        Verdict::Approved => format!(
            "🎉 {}, поздравляем! Вы приняты. Добро пожаловать в команду.",
            mention_user(applicant.user.id)
        ),
        Verdict::Denied => format!(
            "{}, спасибо за интерес. Но пока **идти путём самурая рановато**. Тикет можно закрыть.",
            mention_user(applicant.user.id)
        ),
    };
    // The announcement goes out before the control swap; if it fails the
    // buttons stay live and the reviewer can simply press again.
    state
        .discord
        .create_message(
            channel_id,
            &CreateMessage {
                content: Some(announcement),
                ..Default::default()
            },
        )
        .await?;

    info!(
        "Application of {} ({}) {:?} by {}",
        applicant.user.username, applicant.user.id, verdict, actor.user.username
    );
    Ok(InteractionResponse::update_components(closure_row(
        applicant_id,
    )))
}

/// Best-effort role grant on approval. A role that no longer exists, or a
/// grant the API refuses, is logged and the verdict still proceeds.
async fn grant_candidate_role(
    state: &AppState,
    guild_id: Snowflake,
    applicant: &Member,
    role_id: Option<Snowflake>,
) {
    let Some(role_id) = role_id else {
        warn!(
            "Ticket for {} carries no candidate role; skipping grant",
            applicant.user.username
        );
        return;
    };
    let exists = match state.discord.guild_roles(guild_id).await {
        Ok(roles) => roles.iter().any(|role| role.id == role_id),
        Err(e) => {
            warn!("Failed to list roles of guild {}: {}", guild_id, e);
            false
        }
    };
    if !exists {
        warn!("Role {} no longer exists in guild {}; skipping grant", role_id, guild_id);
        return;
    }
    match state
        .discord
        .add_member_role(guild_id, applicant.user.id, role_id, "Заявка одобрена")
        .await
    {
        Ok(()) => info!("Granted role {} to {}", role_id, applicant.user.username),
        Err(e) => warn!(
            "Failed to grant role {} to {}: {}",
            role_id, applicant.user.username, e
        ),
    }
}

/// A reviewer pressed "Закрыть тикет".
pub async fn on_close(
    state: &AppState,
    interaction: &Interaction,
    applicant_id: Snowflake,
) -> Result<InteractionResponse, IntakeError> {
    let (guild_id, actor) = interaction.guild_context()?;
    require_reviewer(state, actor)?;
    resolve_applicant(state, guild_id, applicant_id).await?;

    let channel_id = interaction.channel()?;
    info!(
        "Ticket channel {} closed by reviewer {}",
        channel_id, actor.user.username
    );
    schedule_channel_deletion(state, channel_id, "Закрыто модератором");
    Ok(InteractionResponse::ephemeral("Тикет закрывается…"))
}

/// The applicant pressed their own "Аригато" button.
pub async fn on_thanks(
    state: &AppState,
    interaction: &Interaction,
    applicant_id: Snowflake,
) -> Result<InteractionResponse, IntakeError> {
    let (guild_id, actor) = interaction.guild_context()?;
    if actor.user.id != applicant_id {
        return Err(IntakeError::Unauthorized(Rejection::NotTicketOwner));
    }
    resolve_applicant(state, guild_id, applicant_id).await?;

    let channel_id = interaction.channel()?;
    info!(
        "Ticket channel {} closed by applicant {}",
        channel_id, actor.user.username
    );
    schedule_channel_deletion(state, channel_id, "Закрыто пользователем (Аригато)");
    Ok(InteractionResponse::ephemeral("Закрываю тикет…"))
}

/// Deletion runs off the interaction path after a short grace pause. A
/// failed deletion is logged and left for a human; there is no retry.
fn schedule_channel_deletion(state: &AppState, channel_id: Snowflake, reason: &'static str) {
    let discord = state.discord.clone();
    tokio::spawn(async move {
        tokio::time::sleep(CLOSE_GRACE_DELAY).await;
        if let Err(e) = discord.delete_channel(channel_id, reason).await {
            error!("Failed to delete ticket channel {}: {}", channel_id, e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, RoleCatalog};
    use crate::discord::{DiscordClient, User};
    use crate::interactions::InteractionData;

    fn test_state(reviewer_role: u64) -> AppState {
        AppState {
            config: Config {
                bot_token: "token".to_string(),
                public_key: ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]).verifying_key(),
                welcome_channel_id: Snowflake(1),
                tickets_category_id: Snowflake(2),
                reviewer_role_ids: vec![Snowflake(reviewer_role)],
                role_catalog: RoleCatalog::default_lineup(),
                port: 0,
            },
            discord: DiscordClient::new("token".to_string()),
            bot_user_id: Snowflake(10),
            application_id: Snowflake(11),
            drafts: crate::application::DraftStore::new(),
        }
    }

    fn component_interaction(user_id: u64, roles: Vec<u64>, custom_id: &str) -> Interaction {
        Interaction {
            id: Snowflake(100),
            kind: 3,
            data: Some(InteractionData {
                name: None,
                custom_id: Some(custom_id.to_string()),
                values: vec![],
                components: vec![],
            }),
            guild_id: Some(Snowflake(5)),
            channel_id: Some(Snowflake(6)),
            member: Some(Member {
                user: User {
                    id: Snowflake(user_id),
                    username: "actor".to_string(),
                },
                roles: roles.into_iter().map(Snowflake).collect(),
                nick: None,
            }),
        }
    }

    // Authorization is checked before any platform call, so these run
    // without a live API behind the client.

    #[tokio::test]
    async fn test_decision_requires_reviewer_role() {
        let state = test_state(3);
        let interaction = component_interaction(50, vec![999], "ls_decide_approve:42");
        let result =
            on_decision(&state, &interaction, Verdict::Approved, Snowflake(42), None).await;
        assert!(matches!(
            result,
            Err(IntakeError::Unauthorized(Rejection::NotReviewer))
        ));
    }

    #[tokio::test]
    async fn test_close_requires_reviewer_role() {
        let state = test_state(3);
        let interaction = component_interaction(50, vec![], "ls_decide_close:42");
        let result = on_close(&state, &interaction, Snowflake(42)).await;
        assert!(matches!(
            result,
            Err(IntakeError::Unauthorized(Rejection::NotReviewer))
        ));
    }

    #[tokio::test]
    async fn test_thanks_requires_ticket_owner() {
        let state = test_state(3);
        // A reviewer is still not the applicant.
        let interaction = component_interaction(50, vec![3], "ls_ticket_thanks:42");
        let result = on_thanks(&state, &interaction, Snowflake(42)).await;
        assert!(matches!(
            result,
            Err(IntakeError::Unauthorized(Rejection::NotTicketOwner))
        ));
    }

    #[tokio::test]
    async fn test_decision_outside_guild_is_rejected() {
        let state = test_state(3);
        let mut interaction = component_interaction(50, vec![3], "ls_decide_approve:42");
        interaction.guild_id = None;
        let result =
            on_decision(&state, &interaction, Verdict::Denied, Snowflake(42), None).await;
        assert!(matches!(
            result,
            Err(IntakeError::NotFound(Missing::Guild))
        ));
    }

    #[test]
    fn test_closure_row_is_owner_only_control() {
        let rows = closure_row(Snowflake(42));
        assert_eq!(rows.len(), 1);
        let button = &rows[0].components[0];
        assert_eq!(button.custom_id.as_deref(), Some("ls_ticket_thanks:42"));
        assert_eq!(button.label.as_deref(), Some("Аригато"));
    }
}
