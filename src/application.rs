//! The applicant-facing half of the workflow: the role select menu, the
//! application modal, and the draft that ties the two together. A draft is
//! minted when a role is chosen and consumed when the form comes back, so a
//! submission always knows which role it is for without trusting anything
//! the client could edit.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::config::RoleCatalog;
use crate::control::ControlId;
use crate::discord::{text_input_style, Component, DiscordError, SelectOption, Snowflake};
use crate::error::{IntakeError, Missing};
use crate::interactions::{Interaction, InteractionResponse, ModalRow};
use crate::ticket;
use crate::AppState;

/// How long a draft may sit between role selection and form submission.
/// Mirrors the platform's own modal lifetime, with slack for slow typists.
const DRAFT_TTL: Duration = Duration::from_secs(15 * 60);

const FIELD_NICKNAME: &str = "nickname";
const FIELD_AGE: &str = "age";
const FIELD_LOCATION: &str = "location";
const FIELD_TIMEZONE: &str = "timezone";
const FIELD_ABOUT: &str = "about";

/// Context carried from role selection to form submission.
#[derive(Debug, Clone)]
pub struct Draft {
    pub applicant_id: Snowflake,
    pub role_label: String,
    created_at: Instant,
}

/// In-memory drafts keyed by the correlation id embedded in the modal's
/// custom_id. Drafts do not survive a restart: one between selection and
/// submission just asks the applicant to start over.
#[derive(Default)]
pub struct DraftStore {
    drafts: RwLock<HashMap<Uuid, Draft>>,
}

impl DraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a role selection and hand back the id the modal will echo.
    /// Stale drafts from abandoned flows are pruned on the way in.
    pub async fn begin(&self, applicant_id: Snowflake, role_label: String) -> Uuid {
        let draft_id = Uuid::new_v4();
        let mut drafts = self.drafts.write().await;
        drafts.retain(|_, draft| draft.created_at.elapsed() < DRAFT_TTL);
        drafts.insert(
            draft_id,
            Draft {
                applicant_id,
                role_label,
                created_at: Instant::now(),
            },
        );
        draft_id
    }

    /// Consume the draft behind a submitted form. Expired and unknown ids
    /// both come back None, so a double submission cannot open two tickets.
    pub async fn take(&self, draft_id: Uuid) -> Option<Draft> {
        let mut drafts = self.drafts.write().await;
        drafts
            .remove(&draft_id)
            .filter(|draft| draft.created_at.elapsed() < DRAFT_TTL)
    }
}

/// Answers captured by the application modal. All but `about` are required
/// by the form itself; `about` may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormAnswers {
    pub nickname: String,
    pub age: String,
    pub location: String,
    pub timezone: String,
    pub about: String,
}

/// Pull the answers out of a modal submission's component rows.
pub fn extract_answers(rows: &[ModalRow]) -> Option<FormAnswers> {
    let mut values: HashMap<&str, &str> = HashMap::new();
    for row in rows {
        for input in &row.components {
            if let Some(value) = &input.value {
                values.insert(input.custom_id.as_str(), value.as_str());
            }
        }
    }
    Some(FormAnswers {
        nickname: values.get(FIELD_NICKNAME)?.to_string(),
        age: values.get(FIELD_AGE)?.to_string(),
        location: values.get(FIELD_LOCATION)?.to_string(),
        timezone: values.get(FIELD_TIMEZONE)?.to_string(),
        about: values.get(FIELD_ABOUT).copied().unwrap_or_default().to_string(),
    })
}

/// The ephemeral role-selection prompt sent when the welcome button is
/// pressed. Pure function of the catalog, so restarts cannot desync it.
pub fn role_select_response(catalog: &RoleCatalog) -> InteractionResponse {
    let options = catalog
        .labels()
        .map(|label| SelectOption {
            label: label.to_string(),
            value: label.to_string(),
        })
        .collect();
    let select = Component::string_select(
        ControlId::RoleSelect.to_string(),
        "Выберите роль",
        options,
    );
    InteractionResponse::ephemeral_with_components(
        "Выберите роль, на которую подаёте:",
        vec![Component::action_row(vec![select])],
    )
}

/// A role was picked from the select menu: mint a draft and open the modal.
pub async fn on_role_chosen(
    state: &AppState,
    interaction: &Interaction,
) -> Result<InteractionResponse, IntakeError> {
    let (_, member) = interaction.guild_context()?;
    let role_label = interaction
        .data
        .as_ref()
        .and_then(|data| data.values.first())
        .cloned()
        .ok_or_else(|| {
            IntakeError::Platform(DiscordError::Payload(
                "role selection without a value".to_string(),
            ))
        })?;

    let draft_id = state.drafts.begin(member.user.id, role_label.clone()).await;
    info!(
        "Opened application form for {} (role: {})",
        member.user.username, role_label
    );
    Ok(InteractionResponse::modal(
        ControlId::ApplicationForm { draft_id }.to_string(),
        "Анкета кандидата",
        form_rows(),
    ))
}

/// The five modal inputs. Discord caps modals at five rows, which is why
/// the form has exactly these fields and no more.
fn form_rows() -> Vec<Component> {
    vec![
        Component::action_row(vec![Component::text_input(
            FIELD_NICKNAME,
            "Ник (в игре/работе)*",
            text_input_style::SHORT,
            true,
            Some(64),
            None,
        )]),
        Component::action_row(vec![Component::text_input(
            FIELD_AGE,
            "Возраст*",
            text_input_style::SHORT,
            true,
            Some(3),
            Some("например: 21"),
        )]),
        Component::action_row(vec![Component::text_input(
            FIELD_LOCATION,
            "Город / страна*",
            text_input_style::SHORT,
            true,
            Some(64),
            None,
        )]),
        Component::action_row(vec![Component::text_input(
            FIELD_TIMEZONE,
            "Часовой пояс относительно МСК*",
            text_input_style::SHORT,
            true,
            None,
            Some("например: +3"),
        )]),
        Component::action_row(vec![Component::text_input(
            FIELD_ABOUT,
            "О себе / опыт",
            text_input_style::PARAGRAPH,
            false,
            Some(500),
            None,
        )]),
    ]
}

/// The filled-in form came back: consume the draft, provision the ticket,
/// acknowledge privately.
pub async fn on_form_submitted(
    state: &AppState,
    interaction: &Interaction,
    draft_id: Uuid,
) -> Result<InteractionResponse, IntakeError> {
    let (guild_id, member) = interaction.guild_context()?;

    let draft = state
        .drafts
        .take(draft_id)
        .await
        .ok_or(IntakeError::NotFound(Missing::Draft))?;
    if draft.applicant_id != member.user.id {
        // A submission under someone else's draft id; treat it as stale.
        return Err(IntakeError::NotFound(Missing::Draft));
    }

    let rows = interaction
        .data
        .as_ref()
        .map(|data| data.components.as_slice())
        .unwrap_or_default();
    let answers = extract_answers(rows).ok_or_else(|| {
        IntakeError::Platform(DiscordError::Payload(
            "modal submission is missing required inputs".to_string(),
        ))
    })?;

    let created = ticket::create_ticket(state, guild_id, member, &draft.role_label, &answers).await?;
    info!(
        "Ticket channel {} opened for applicant {} ({})",
        created.channel_id, member.user.username, member.user.id
    );
    Ok(InteractionResponse::ephemeral(
        "Заявка отправлена! Для вас создан приватный канал с модераторами.",
    ))
}
