//! The HTTP side of the bot. Discord delivers every button press, menu
//! choice, modal submission and slash command as a signed POST to
//! `/interactions`; the middleware checks the Ed25519 signature over
//! `timestamp || body` and the handler answers inline, so the bot holds no
//! gateway connection at all.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Json, Response},
    routing::post,
    Router,
};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::application;
use crate::commands;
use crate::control::ControlId;
use crate::decision::{self, Verdict};
use crate::discord::{Component, DiscordError, Embed, Member, Snowflake};
use crate::error::{IntakeError, Missing};
use crate::AppState;

pub mod interaction_type {
    pub const PING: u8 = 1;
    pub const APPLICATION_COMMAND: u8 = 2;
    pub const MESSAGE_COMPONENT: u8 = 3;
    pub const MODAL_SUBMIT: u8 = 5;
}

pub mod callback_type {
    pub const PONG: u8 = 1;
    pub const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;
    pub const UPDATE_MESSAGE: u8 = 7;
    pub const MODAL: u8 = 9;
}

/// Message flag restricting visibility to the initiating actor.
pub const EPHEMERAL: u64 = 1 << 6;

/// An incoming interaction, reduced to the fields this bot consumes.
#[derive(Debug, Deserialize)]
pub struct Interaction {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: u8,
    pub data: Option<InteractionData>,
    pub guild_id: Option<Snowflake>,
    pub channel_id: Option<Snowflake>,
    pub member: Option<Member>,
}

impl Interaction {
    /// The guild and member behind this interaction. Controls only ever
    /// live in guild channels, so anything else is reported as a missing
    /// guild, matching what the actor sees.
    pub fn guild_context(&self) -> Result<(Snowflake, &Member), IntakeError> {
        match (self.guild_id, self.member.as_ref()) {
            (Some(guild_id), Some(member)) => Ok((guild_id, member)),
            _ => Err(IntakeError::NotFound(Missing::Guild)),
        }
    }

    /// The channel hosting the activated control.
    pub fn channel(&self) -> Result<Snowflake, IntakeError> {
        self.channel_id.ok_or_else(|| {
            IntakeError::Platform(DiscordError::Payload(
                "interaction without a channel".to_string(),
            ))
        })
    }

    fn custom_id(&self) -> &str {
        self.data
            .as_ref()
            .and_then(|data| data.custom_id.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct InteractionData {
    /// Slash-command name, for APPLICATION_COMMAND interactions.
    pub name: Option<String>,
    /// Control id, for component and modal interactions.
    pub custom_id: Option<String>,
    /// Chosen option(s), for select-menu interactions.
    #[serde(default)]
    pub values: Vec<String>,
    /// Input rows, for modal submissions.
    #[serde(default)]
    pub components: Vec<ModalRow>,
}

#[derive(Debug, Deserialize)]
pub struct ModalRow {
    #[serde(default)]
    pub components: Vec<ModalInput>,
}

#[derive(Debug, Deserialize)]
pub struct ModalInput {
    pub custom_id: String,
    pub value: Option<String>,
}

/// The inline answer to an interaction.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CallbackData>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CallbackData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self {
            kind: callback_type::PONG,
            data: None,
        }
    }

    /// A private message visible only to the initiating actor.
    pub fn ephemeral(content: &str) -> Self {
        Self {
            kind: callback_type::CHANNEL_MESSAGE_WITH_SOURCE,
            data: Some(CallbackData {
                content: Some(content.to_string()),
                flags: Some(EPHEMERAL),
                ..Default::default()
            }),
        }
    }

    pub fn ephemeral_with_components(content: &str, components: Vec<Component>) -> Self {
        Self {
            kind: callback_type::CHANNEL_MESSAGE_WITH_SOURCE,
            data: Some(CallbackData {
                content: Some(content.to_string()),
                components,
                flags: Some(EPHEMERAL),
                ..Default::default()
            }),
        }
    }

    /// Edit the message hosting the activated component, replacing only its
    /// component rows.
    pub fn update_components(components: Vec<Component>) -> Self {
        Self {
            kind: callback_type::UPDATE_MESSAGE,
            data: Some(CallbackData {
                components,
                ..Default::default()
            }),
        }
    }

    pub fn modal(custom_id: String, title: &str, rows: Vec<Component>) -> Self {
        Self {
            kind: callback_type::MODAL,
            data: Some(CallbackData {
                custom_id: Some(custom_id),
                title: Some(title.to_string()),
                components: rows,
                ..Default::default()
            }),
        }
    }
}

/// Discord signs `timestamp || body` with the application's Ed25519 key and
/// sends the signature hex-encoded. Anything malformed fails closed.
pub fn verify_interaction_signature(
    public_key: &VerifyingKey,
    timestamp: &[u8],
    body: &[u8],
    signature_hex: &str,
) -> bool {
    let signature_bytes = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let signature = match Signature::from_slice(&signature_bytes) {
        Ok(signature) => signature,
        Err(_) => return false,
    };

    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp);
    message.extend_from_slice(body);

    public_key.verify(&message, &signature).is_ok()
}

async fn verify_signature_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let signature = parts
        .headers
        .get("x-signature-ed25519")
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let timestamp = parts
        .headers
        .get("x-signature-timestamp")
        .map(|h| h.as_bytes().to_vec())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !verify_interaction_signature(&state.config.public_key, &timestamp, &bytes, signature) {
        error!("Invalid interaction signature");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let request = Request::from_parts(parts, axum::body::Body::from(bytes));
    Ok(next.run(request).await)
}

pub async fn interactions_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<InteractionResponse>, StatusCode> {
    let (_parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let interaction: Interaction =
        serde_json::from_slice(&bytes).map_err(|_| StatusCode::BAD_REQUEST)?;

    let response = match interaction.kind {
        interaction_type::PING => {
            info!("Interaction ping");
            InteractionResponse::pong()
        }
        interaction_type::APPLICATION_COMMAND => {
            respond(commands::handle_command(&state, &interaction).await)
        }
        interaction_type::MESSAGE_COMPONENT | interaction_type::MODAL_SUBMIT => {
            respond(route_control(&state, &interaction).await)
        }
        other => {
            warn!("Ignoring interaction of type {}", other);
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    Ok(Json(response))
}

/// Turn a handler outcome into the wire response. Every failure becomes a
/// private message plus a log line; an interaction is never left hanging.
fn respond(result: Result<InteractionResponse, IntakeError>) -> InteractionResponse {
    match result {
        Ok(response) => response,
        Err(e) => {
            match &e {
                IntakeError::Unauthorized(_) | IntakeError::NotFound(_) => {
                    warn!("Interaction refused: {}", e)
                }
                IntakeError::Configuration(_) | IntakeError::Platform(_) => {
                    error!("Interaction failed: {}", e)
                }
            }
            InteractionResponse::ephemeral(&e.user_message())
        }
    }
}

/// Route a component or modal interaction by its parsed control id.
async fn route_control(
    state: &AppState,
    interaction: &Interaction,
) -> Result<InteractionResponse, IntakeError> {
    let custom_id = interaction.custom_id();
    let Some(control) = ControlId::parse(custom_id) else {
        warn!("Unrecognized control id: '{}'", custom_id);
        return Err(IntakeError::Platform(DiscordError::Payload(format!(
            "unrecognized control id '{}'",
            custom_id
        ))));
    };

    match control {
        ControlId::StartApplication => Ok(application::role_select_response(
            &state.config.role_catalog,
        )),
        ControlId::RoleSelect => application::on_role_chosen(state, interaction).await,
        ControlId::ApplicationForm { draft_id } => {
            application::on_form_submitted(state, interaction, draft_id).await
        }
        ControlId::Approve {
            applicant_id,
            role_id,
        } => decision::on_decision(state, interaction, Verdict::Approved, applicant_id, role_id)
            .await,
        ControlId::Deny {
            applicant_id,
            role_id,
        } => {
            decision::on_decision(state, interaction, Verdict::Denied, applicant_id, role_id).await
        }
        ControlId::CloseTicket { applicant_id } => {
            decision::on_close(state, interaction, applicant_id).await
        }
        ControlId::ThankAndClose { applicant_id } => {
            decision::on_thanks(state, interaction, applicant_id).await
        }
    }
}

pub fn interactions_router(middleware_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/interactions", post(interactions_handler))
        .route_layer(middleware::from_fn_with_state(
            middleware_state,
            verify_signature_middleware,
        ))
}
