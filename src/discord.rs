use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{error, info};

/// Base URL of the Discord REST API, v10.
pub const API_BASE: &str = "https://discord.com/api/v10";

/// A Discord ID. The API transmits these as decimal strings in JSON because
/// they exceed what JavaScript numbers can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Snowflake(pub u64);

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Snowflake {
    fn from(value: u64) -> Self {
        Snowflake(value)
    }
}

impl std::str::FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.parse::<u64>().map(Snowflake)
    }
}

impl Serialize for Snowflake {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

pub mod channel_type {
    pub const GUILD_TEXT: u8 = 0;
    pub const GUILD_CATEGORY: u8 = 4;
}

pub mod component_type {
    pub const ACTION_ROW: u8 = 1;
    pub const BUTTON: u8 = 2;
    pub const STRING_SELECT: u8 = 3;
    pub const TEXT_INPUT: u8 = 4;
}

pub mod button_style {
    pub const PRIMARY: u8 = 1;
    pub const SECONDARY: u8 = 2;
    pub const SUCCESS: u8 = 3;
    pub const DANGER: u8 = 4;
}

pub mod text_input_style {
    pub const SHORT: u8 = 1;
    pub const PARAGRAPH: u8 = 2;
}

pub mod command_type {
    pub const CHAT_INPUT: u8 = 1;
}

pub mod overwrite_type {
    pub const ROLE: u8 = 0;
    pub const MEMBER: u8 = 1;
}

/// Permission bits used by this bot; the full set lives in the Discord docs.
pub mod permissions {
    pub const MANAGE_CHANNELS: u64 = 1 << 4;
    pub const VIEW_CHANNEL: u64 = 1 << 10;
    pub const SEND_MESSAGES: u64 = 1 << 11;
    pub const READ_MESSAGE_HISTORY: u64 = 1 << 16;
}

/// `<@123>` renders as a user mention in message content.
pub fn mention_user(id: Snowflake) -> String {
    format!("<@{}>", id)
}

/// `<@&123>` renders as a role mention in message content.
pub fn mention_role(id: Snowflake) -> String {
    format!("<@&{}>", id)
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    pub user: User,
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    pub nick: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Role {
    pub id: Snowflake,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartialGuild {
    pub id: Snowflake,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: Option<String>,
    pub parent_id: Option<Snowflake>,
    pub guild_id: Option<Snowflake>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    pub author: User,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// One message component, covering the handful of shapes this bot sends:
/// action rows, buttons, a string select and modal text inputs. Discord uses
/// a single tagged object for all of them, so optional fields abound.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Component {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<Emoji>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_values: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_values: Option<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u16>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
}

impl Component {
    pub fn action_row(children: Vec<Component>) -> Self {
        Self {
            kind: component_type::ACTION_ROW,
            components: children,
            ..Default::default()
        }
    }

    pub fn button(style: u8, label: &str, custom_id: String, emoji: Option<&str>) -> Self {
        Self {
            kind: component_type::BUTTON,
            style: Some(style),
            label: Some(label.to_string()),
            custom_id: Some(custom_id),
            emoji: emoji.map(Emoji::unicode),
            ..Default::default()
        }
    }

    /// A single-choice select menu.
    pub fn string_select(custom_id: String, placeholder: &str, options: Vec<SelectOption>) -> Self {
        Self {
            kind: component_type::STRING_SELECT,
            custom_id: Some(custom_id),
            placeholder: Some(placeholder.to_string()),
            min_values: Some(1),
            max_values: Some(1),
            options,
            ..Default::default()
        }
    }

    pub fn text_input(
        custom_id: &str,
        label: &str,
        style: u8,
        required: bool,
        max_length: Option<u16>,
        placeholder: Option<&str>,
    ) -> Self {
        Self {
            kind: component_type::TEXT_INPUT,
            style: Some(style),
            label: Some(label.to_string()),
            custom_id: Some(custom_id.to_string()),
            required: Some(required),
            max_length,
            placeholder: placeholder.map(str::to_string),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Emoji {
    pub name: String,
}

impl Emoji {
    pub fn unicode(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionOverwrite {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(with = "permission_bits")]
    pub allow: u64,
    #[serde(with = "permission_bits")]
    pub deny: u64,
}

/// Permission bitfields travel as decimal strings, like snowflakes.
mod permission_bits {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bits: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(bits)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EditMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<Component>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateGuildChannel {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub parent_id: Snowflake,
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

/// A guild application command definition, as sent to the bulk-overwrite
/// registration endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Application {
    pub id: Snowflake,
}

#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Discord API error: {status} - {message}")]
    Api { status: StatusCode, message: String },
    #[error("unexpected payload from the platform: {0}")]
    Payload(String),
}

#[derive(Clone)]
pub struct DiscordClient {
    client: Client,
    base_url: String,
    token: String,
}

impl DiscordClient {
    pub fn new(token: String) -> Self {
        Self::new_with_base_url(token, API_BASE.to_string())
    }

    /// Point the client at a different base URL; used by tests to talk to a
    /// local stand-in for the Discord API.
    pub fn new_with_base_url(token: String, base_url: String) -> Self {
        let client = Client::builder()
            .user_agent("DiscordBot (ls-apply, 0.1.0)")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            token,
        }
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn check(
        operation: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, DiscordError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let message = response.text().await?;
        error!("Discord API error {}: {} - {}", operation, status, message);
        Err(DiscordError::Api { status, message })
    }

    pub async fn current_user(&self) -> Result<User, DiscordError> {
        let url = format!("{}/users/@me", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        Ok(Self::check("fetching current user", response)
            .await?
            .json()
            .await?)
    }

    pub async fn current_application(&self) -> Result<Application, DiscordError> {
        let url = format!("{}/oauth2/applications/@me", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        Ok(Self::check("fetching application info", response)
            .await?
            .json()
            .await?)
    }

    pub async fn current_user_guilds(&self) -> Result<Vec<PartialGuild>, DiscordError> {
        let url = format!("{}/users/@me/guilds", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        Ok(Self::check("listing guilds", response).await?.json().await?)
    }

    pub async fn get_channel(&self, channel_id: Snowflake) -> Result<Channel, DiscordError> {
        let url = format!("{}/channels/{}", self.base_url, channel_id);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        Ok(Self::check("fetching channel", response)
            .await?
            .json()
            .await?)
    }

    /// The most recent messages of a channel, newest first.
    pub async fn channel_messages(
        &self,
        channel_id: Snowflake,
        limit: u8,
    ) -> Result<Vec<Message>, DiscordError> {
        let url = format!(
            "{}/channels/{}/messages?limit={}",
            self.base_url, channel_id, limit
        );
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        Ok(Self::check("fetching channel messages", response)
            .await?
            .json()
            .await?)
    }

    pub async fn create_message(
        &self,
        channel_id: Snowflake,
        message: &CreateMessage,
    ) -> Result<Message, DiscordError> {
        let url = format!("{}/channels/{}/messages", self.base_url, channel_id);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(message)
            .send()
            .await?;
        Ok(Self::check("sending message", response)
            .await?
            .json()
            .await?)
    }

    pub async fn edit_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        edit: &EditMessage,
    ) -> Result<Message, DiscordError> {
        let url = format!(
            "{}/channels/{}/messages/{}",
            self.base_url, channel_id, message_id
        );
        let response = self
            .client
            .patch(&url)
            .header("Authorization", self.auth_header())
            .json(edit)
            .send()
            .await?;
        Ok(Self::check("editing message", response)
            .await?
            .json()
            .await?)
    }

    pub async fn create_guild_channel(
        &self,
        guild_id: Snowflake,
        request: &CreateGuildChannel,
        audit_reason: &str,
    ) -> Result<Channel, DiscordError> {
        let url = format!("{}/guilds/{}/channels", self.base_url, guild_id);
        info!("Creating channel '{}' in guild {}", request.name, guild_id);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("X-Audit-Log-Reason", encode_audit_reason(audit_reason))
            .json(request)
            .send()
            .await?;
        Ok(Self::check("creating channel", response)
            .await?
            .json()
            .await?)
    }

    pub async fn delete_channel(
        &self,
        channel_id: Snowflake,
        audit_reason: &str,
    ) -> Result<(), DiscordError> {
        let url = format!("{}/channels/{}", self.base_url, channel_id);
        info!("Deleting channel {}", channel_id);
        let response = self
            .client
            .delete(&url)
            .header("Authorization", self.auth_header())
            .header("X-Audit-Log-Reason", encode_audit_reason(audit_reason))
            .send()
            .await?;
        Self::check("deleting channel", response).await?;
        Ok(())
    }

    pub async fn guild_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Member, DiscordError> {
        let url = format!("{}/guilds/{}/members/{}", self.base_url, guild_id, user_id);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        Ok(Self::check("fetching guild member", response)
            .await?
            .json()
            .await?)
    }

    pub async fn guild_roles(&self, guild_id: Snowflake) -> Result<Vec<Role>, DiscordError> {
        let url = format!("{}/guilds/{}/roles", self.base_url, guild_id);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;
        Ok(Self::check("listing guild roles", response)
            .await?
            .json()
            .await?)
    }

    pub async fn add_member_role(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_id: Snowflake,
        audit_reason: &str,
    ) -> Result<(), DiscordError> {
        let url = format!(
            "{}/guilds/{}/members/{}/roles/{}",
            self.base_url, guild_id, user_id, role_id
        );
        info!("Granting role {} to user {}", role_id, user_id);
        let response = self
            .client
            .put(&url)
            .header("Authorization", self.auth_header())
            .header("X-Audit-Log-Reason", encode_audit_reason(audit_reason))
            .header("Content-Length", "0")
            .send()
            .await?;
        Self::check("granting role", response).await?;
        Ok(())
    }

    /// Bulk-overwrite the guild's application commands. Replaces the whole
    /// set, so re-running it is harmless.
    pub async fn set_guild_commands(
        &self,
        application_id: Snowflake,
        guild_id: Snowflake,
        commands: &[CommandSpec],
    ) -> Result<(), DiscordError> {
        let url = format!(
            "{}/applications/{}/guilds/{}/commands",
            self.base_url, application_id, guild_id
        );
        let response = self
            .client
            .put(&url)
            .header("Authorization", self.auth_header())
            .json(&commands)
            .send()
            .await?;
        Self::check("registering commands", response).await?;
        Ok(())
    }
}

/// `X-Audit-Log-Reason` header values must be percent-encoded UTF-8; ours
/// are Russian, so nearly every byte gets encoded.
fn encode_audit_reason(reason: &str) -> String {
    let mut encoded = String::with_capacity(reason.len());
    for byte in reason.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => {
                encoded.push('%');
                encoded.push_str(&format!("{:02X}", byte));
            }
        }
    }
    encoded
}
