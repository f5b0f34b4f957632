use anyhow::{bail, Context, Result};
use ed25519_dalek::VerifyingKey;
use std::env;

use crate::discord::Snowflake;

/// Environment variables without which the bot cannot run at all.
const REQUIRED_VARS: [&str; 5] = [
    "DISCORD_TOKEN",
    "DISCORD_PUBLIC_KEY",
    "WELCOME_CHANNEL_ID",
    "TICKETS_CATEGORY_ID",
    "REVIEWER_ROLE_IDS",
];

#[derive(Clone)]
pub struct Config {
    pub bot_token: String,
    /// Ed25519 key Discord signs interaction requests with.
    pub public_key: VerifyingKey,
    /// Channel that holds the single welcome prompt.
    pub welcome_channel_id: Snowflake,
    /// Category ticket channels are created under.
    pub tickets_category_id: Snowflake,
    /// Roles whose holders may decide applications.
    pub reviewer_role_ids: Vec<Snowflake>,
    pub role_catalog: RoleCatalog,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Let a fresh deployment fix its environment in one round trip
        // instead of one variable per crash.
        let missing = missing_required(|name| env::var(name).ok());
        if !missing.is_empty() {
            bail!(
                "missing required environment variable(s): {}",
                missing.join(", ")
            );
        }

        let bot_token = env::var("DISCORD_TOKEN")
            .context("DISCORD_TOKEN environment variable is required")?;

        let public_key = parse_public_key(
            &env::var("DISCORD_PUBLIC_KEY")
                .context("DISCORD_PUBLIC_KEY environment variable is required")?,
        )?;

        let welcome_channel_id = env::var("WELCOME_CHANNEL_ID")
            .context("WELCOME_CHANNEL_ID environment variable is required")?
            .trim()
            .parse::<Snowflake>()
            .context("WELCOME_CHANNEL_ID must be a numeric channel id")?;

        let tickets_category_id = env::var("TICKETS_CATEGORY_ID")
            .context("TICKETS_CATEGORY_ID environment variable is required")?
            .trim()
            .parse::<Snowflake>()
            .context("TICKETS_CATEGORY_ID must be a numeric channel id")?;

        let reviewer_role_ids = parse_reviewer_roles(
            &env::var("REVIEWER_ROLE_IDS")
                .context("REVIEWER_ROLE_IDS environment variable is required")?,
        );
        if reviewer_role_ids.is_empty() {
            bail!("REVIEWER_ROLE_IDS must contain at least one numeric role id");
        }

        let role_catalog = match env::var("CANDIDATE_ROLES") {
            Ok(raw) if !raw.trim().is_empty() => parse_role_catalog(&raw)?,
            _ => RoleCatalog::default_lineup(),
        };

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        Ok(Config {
            bot_token,
            public_key,
            welcome_channel_id,
            tickets_category_id,
            reviewer_role_ids,
            role_catalog,
            port,
        })
    }
}

/// Names from `REQUIRED_VARS` that are unset or blank in the given
/// environment.
pub fn missing_required(lookup: impl Fn(&str) -> Option<String>) -> Vec<&'static str> {
    REQUIRED_VARS
        .iter()
        .copied()
        .filter(|name| lookup(name).map_or(true, |value| value.trim().is_empty()))
        .collect()
}

/// Decode the hex-encoded Ed25519 public key from the application's
/// developer-portal page.
pub fn parse_public_key(raw: &str) -> Result<VerifyingKey> {
    let bytes = hex::decode(raw.trim()).context("DISCORD_PUBLIC_KEY must be a hex string")?;
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("DISCORD_PUBLIC_KEY must be 32 bytes"))?;
    VerifyingKey::from_bytes(&bytes).context("DISCORD_PUBLIC_KEY is not a valid Ed25519 key")
}

/// Parse the comma-separated reviewer role list. Entries that are not plain
/// numbers are skipped rather than rejected, so a stray space or label does
/// not take the bot down.
pub fn parse_reviewer_roles(raw: &str) -> Vec<Snowflake> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<Snowflake>().ok())
        .collect()
}

/// Candidate roles offered in the application form, in menu order, each
/// mapped to the role granted on approval.
#[derive(Clone)]
pub struct RoleCatalog {
    entries: Vec<(String, Snowflake)>,
}

impl RoleCatalog {
    /// The team's standing recruitment lineup, used unless CANDIDATE_ROLES
    /// overrides it.
    pub fn default_lineup() -> Self {
        Self {
            entries: vec![
                ("Клинер".to_string(), Snowflake(1225460519712985140)),
                ("Тайпер".to_string(), Snowflake(1225462096318169198)),
                ("Редактор".to_string(), Snowflake(1225462307694448781)),
                ("Переводчик-EN".to_string(), Snowflake(1225460206083903549)),
                ("Переводчик-KR".to_string(), Snowflake(1409098606157365279)),
            ],
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(label, _)| label.as_str())
    }

    /// The role granted for a given form label, if the label is known.
    pub fn resolve(&self, label: &str) -> Option<Snowflake> {
        self.entries
            .iter()
            .find(|(known, _)| known == label)
            .map(|(_, id)| *id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a `Label:id,Label:id` CANDIDATE_ROLES override.
pub fn parse_role_catalog(raw: &str) -> Result<RoleCatalog> {
    let mut entries = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (label, id) = part
            .split_once(':')
            .with_context(|| format!("CANDIDATE_ROLES entry '{}' must be Label:id", part))?;
        let label = label.trim();
        if label.is_empty() {
            bail!("CANDIDATE_ROLES entry '{}' has an empty label", part);
        }
        let id = id
            .trim()
            .parse::<Snowflake>()
            .with_context(|| format!("CANDIDATE_ROLES entry '{}' has a non-numeric id", part))?;
        entries.push((label.to_string(), id));
    }
    if entries.is_empty() {
        bail!("CANDIDATE_ROLES is set but contains no entries");
    }
    Ok(RoleCatalog { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_required_reports_every_absent_variable() {
        let env: HashMap<&str, &str> =
            HashMap::from([("DISCORD_TOKEN", "t"), ("WELCOME_CHANNEL_ID", "1")]);
        let missing = missing_required(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(
            missing,
            vec![
                "DISCORD_PUBLIC_KEY",
                "TICKETS_CATEGORY_ID",
                "REVIEWER_ROLE_IDS"
            ]
        );
    }

    #[test]
    fn test_missing_required_treats_blank_as_missing() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DISCORD_TOKEN", "t"),
            ("DISCORD_PUBLIC_KEY", "   "),
            ("WELCOME_CHANNEL_ID", "1"),
            ("TICKETS_CATEGORY_ID", "2"),
            ("REVIEWER_ROLE_IDS", "3"),
        ]);
        let missing = missing_required(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(missing, vec!["DISCORD_PUBLIC_KEY"]);
    }

    #[test]
    fn test_missing_required_empty_when_all_present() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DISCORD_TOKEN", "t"),
            ("DISCORD_PUBLIC_KEY", "ab"),
            ("WELCOME_CHANNEL_ID", "1"),
            ("TICKETS_CATEGORY_ID", "2"),
            ("REVIEWER_ROLE_IDS", "3"),
        ]);
        assert!(missing_required(|name| env.get(name).map(|v| v.to_string())).is_empty());
    }

    #[test]
    fn test_parse_reviewer_roles_skips_junk() {
        let roles = parse_reviewer_roles("123, abc, 456,,  789 ");
        assert_eq!(roles, vec![Snowflake(123), Snowflake(456), Snowflake(789)]);
    }

    #[test]
    fn test_parse_reviewer_roles_empty_input() {
        assert!(parse_reviewer_roles("").is_empty());
        assert!(parse_reviewer_roles("nope, also nope").is_empty());
    }

    #[test]
    fn test_parse_public_key_round_trip() {
        let key = ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]).verifying_key();
        let parsed = parse_public_key(&hex::encode(key.to_bytes())).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_parse_public_key_rejects_bad_input() {
        assert!(parse_public_key("not hex").is_err());
        assert!(parse_public_key("abcd").is_err());
    }

    #[test]
    fn test_default_lineup_order() {
        let catalog = RoleCatalog::default_lineup();
        let labels: Vec<&str> = catalog.labels().collect();
        assert_eq!(
            labels,
            vec![
                "Клинер",
                "Тайпер",
                "Редактор",
                "Переводчик-EN",
                "Переводчик-KR"
            ]
        );
    }

    #[test]
    fn test_default_lineup_resolves_labels() {
        let catalog = RoleCatalog::default_lineup();
        assert_eq!(
            catalog.resolve("Тайпер"),
            Some(Snowflake(1225462096318169198))
        );
        assert_eq!(catalog.resolve("Сёгун"), None);
    }

    #[test]
    fn test_parse_role_catalog() {
        let catalog = parse_role_catalog("Клинер:111, Тайпер:222").unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.resolve("Клинер"), Some(Snowflake(111)));
        assert_eq!(catalog.resolve("Тайпер"), Some(Snowflake(222)));
    }

    #[test]
    fn test_parse_role_catalog_rejects_malformed_entries() {
        assert!(parse_role_catalog("Клинер").is_err());
        assert!(parse_role_catalog("Клинер:abc").is_err());
        assert!(parse_role_catalog(":123").is_err());
        assert!(parse_role_catalog(" , ,").is_err());
    }
}
