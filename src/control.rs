//! Parsing and printing of the `custom_id` strings attached to this bot's
//! buttons, select menus and modals. The custom_id is the only state a
//! component carries across restarts, so every control embeds what its
//! handler needs: decision buttons carry the applicant (and candidate role),
//! form submissions carry the draft id minted at role selection.

use std::fmt;

use uuid::Uuid;

use crate::discord::Snowflake;

/// An interactive control this bot emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlId {
    /// The welcome prompt's "fill in the form" button.
    StartApplication,
    /// The candidate-role select menu.
    RoleSelect,
    /// The application modal; the uuid keys the draft made at selection.
    ApplicationForm { draft_id: Uuid },
    /// Reviewer approves; grants `role_id` to the applicant when present.
    Approve {
        applicant_id: Snowflake,
        role_id: Option<Snowflake>,
    },
    /// Reviewer declines the application.
    Deny {
        applicant_id: Snowflake,
        role_id: Option<Snowflake>,
    },
    /// Reviewer closes the ticket channel.
    CloseTicket { applicant_id: Snowflake },
    /// The applicant's own close button, offered after a verdict.
    ThankAndClose { applicant_id: Snowflake },
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlId::StartApplication => write!(f, "ls_apply_start"),
            ControlId::RoleSelect => write!(f, "ls_apply_role"),
            ControlId::ApplicationForm { draft_id } => write!(f, "ls_apply_form:{}", draft_id),
            ControlId::Approve {
                applicant_id,
                role_id,
            } => write_decision(f, "ls_decide_approve", *applicant_id, *role_id),
            ControlId::Deny {
                applicant_id,
                role_id,
            } => write_decision(f, "ls_decide_deny", *applicant_id, *role_id),
            ControlId::CloseTicket { applicant_id } => {
                write!(f, "ls_decide_close:{}", applicant_id)
            }
            ControlId::ThankAndClose { applicant_id } => {
                write!(f, "ls_ticket_thanks:{}", applicant_id)
            }
        }
    }
}

fn write_decision(
    f: &mut fmt::Formatter<'_>,
    prefix: &str,
    applicant_id: Snowflake,
    role_id: Option<Snowflake>,
) -> fmt::Result {
    write!(f, "{}:{}", prefix, applicant_id)?;
    if let Some(role_id) = role_id {
        write!(f, ":{}", role_id)?;
    }
    Ok(())
}

impl ControlId {
    /// Parse an incoming component or modal `custom_id`.
    ///
    /// Returns None for ids this bot never issued, including well-formed
    /// prefixes with malformed payloads; the caller treats those as stale
    /// controls rather than guessing at intent.
    pub fn parse(custom_id: &str) -> Option<ControlId> {
        let parts: Vec<&str> = custom_id.split(':').collect();
        match parts.as_slice() {
            ["ls_apply_start"] => Some(ControlId::StartApplication),
            ["ls_apply_role"] => Some(ControlId::RoleSelect),
            ["ls_apply_form", raw] => Uuid::parse_str(raw)
                .ok()
                .map(|draft_id| ControlId::ApplicationForm { draft_id }),
            ["ls_decide_approve", rest @ ..] => {
                parse_decision(rest).map(|(applicant_id, role_id)| ControlId::Approve {
                    applicant_id,
                    role_id,
                })
            }
            ["ls_decide_deny", rest @ ..] => {
                parse_decision(rest).map(|(applicant_id, role_id)| ControlId::Deny {
                    applicant_id,
                    role_id,
                })
            }
            ["ls_decide_close", raw] => raw
                .parse()
                .ok()
                .map(|applicant_id| ControlId::CloseTicket { applicant_id }),
            ["ls_ticket_thanks", raw] => raw
                .parse()
                .ok()
                .map(|applicant_id| ControlId::ThankAndClose { applicant_id }),
            _ => None,
        }
    }
}

fn parse_decision(parts: &[&str]) -> Option<(Snowflake, Option<Snowflake>)> {
    match parts {
        [applicant] => applicant.parse().ok().map(|id| (id, None)),
        [applicant, role] => Some((applicant.parse().ok()?, Some(role.parse().ok()?))),
        _ => None,
    }
}
