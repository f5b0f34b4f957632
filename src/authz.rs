use crate::discord::Snowflake;

/// True iff the member holds at least one of the configured reviewer roles.
/// A member with no roles at all is an ordinary `false`, not an error.
pub fn is_reviewer(member_roles: &[Snowflake], reviewer_roles: &[Snowflake]) -> bool {
    member_roles.iter().any(|role| reviewer_roles.contains(role))
}
