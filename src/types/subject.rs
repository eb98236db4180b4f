//! Shared subject-identification helpers for CRTB/PRTB/GRB.

/// Which subject field a binding carries. Priority when multiple are set:
/// `userName` > `groupName` > `groupPrincipalName`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    User(String),
    UserPrincipal(String),
    Group(String),
    GroupPrincipal(String),
}

impl Subject {
    pub fn is_user_kind(&self) -> bool {
        matches!(self, Subject::User(_) | Subject::UserPrincipal(_))
    }

    pub fn is_group_kind(&self) -> bool {
        matches!(self, Subject::Group(_) | Subject::GroupPrincipal(_))
    }
}

/// Resolves the single populated subject field among the four possible ones,
/// honoring the priority order user > group > groupPrincipal. Returns `None`
/// if none are set; this is itself an invariant violation the caller should
/// reject ("exactly one of ... must be present").
pub fn resolve_subject(
    user_name: &Option<String>,
    user_principal_name: &Option<String>,
    group_name: &Option<String>,
    group_principal_name: &Option<String>,
) -> Option<Subject> {
    if let Some(n) = non_empty(user_name) {
        return Some(Subject::User(n));
    }
    if let Some(n) = non_empty(user_principal_name) {
        return Some(Subject::UserPrincipal(n));
    }
    if let Some(n) = non_empty(group_name) {
        return Some(Subject::Group(n));
    }
    if let Some(n) = non_empty(group_principal_name) {
        return Some(Subject::GroupPrincipal(n));
    }
    None
}

fn non_empty(s: &Option<String>) -> Option<String> {
    match s {
        Some(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Counts how many of the four subject-kind groups are populated
/// (`{userName|userPrincipalName}` counts as one group, same for group).
/// Used to enforce "exactly one subject kind" invariants.
pub fn subject_group_count(
    user_name: &Option<String>,
    user_principal_name: &Option<String>,
    group_name: &Option<String>,
    group_principal_name: &Option<String>,
) -> usize {
    let user_group = non_empty(user_name).is_some() || non_empty(user_principal_name).is_some();
    let group_group = non_empty(group_name).is_some() || non_empty(group_principal_name).is_some();
    usize::from(user_group) + usize::from(group_group)
}
