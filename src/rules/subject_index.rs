//! Subject Indexer: stable index keys for user/group subjects.

use crate::types::subject::Subject;

pub fn user_key(name: &str, scope: &str) -> String {
    format!("user:{name}-{scope}")
}

pub fn group_key(name: &str, scope: &str) -> String {
    format!("group:{name}-{scope}")
}

/// Computes the index key a binding should be reachable under, given its
/// resolved subject and scope. `scope` is the cluster name for CRTBs, the
/// project-derived namespace for PRTBs, or `""` for GRBs ("all scopes").
pub fn subject_key(subject: &Subject, scope: &str) -> String {
    match subject {
        Subject::User(name) | Subject::UserPrincipal(name) => user_key(name, scope),
        Subject::Group(name) | Subject::GroupPrincipal(name) => group_key(name, scope),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_key_format() {
        assert_eq!(user_key("alice", "c1"), "user:alice-c1");
    }

    #[test]
    fn group_key_format() {
        assert_eq!(group_key("admins", ""), "group:admins-");
    }

    #[test]
    fn subject_key_dispatches_on_kind() {
        assert_eq!(subject_key(&Subject::User("alice".into()), "c1"), "user:alice-c1");
        assert_eq!(
            subject_key(&Subject::GroupPrincipal("g".into()), "c1"),
            "group:g-c1"
        );
    }
}
