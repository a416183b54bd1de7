//! Completion state: local source of truth plus a best-effort remote mirror.

mod store;
mod worker;

pub use store::ProgressStore;

/// What un-completing a question does to the remote row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UncompletePolicy {
    /// Delete the remote row so the next pull does not resurrect it.
    #[default]
    DeleteRemote,
    /// Leave the remote row alone; a later pull brings the completion back.
    KeepRemote,
}

impl UncompletePolicy {
    #[must_use]
    pub fn from_name(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "delete-remote" => Some(Self::DeleteRemote),
            "keep-remote" => Some(Self::KeepRemote),
            _ => None,
        }
    }
}

/// How pulled remote rows combine with local state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PullPolicy {
    /// Remote rows replace local state wholesale.
    #[default]
    Replace,
    /// Union of both sides; remote timestamps win and the result is pushed back.
    Merge,
}

impl PullPolicy {
    #[must_use]
    pub fn from_name(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "replace" => Some(Self::Replace),
            "merge" => Some(Self::Merge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncPolicy {
    pub uncomplete: UncompletePolicy,
    pub pull: PullPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies_parse_case_insensitively() {
        assert_eq!(UncompletePolicy::from_name("Keep-Remote"), Some(UncompletePolicy::KeepRemote));
        assert_eq!(PullPolicy::from_name(" merge "), Some(PullPolicy::Merge));
        assert_eq!(PullPolicy::from_name("union"), None);
        assert_eq!(
            SyncPolicy::default(),
            SyncPolicy {
                uncomplete: UncompletePolicy::DeleteRemote,
                pull: PullPolicy::Replace,
            }
        );
    }
}
