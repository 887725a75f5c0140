use chrono::{DateTime, Utc};

use crate::core::time::format_relative;

/// Minimum prefix length accepted as a revision match
pub const MIN_REV_PREFIX: usize = 7;

/// One commit as shown in a changelog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub sha: String,
    /// First line of the commit message
    pub message: String,
    pub author: String,
    pub date: DateTime<Utc>,
    pub web_url: Option<String>,
    pub is_pinned: bool,
}

impl Commit {
    pub fn new(
        sha: impl Into<String>,
        message: &str,
        author: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            sha: sha.into(),
            message: first_line(message),
            author: author.into(),
            date,
            web_url: None,
            is_pinned: false,
        }
    }

    pub fn short_sha(&self) -> &str {
        self.sha.get(..MIN_REV_PREFIX).unwrap_or(&self.sha)
    }

    pub fn formatted_date(&self) -> String {
        format_relative(self.date, Utc::now())
    }

    pub fn matches_rev(&self, rev: &str) -> bool {
        revision_matches(&self.sha, rev)
    }
}

/// Whether `sha` and `rev` name the same commit: equal, or one a prefix of the
/// other with at least [`MIN_REV_PREFIX`] characters in common
pub fn revision_matches(sha: &str, rev: &str) -> bool {
    if sha.is_empty() || rev.is_empty() {
        return false;
    }
    if sha.eq_ignore_ascii_case(rev) {
        return true;
    }
    let (short, long) = if sha.len() < rev.len() {
        (sha, rev)
    } else {
        (rev, sha)
    };
    short.len() >= MIN_REV_PREFIX
        && long
            .get(..short.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(short))
}

/// Commits around the pinned revision, newest first
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangelogResult {
    pub commits: Vec<Commit>,
    /// Position of the pinned commit; `None` when it could not be located
    pub pinned_index: Option<usize>,
}

impl ChangelogResult {
    /// Commits newer than the pin, or every commit when the pin is unknown
    pub fn commits_ahead(&self) -> &[Commit] {
        match self.pinned_index {
            Some(index) => &self.commits[..index],
            None => &self.commits,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(sha: &str) -> Commit {
        Commit::new(sha, "subject\n\nbody", "Alice", Utc::now())
    }

    #[test]
    fn test_message_keeps_first_line() {
        assert_eq!(commit("abc").message, "subject");
    }

    #[test]
    fn test_short_sha() {
        assert_eq!(commit("0123456789").short_sha(), "0123456");
        assert_eq!(commit("abc").short_sha(), "abc");
    }

    #[test]
    fn test_revision_matches() {
        let sha = "deadbeefcafe0123456789abcdef0123456789ab";
        assert!(revision_matches(sha, sha));
        assert!(revision_matches(sha, "deadbeef"));
        assert!(revision_matches("deadbeefcafe", sha));
        assert!(revision_matches("DEADBEEF", "deadbeefcafe"));
        assert!(!revision_matches(sha, "dead"));
        assert!(!revision_matches(sha, "deadbeff"));
        assert!(!revision_matches(sha, ""));
        assert!(revision_matches("deadbeef", "deadbeef"));
    }

    #[test]
    fn test_commits_ahead() {
        let result = ChangelogResult {
            commits: vec![commit("a"), commit("b"), commit("c")],
            pinned_index: Some(2),
        };
        assert_eq!(result.commits_ahead().len(), 2);

        let unknown = ChangelogResult {
            pinned_index: None,
            ..result
        };
        assert_eq!(unknown.commits_ahead().len(), 3);
    }
}
