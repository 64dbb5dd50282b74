//! Classification of the target ref and computation of fetch refspecs.
//!
//! A CI run targets either a branch push (`refs/heads/*`) or a pull-request
//! style ref (anything else, e.g. `refs/pull/42/merge`). The two differ in
//! which remote-tracking ref receives the fetched commit and whether the
//! final checkout lands on a local branch or a detached HEAD.

use std::fmt;

/// Target ref of a checkout, discriminated by event kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefSpec {
    /// A branch push: `refs/heads/<name>`.
    Branch {
        /// Branch name without the `refs/heads/` prefix.
        name: String,
    },
    /// A pull-request (or other non-branch) ref.
    PullRequest {
        /// Ref path without the leading `refs/`, e.g. `pull/42/merge`.
        ref_path: String,
    },
}

impl RefSpec {
    /// Classify a full ref name (the `GITHUB_REF` value).
    #[must_use]
    pub fn classify(github_ref: &str) -> Self {
        if let Some(name) = github_ref.strip_prefix("refs/heads/") {
            Self::Branch {
                name: name.to_string(),
            }
        } else {
            let ref_path = github_ref
                .strip_prefix("refs/")
                .unwrap_or(github_ref)
                .to_string();
            Self::PullRequest { ref_path }
        }
    }

    /// The remote-tracking ref the target commit is fetched into.
    ///
    /// Branches land under `refs/remotes/origin/<name>`; pull requests under
    /// `refs/remotes/pull<N>/<rest>` so they never collide with branch refs.
    #[must_use]
    pub fn remote_ref(&self) -> String {
        match self {
            Self::Branch { name } => format!("refs/remotes/origin/{name}"),
            Self::PullRequest { ref_path } => match ref_path.split_once('/') {
                Some((head, rest)) => format!("refs/remotes/{head}{rest}"),
                None => format!("refs/remotes/{ref_path}"),
            },
        }
    }

    /// Refspecs passed to `git fetch` to materialize the target commit.
    ///
    /// Pull requests additionally fetch all branch heads so merge commits
    /// referencing base branches resolve.
    #[must_use]
    pub fn fetch_refspecs(&self, sha: &str) -> Vec<String> {
        let into_remote_ref = format!("+{sha}:{}", self.remote_ref());
        match self {
            Self::Branch { .. } => vec![into_remote_ref],
            Self::PullRequest { .. } => vec![
                "+refs/heads/*:refs/remotes/origin/*".to_string(),
                into_remote_ref,
            ],
        }
    }

    /// Whether the final checkout is detached (pull requests) or on a local
    /// branch (branch pushes).
    #[must_use]
    pub const fn is_detached(&self) -> bool {
        matches!(self, Self::PullRequest { .. })
    }
}

impl fmt::Display for RefSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Branch { name } => write!(f, "branch {name}"),
            Self::PullRequest { ref_path } => write!(f, "pull request {ref_path}"),
        }
    }
}
