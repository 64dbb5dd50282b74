use std::fmt;

/// Categorized git failures with guidance for the CI log.
#[derive(Debug)]
pub enum GitError {
    /// Network-level failures (DNS, timeouts, unreachable server).
    Network(String),
    /// Authentication failures (bad or expired token).
    Authentication(String),
    /// Missing ref, commit or repository.
    NotFound(String),
    /// Working-tree conflicts blocking the checkout.
    Conflict(String),
    /// Filesystem permission failures in the workspace.
    Permission(String),
    /// Malformed or unresolvable reference.
    InvalidRef(String),
    /// Anything else.
    Unknown(String),
}

impl GitError {
    /// Categorize a failed git command from its stderr.
    #[must_use]
    pub fn from_stderr(command: &str, stderr: &str) -> Self {
        let stderr_lower = stderr.to_lowercase();

        if stderr_lower.contains("could not resolve host")
            || stderr_lower.contains("connection timed out")
            || stderr_lower.contains("connection refused")
            || stderr_lower.contains("network is unreachable")
            || stderr_lower.contains("early eof")
            || stderr_lower.contains("the remote end hung up")
        {
            return Self::Network(format!("{command}: {}", summarize(stderr)));
        }

        // Filesystem permission failures first: their stderr also says
        // "permission denied", which would land in the auth bucket below
        if stderr_lower.contains("unable to create")
            || stderr_lower.contains("unable to unlink")
            || stderr_lower.contains("read-only file system")
            || stderr_lower.contains("cannot open")
        {
            return Self::Permission(format!("{command}: {}", summarize(stderr)));
        }

        if stderr_lower.contains("authentication failed")
            || stderr_lower.contains("could not read username")
            || stderr_lower.contains("invalid credentials")
            || stderr_lower.contains("access denied")
            || stderr_lower.contains("permission denied")
        {
            return Self::Authentication(format!("{command}: {}", summarize(stderr)));
        }

        if stderr_lower.contains("not found")
            || stderr_lower.contains("does not exist")
            || stderr_lower.contains("does not appear to be a git repository")
            || stderr_lower.contains("couldn't find remote ref")
            || stderr_lower.contains("repository not found")
        {
            return Self::NotFound(format!("{command}: {}", summarize(stderr)));
        }

        if stderr_lower.contains("would be overwritten by checkout")
            || stderr_lower.contains("needs merge")
            || stderr_lower.contains("non-fast-forward")
        {
            return Self::Conflict(format!("{command}: {}", summarize(stderr)));
        }

        if stderr_lower.contains("invalid ref")
            || stderr_lower.contains("bad revision")
            || stderr_lower.contains("malformed")
            || stderr_lower.contains("ambiguous argument")
        {
            return Self::InvalidRef(format!("{command}: {}", summarize(stderr)));
        }

        Self::Unknown(format!("{command}: {}", summarize(stderr)))
    }

    /// Whether this failure class is transient and worth retrying.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Message with guidance appropriate for a CI log.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(msg) => {
                format!("{msg}\nThe git server was unreachable; the run can simply be retried.")
            }
            Self::Authentication(msg) => format!(
                "{msg}\nCheck that the provided token is valid, unexpired and has read access \
                 to the repository."
            ),
            Self::NotFound(msg) => format!(
                "{msg}\nCheck the repository slug and that the target ref and commit still \
                 exist on the server."
            ),
            Self::Conflict(msg) => format!(
                "{msg}\nThe working tree has local changes in the way of the forced checkout; \
                 clean the workspace and retry the run."
            ),
            Self::Permission(msg) => format!(
                "{msg}\nCheck filesystem permissions on the workspace and that the runner user \
                 owns it."
            ),
            Self::InvalidRef(msg) => {
                format!("{msg}\nThe computed ref name is not acceptable to git.")
            }
            Self::Unknown(msg) => msg.clone(),
        }
    }
}

impl fmt::Display for GitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for GitError {}

/// Keep the first few non-empty stderr lines; git buries the useful part
/// under progress noise.
fn summarize(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(3)
        .collect();

    if lines.is_empty() {
        return "no error details available".to_string();
    }

    lines.join(" | ")
}
