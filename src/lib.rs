#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # ci-checkout - Shallow Git Checkout for CI Runners
//!
//! ci-checkout prepares a CI workspace: it detects the host OS and
//! distribution, makes sure `git` is installed (via the native package
//! manager when it is not), configures git identity and credentials, and
//! shallow-fetches a specific commit - a branch push or a pull-request ref -
//! into the working directory.
//!
//! ## Architecture
//!
//! - [`host`]: OS/distro detection (closed enum classification)
//! - [`installer`]: package-manager dispatch and git provisioning
//! - [`retry`]: linear-backoff retry policy for flaky network commands
//! - [`exec`]: inspectable external-command plans and execution
//! - [`refspec`]: branch vs pull-request ref classification
//! - [`checkout`]: the configure/fetch/checkout state machine
//! - [`credentials`]: idempotent git credential-store handling
//! - [`config`]: resolved run inputs
//! - [`output`]: CI log annotations and colored status lines
//!
//! ## Example Usage
//!
//! ```no_run
//! use ci_checkout::checkout::CheckoutSession;
//! use ci_checkout::config::CheckoutConfig;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = CheckoutConfig {
//!     server_url: "https://github.com".to_string(),
//!     repository: "owner/repo".to_string(),
//!     github_ref: "refs/heads/main".to_string(),
//!     sha: "0123456789abcdef0123456789abcdef01234567".to_string(),
//!     token: "ghs_example".to_string(),
//!     persist_credentials: false,
//!     workspace: ".".into(),
//! };
//! CheckoutSession::new(config)?.run()?;
//! # Ok(())
//! # }
//! ```

/// The configure/fetch/checkout state machine.
pub mod checkout;

/// Resolved run inputs (environment variables and CLI arguments).
pub mod config;

/// Git credential-store management.
pub mod credentials;

/// External-command plans and execution.
pub mod exec;

/// Host OS and distribution detection.
pub mod host;

/// Package-manager dispatch for provisioning git.
pub mod installer;

/// CI log annotations and colored status output.
pub mod output;

/// Branch vs pull-request ref classification.
pub mod refspec;

/// Linear-backoff retry policy.
pub mod retry;

/// Current version of the ci-checkout binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
