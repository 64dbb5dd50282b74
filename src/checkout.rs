//! The git checkout sequence.
//!
//! A checkout run walks a fixed sequence of states:
//!
//! ```text
//! Init ──> Configured ──> RefResolved ──> CheckedOut ──> (CredentialScrubbed)
//! ```
//!
//! - Init → Configured: mark the workspace safe, silence detached-HEAD
//!   advice, init the repository, disable auto-gc, pin remote `origin`,
//!   install the stored-credential helper and append the credential line.
//! - Configured → RefResolved: classify `GITHUB_REF` into a [`RefSpec`].
//! - RefResolved → CheckedOut: shallow-fetch the target commit into the
//!   remote-tracking ref (retried), then force-checkout a local branch or a
//!   detached HEAD.
//! - Terminal: unless credential persistence was requested, scrub the stored
//!   credential line.
//!
//! Fetches go through the retry policy; local commands (`checkout`,
//! `update-ref`) deliberately do not, they are fast and their failures are
//! never transient. A fetch failure categorized as permanent (bad
//! credentials, missing ref) aborts immediately instead of burning the
//! backoff budget. Any git failure is fatal and propagates to the caller.

use crate::config::CheckoutConfig;
use crate::credentials::CredentialStore;
use crate::exec::Invocation;
use crate::output;
use crate::refspec::RefSpec;
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use std::fs;
use std::process::Output;
use tracing::debug;

/// Git error categorization for checkout failures.
pub mod errors;

/// Drives the checkout sequence for one configured run.
pub struct CheckoutSession {
    /// Resolved inputs of the run.
    config: CheckoutConfig,
    /// Credential store receiving the token line.
    store: CredentialStore,
    /// Retry policy for network-facing git commands.
    retry: RetryPolicy,
}

impl CheckoutSession {
    /// Create a session using the default credential store.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new(config: CheckoutConfig) -> Result<Self> {
        Ok(Self {
            config,
            store: CredentialStore::default_store()?,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the credential store (tests point it at a temp file).
    #[must_use]
    pub fn with_store(mut self, store: CredentialStore) -> Self {
        self.store = store;
        self
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run the full checkout sequence.
    ///
    /// # Errors
    ///
    /// Returns an error on any git failure; no partial-state cleanup is
    /// attempted, the caller retries the whole run.
    pub fn run(&self) -> Result<()> {
        output::group("Configuring repository");
        self.configure()?;
        output::end_group();

        let refspec = RefSpec::classify(&self.config.github_ref);
        debug!("resolved {} -> {}", self.config.github_ref, refspec.remote_ref());

        output::group(&format!("Fetching {}", refspec));
        self.fetch(&refspec)?;
        self.checkout(&refspec)?;
        output::end_group();

        if self.config.persist_credentials {
            debug!("credential persistence requested, leaving store untouched");
        } else {
            self.scrub_credentials()?;
        }

        output::success(&format!(
            "Checked out {} at {}",
            self.config.repository, self.config.sha
        ));
        Ok(())
    }

    /// Init → Configured: repository, remote and credential setup.
    fn configure(&self) -> Result<()> {
        fs::create_dir_all(&self.config.workspace).with_context(|| {
            format!(
                "Failed to create workspace directory: {}",
                self.config.workspace.display()
            )
        })?;
        let workspace = self.config.workspace.canonicalize().with_context(|| {
            format!(
                "Failed to resolve workspace path: {}",
                self.config.workspace.display()
            )
        })?;

        let workspace_str = workspace.to_string_lossy();
        self.git(&["config", "--global", "--add", "safe.directory", &workspace_str])?;
        self.git(&["config", "--global", "advice.detachedHead", "false"])?;

        // Re-running init in an existing repository is harmless, which makes
        // the whole configure step idempotent.
        self.git(&["init"])?;
        self.git(&["config", "gc.auto", "0"])?;

        self.configure_remote()?;

        if let Some(credential) = self.config.credential()? {
            self.git(&["config", "--global", "credential.helper", "store"])?;
            if self.store.append_if_absent(&credential.store_line())? {
                output::action("Stored", &format!("credential for {}", credential.host));
            }
        }

        Ok(())
    }

    /// Point remote `origin` at the repository, tolerating a pre-existing
    /// remote from an earlier run.
    fn configure_remote(&self) -> Result<()> {
        let url = self.config.remote_url();

        let output = Invocation::new("git", &["remote", "add", "origin", &url])
            .output_in(Some(&self.config.workspace))
            .context("Failed to add git remote")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.contains("already exists") {
                let error = errors::GitError::from_stderr("git remote add", &stderr);
                return Err(anyhow::Error::new(error));
            }
            // Remote survives from an earlier run; pin the URL instead
            self.git(&["remote", "set-url", "origin", &url])?;
        }

        Ok(())
    }

    /// RefResolved → CheckedOut, first half: shallow-fetch the commit.
    fn fetch(&self, refspec: &RefSpec) -> Result<()> {
        if let RefSpec::Branch { .. } = refspec {
            self.delete_stale_remote_ref(&refspec.remote_ref())?;
        }

        let refspecs = refspec.fetch_refspecs(&self.config.sha);
        let mut args: Vec<&str> = vec!["fetch", "--depth=1", "origin"];
        args.extend(refspecs.iter().map(String::as_str));

        self.retry.run_while(
            || self.git(&args).map(drop),
            |err| {
                err.downcast_ref::<errors::GitError>()
                    .is_none_or(errors::GitError::should_retry)
            },
        )
    }

    /// Drop a remote-tracking ref left behind by a previous run so the
    /// forced fetch starts from a clean slate.
    fn delete_stale_remote_ref(&self, remote_ref: &str) -> Result<()> {
        let exists = Invocation::new("git", &["rev-parse", "--verify", "--quiet", remote_ref])
            .output_in(Some(&self.config.workspace))
            .context("Failed to check for existing remote ref")?
            .status
            .success();

        if exists {
            debug!("removing stale remote ref {remote_ref}");
            self.git(&["update-ref", "-d", remote_ref])?;
        }

        Ok(())
    }

    /// RefResolved → CheckedOut, second half: move the working tree.
    fn checkout(&self, refspec: &RefSpec) -> Result<()> {
        let remote_ref = refspec.remote_ref();
        match refspec {
            RefSpec::Branch { name } => {
                // Local branch tracking the freshly fetched remote ref
                self.git(&["checkout", "--force", "-B", name, &remote_ref])?;
            }
            RefSpec::PullRequest { .. } => {
                // Detached HEAD at the merge/head commit
                self.git(&["checkout", "--force", &remote_ref])?;
            }
        }
        Ok(())
    }

    /// Terminal step: remove the credential line written by `configure`.
    fn scrub_credentials(&self) -> Result<()> {
        if let Some(credential) = self.config.credential()? {
            self.store.remove(&credential.store_line())?;
            output::action("Scrubbed", "stored credential");
        }
        Ok(())
    }

    /// Run a git command in the workspace, categorizing failures.
    ///
    /// Failures carry a typed [`errors::GitError`] so the retry predicate in
    /// [`Self::fetch`] can tell transient failures from permanent ones.
    fn git(&self, args: &[&str]) -> Result<Output> {
        let plan = Invocation::new("git", args);
        let output = plan.output_in(Some(&self.config.workspace))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let error = errors::GitError::from_stderr(&plan.rendered(), &stderr);
            return Err(anyhow::Error::new(error));
        }

        Ok(output)
    }
}
