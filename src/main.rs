use anyhow::Result;
use ci_checkout::checkout::CheckoutSession;
use ci_checkout::config::{self, CheckoutConfig};
use ci_checkout::credentials::CredentialStore;
use ci_checkout::installer::Installer;
use ci_checkout::{host, output};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ci-checkout",
    version = ci_checkout::VERSION,
    about = "Shallow git checkout for CI runners",
    long_about = "Detects the host OS, provisions git when missing, configures credentials \
                  and shallow-fetches a specific commit into the workspace"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Perform the full checkout sequence
    Run {
        /// Base URL of the git server
        #[arg(
            long,
            env = "GITHUB_SERVER_URL",
            default_value = "https://github.com"
        )]
        server_url: String,

        /// Repository slug (owner/repo)
        #[arg(long, env = "GITHUB_REPOSITORY")]
        repository: String,

        /// Full target ref (refs/heads/* or a pull-request ref)
        #[arg(long = "ref", env = "GITHUB_REF")]
        git_ref: String,

        /// Commit SHA to check out
        #[arg(long, env = "GITHUB_SHA")]
        sha: String,

        /// Access token for HTTP(S) authentication
        #[arg(long, env = "INPUT_TOKEN", hide_env_values = true)]
        token: String,

        /// Keep the stored credential after the run ("true" to keep)
        #[arg(long, env = "INPUT_PERSIST_CREDENTIALS", default_value = "false")]
        persist_credentials: String,

        /// Directory to check the repository out into
        #[arg(long, default_value = ".")]
        workspace: PathBuf,
    },

    /// Print the detected host classification
    Detect,

    /// Delete the stored credential file
    Scrub,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli.command) {
        output::error(&format!("{e:#}"));
        eprintln!("{} {e:#}", "Error:".red().bold());
        process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            server_url,
            repository,
            git_ref,
            sha,
            token,
            persist_credentials,
            workspace,
        } => {
            output::group("Detecting host");
            let classification = host::detect()?;
            output::info(&format!("host: {classification}"));
            output::end_group();

            output::group("Ensuring git is available");
            let mut installer = Installer::new(classification);
            installer.ensure_git()?;
            output::end_group();

            let config = CheckoutConfig {
                server_url,
                repository,
                github_ref: git_ref,
                sha,
                token,
                persist_credentials: config::parse_persist_credentials(&persist_credentials),
                workspace,
            };
            CheckoutSession::new(config)?.run()
        }
        Commands::Detect => {
            let classification = host::detect()?;
            println!("{classification}");
            Ok(())
        }
        Commands::Scrub => {
            let store = CredentialStore::default_store()?;
            store.clear()?;
            output::action("Scrubbed", "credential store");
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
