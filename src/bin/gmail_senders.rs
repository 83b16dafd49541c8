use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gmail_senders::auth::token_manager::TokenManager;
use gmail_senders::auth::{FailFast, TokenSource};
use gmail_senders::auth::token_store::Secret;
use gmail_senders::config::load_config;
use gmail_senders::mail::gmail_client::GmailClient;
use gmail_senders::report::HtmlReporter;
use gmail_senders::store::sqlite::SqliteRepo;
use gmail_senders::sync::{SyncOptions, SyncOrchestrator, render_report};

#[derive(Parser)]
#[command(name = "gmail_senders")]
#[command(about = "Harvest Gmail senders into SQLite and report them by volume", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,

    /// Seed the database with message ids from the Gmail API before enriching
    #[arg(long)]
    seed: bool,

    /// Render the sender report from the database without syncing
    #[arg(short = 'r', long = "report-only")]
    report_only: bool,

    /// Gmail search query used when seeding (overrides config)
    #[arg(long)]
    query: Option<String>,

    /// SQLite database file (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Report output file (overrides config)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Store the OAuth client secret in keyring
    SetClientSecret {
        #[arg(long)]
        client_id: String,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Some(Command::SetClientSecret { client_id }) = cli.cmd {
        eprintln!("Paste client secret (end with Ctrl-D):");
        let mut secret = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
        Secret::ClientSecret(&client_id).save(secret.trim())?;
        println!("Saved client secret for client_id {}", client_id);
        return Ok(());
    }

    let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e}"))?;
    let db_path = cli.db.unwrap_or_else(|| cfg.db_path());
    let reporter = HtmlReporter::new(cli.output.unwrap_or_else(|| cfg.report_path()));

    // the only failure that ends the run
    let repo = SqliteRepo::open(&db_path)
        .with_context(|| format!("opening message store {}", db_path.display()))?;

    if cli.report_only {
        render_report(&repo, &reporter);
        return Ok(());
    }

    let tokens = FailFast::new(TokenManager::from_config(&cfg)?);
    tokens
        .access_token()
        .context("authorizing Gmail access")?;
    let gmail = GmailClient::new(tokens)?;

    let opts = SyncOptions {
        seed: cli.seed,
        query: cli.query.unwrap_or_else(|| cfg.query().to_string()),
    };
    let summary = SyncOrchestrator::new(&repo, &gmail, &reporter).run(&opts);
    log::debug!("{summary:?}");

    Ok(())
}
