use clap::{Parser, Subcommand};

mod commands;
mod util;

use commands::config::ConfigCommands;
use commands::feedback::FeedbackCommands;
use commands::review::ReviewArgs;
use commands::verify::VerifyArgs;

#[derive(Parser)]
#[command(
    name = "listing-trust",
    version,
    about = "Listing trust CLI: verify business listings, record reviews and manage thresholds"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "LISTING_TRUST_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Acting administrator, sent as x-actor-id on write requests
    #[arg(long, env = "LISTING_TRUST_ACTOR")]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health
    Health,
    /// Evaluate a business listing
    Verify(VerifyArgs),
    /// Record an administrator decision on a listing
    Review(ReviewArgs),
    /// Configuration operations
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Reviewer feedback
    Feedback {
        #[command(subcommand)]
        command: FeedbackCommands,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let actor = cli.actor.as_deref();

    let code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url).await,
        Commands::Verify(args) => commands::verify::run(&cli.api_url, args).await,
        Commands::Review(args) => commands::review::run(&cli.api_url, actor, args).await,
        Commands::Config { command } => commands::config::run(&cli.api_url, actor, command).await,
        Commands::Feedback { command } => commands::feedback::run(&cli.api_url, command).await,
    };

    std::process::exit(code);
}
