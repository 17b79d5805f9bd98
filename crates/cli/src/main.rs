//! Baso CLI: the main entry point.
//!
//! Commands:
//! - `chat`: Interactive conversation in any mode
//! - `ask`: Single submission
//! - `complete`: One autocomplete round
//! - `modes`: List modes and their policies
//! - `doctor`: Diagnose configuration and connectivity
//! - `init`: Write a default config file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "baso",
    about = "Baso — Minangkabau language companion",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive conversation
    Chat {
        /// Starting mode
        #[arg(short, long, default_value = "chat")]
        mode: String,

        /// Language preference (min, id, en)
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Send a single message and print the streamed answer
    Ask {
        /// Mode to use
        #[arg(short, long, default_value = "chat")]
        mode: String,

        /// Context tag, e.g. the etiquette audience
        #[arg(short, long)]
        context: Option<String>,

        /// Attach an image file
        #[arg(short, long)]
        image: Option<std::path::PathBuf>,

        /// Language preference (min, id, en)
        #[arg(short, long)]
        language: Option<String>,

        /// The message
        text: String,
    },

    /// Suggest a continuation for a sentence
    Complete {
        /// The sentence typed so far
        text: String,
    },

    /// List modes and their policies
    Modes,

    /// Diagnose configuration and connectivity
    Doctor,

    /// Write a default config file
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat { mode, language } => commands::chat::run(&mode, language).await?,
        Commands::Ask {
            mode,
            context,
            image,
            language,
            text,
        } => commands::ask::run(&mode, context, image, language, text).await?,
        Commands::Complete { text } => commands::complete::run(&text).await?,
        Commands::Modes => commands::modes::run()?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Init => commands::init::run()?,
    }

    Ok(())
}
