use std::process::ExitCode;

use clap::Parser;
use latch::session::{LoginSession, SessionOutcome};
use latch::{FormState, LatchBuilder, LatchConfig, SqliteStorage};
use tokio::io::BufReader;

/// Command line login form
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Login endpoint, overrides LATCH_ENDPOINT
    #[arg(long)]
    endpoint: Option<String>,

    /// Database connection string, overrides LATCH_DATABASE_URL
    #[arg(long)]
    db_url: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(clap::Subcommand)]
enum Commands {
    /// Sign in, retrying until success, lockout or end of input
    Login {
        #[arg(long)]
        email: String,

        /// Prompted for on stdin when omitted, and again after each rejection
        #[arg(long)]
        password: Option<String>,

        /// Keep the session token across runs
        #[arg(long)]
        remember: bool,
    },
    /// Show the lockout state
    Status,
    /// Run database migrations
    Migrate,
    /// Print version information
    Version,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut config = LatchConfig::from_env()?;
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(db_url) = cli.db_url {
        config.database_url = db_url;
    }

    match cli.command {
        Commands::Version => {
            println!("Latch v{}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Migrate => {
            println!("Running migrations...");
            let storage = SqliteStorage::connect(&config.database_url).await?;
            storage.migrate().await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => {
            let controller = LatchBuilder::from_config(&config)?
                .with_sqlite(&config.database_url)
                .await?
                .apply_migrations(true)
                .build()
                .await?;

            let status = controller.lockout_status().await;
            let mut form = FormState::new();
            form.refresh(&status);
            match form.time_remaining() {
                Some(remaining) => println!("Locked. {remaining}"),
                None => println!("Open"),
            }

            controller.shutdown().await;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Login {
            email,
            password,
            remember,
        } => {
            let controller = LatchBuilder::from_config(&config)?
                .with_sqlite(&config.database_url)
                .await?
                .apply_migrations(true)
                .build()
                .await?;

            let mut form = FormState::new();
            form.set_email(email);
            form.set_remember(remember);

            let input = BufReader::new(tokio::io::stdin());
            let outcome = LoginSession::new(&controller, form, input, tokio::io::stderr())
                .run(password)
                .await;
            controller.shutdown().await;

            match outcome? {
                SessionOutcome::SignedIn { destination } => {
                    println!("Signed in. Continue to {destination}");
                    Ok(ExitCode::SUCCESS)
                }
                SessionOutcome::Locked { .. } | SessionOutcome::EndOfInput => {
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}
