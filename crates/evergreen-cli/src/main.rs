use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "evergreen", version, about = "Evergreen Focus CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Focus timer control
    Focus {
        #[command(subcommand)]
        action: commands::focus::FocusAction,
    },
    /// Recorded sessions and streaks
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
    /// Account management
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Preference management
    Prefs {
        #[command(subcommand)]
        action: commands::prefs::PrefsAction,
    },
    /// Remote mirror upload and download
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
    /// Print the overall app state as JSON
    Status,
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Focus { action } => commands::focus::run(action),
        Commands::History { action } => commands::history::run(action),
        Commands::Auth { action } => commands::auth::run(action),
        Commands::Prefs { action } => commands::prefs::run(action),
        Commands::Sync { action } => commands::sync::run(action),
        Commands::Status => commands::status::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// Logs go to stderr so JSON output on stdout stays parseable.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
