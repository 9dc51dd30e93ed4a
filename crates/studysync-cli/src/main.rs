use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "studysync", version, about = "StudySync CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Focus sessions with the mind mirror
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Lecture library
    Lecture {
        #[command(subcommand)]
        action: commands::lecture::LectureAction,
    },
    /// Quizzes and review scheduling
    Quiz {
        #[command(subcommand)]
        action: commands::quiz::QuizAction,
    },
    /// Chat with the tutor about a lecture
    Chat {
        /// Lecture ID
        id: String,
        /// Save the conversation as JSON when leaving
        #[arg(long)]
        transcript: Option<std::path::PathBuf>,
    },
    /// Study statistics
    Stats {
        /// Also list the most recent focus sessions
        #[arg(long)]
        recent: Option<usize>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Gemini API key management
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Session { action } => commands::session::run(action).await,
        Commands::Lecture { action } => commands::lecture::run(action).await,
        Commands::Quiz { action } => commands::quiz::run(action).await,
        Commands::Chat { id, transcript } => {
            commands::chat::run(&id, transcript.as_deref()).await
        }
        Commands::Stats { recent } => commands::stats::run(recent),
        Commands::Config { action } => commands::config::run(action),
        Commands::Auth { action } => commands::auth::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
