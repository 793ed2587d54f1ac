use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "stringr")]
#[command(about = "Track tennis racquets, strings, stringing jobs and play sessions")]
#[command(version)]
struct Cli {
    /// Backend URL (overrides STRINGR_BACKEND_URL and config)
    #[arg(long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
    },
    /// Forget the stored identity
    Logout,
    /// Show current login status
    Whoami,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Racquets you own
    Racquets {
        #[command(subcommand)]
        action: RacquetAction,
    },
    /// The string catalog
    Strings {
        #[command(subcommand)]
        action: StringAction,
    },
    /// Stringing jobs
    Jobs {
        #[command(subcommand)]
        action: JobAction,
    },
    /// Play sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Set a configuration value
    Set {
        /// Configuration key (backend, auth_file)
        key: String,
        /// Configuration value
        value: String,
    },
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Show all configuration
    Show,
    /// Get the config file path
    Path,
}

#[derive(Args, Default)]
pub struct PageArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    #[arg(long)]
    pub per_page: Option<u32>,
}

#[derive(Args, Default)]
pub struct RacquetFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub brand: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    /// String pattern, e.g. 16x19
    #[arg(long)]
    pub pattern: Option<String>,
    #[arg(long)]
    pub weight: Option<String>,
    #[arg(long)]
    pub year: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Subcommand)]
pub enum RacquetAction {
    List {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Racquet details with its stringing history and sessions
    Show { id: String },
    Add {
        #[command(flatten)]
        fields: RacquetFields,
    },
    Edit {
        id: String,
        #[command(flatten)]
        fields: RacquetFields,
    },
    Delete {
        id: String,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Default)]
pub struct StringFields {
    #[arg(long, default_value = "")]
    pub brand: String,
    #[arg(long, default_value = "")]
    pub model: String,
    #[arg(long, default_value = "")]
    pub material: String,
    #[arg(long, default_value = "")]
    pub gauge: String,
    #[arg(long, default_value = "")]
    pub color: String,
    #[arg(long, default_value = "")]
    pub construction: String,
    #[arg(long, default_value = "")]
    pub tension_range: String,
    #[arg(long, default_value = "")]
    pub durability: String,
    #[arg(long, default_value = "")]
    pub power: String,
    #[arg(long, default_value = "")]
    pub control: String,
    #[arg(long, default_value = "")]
    pub comfort: String,
    #[arg(long, default_value = "")]
    pub spin: String,
    #[arg(long, default_value = "")]
    pub notes: String,
}

#[derive(Subcommand)]
pub enum StringAction {
    /// Browse the catalog, optionally filtering the loaded page
    List {
        #[arg(long, short)]
        query: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Search brand and model on the server
    Search { query: String },
    Add {
        #[command(flatten)]
        fields: StringFields,
    },
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum JobAction {
    List {
        #[command(flatten)]
        page: PageArgs,
    },
    Add {
        #[arg(long)]
        racquet: String,
        #[arg(long, default_value = "")]
        main_string: String,
        #[arg(long, default_value = "")]
        cross_string: String,
        /// Main tension in lbs
        #[arg(long, default_value = "")]
        tension_main: String,
        /// Cross tension in lbs
        #[arg(long, default_value = "")]
        tension_cross: String,
    },
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum SessionAction {
    List {
        #[command(flatten)]
        page: PageArgs,
    },
    Add {
        #[arg(long, default_value = "")]
        string_job: String,
        #[arg(long, default_value = "")]
        duration_hours: String,
        /// 1-10
        #[arg(long, default_value = "")]
        rating: String,
        #[arg(long)]
        string_broken: bool,
        #[arg(long, default_value = "")]
        notes: String,
    },
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stringr=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Commands::Config { action } = cli.command {
        return commands::config(action);
    }

    let app = commands::App::start(cli.backend.as_deref())?;
    let result = match cli.command {
        Commands::Login { email, password } => app.login(&email, &password).await,
        Commands::Register {
            name,
            email,
            password,
            confirm_password,
        } => app.register(name, email, password, confirm_password).await,
        Commands::Logout => app.logout().await,
        Commands::Whoami => app.whoami().await,
        Commands::Racquets { action } => app.racquets(action).await,
        Commands::Strings { action } => app.strings(action).await,
        Commands::Jobs { action } => app.jobs(action).await,
        Commands::Sessions { action } => app.sessions(action).await,
        Commands::Config { .. } => Ok(()),
    };

    // Storage writes are fire-and-forget; let them land before exiting
    app.session.flush().await;

    if let Err(e) = result {
        tracing::error!("Command failed: {:#}", e);
        eprintln!("\x1b[31m✗ {}\x1b[0m", e);
        std::process::exit(1);
    }

    Ok(())
}
