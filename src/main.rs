use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use spotmood::{cli, config, error, spotify::history::MAX_RECENTLY_PLAYED, types::ClientCredentials};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authorize with Spotify API
    Auth(AuthOptions),

    /// Show the mood of recently played tracks
    Mood(MoodOptions),

    /// Show cached credential state
    Status(StatusOptions),

    /// Forget the cached credential of a user
    Logout(UserOption),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct UserOption {
    /// Name the credential is cached under
    #[clap(long)]
    pub user: String,
}

#[derive(Parser, Debug, Clone)]
pub struct AuthOptions {
    /// Name the credential is cached under
    #[clap(long)]
    pub user: String,

    /// Client ID of the Spotify app (overrides SPOTIFY_API_AUTH_CLIENT_ID)
    #[clap(long, requires = "client_secret")]
    pub client_id: Option<String>,

    /// Client secret of the Spotify app (overrides SPOTIFY_API_AUTH_CLIENT_SECRET)
    #[clap(long, requires = "client_id")]
    pub client_secret: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct MoodOptions {
    /// Name the credential is cached under
    #[clap(long)]
    pub user: String,

    /// Number of recently played tracks to classify
    #[clap(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=MAX_RECENTLY_PLAYED as i64))]
    pub limit: u32,
}

#[derive(Parser, Debug, Clone)]
pub struct StatusOptions {
    /// Names to report on; can be repeated
    #[clap(long = "user", required = true, num_args = 1)]
    pub users: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        Command::Auth(opt) => {
            let client = match (opt.client_id, opt.client_secret) {
                (Some(id), Some(secret)) => Some(ClientCredentials::new(id, secret)),
                _ => None,
            };
            cli::auth(opt.user, client).await
        }
        Command::Mood(opt) => cli::mood(opt.user, opt.limit).await,
        Command::Status(opt) => cli::status(opt.users).await,
        Command::Logout(opt) => cli::logout(opt.user).await,
        Command::Completions(opt) => {
            let mut cmd = Cli::command_for_update();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
