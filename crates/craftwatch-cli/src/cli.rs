use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use craftwatch_core::analytics::TimePeriod;
use craftwatch_core::ServerStatus;

#[derive(Parser)]
#[command(name = "craftwatch")]
#[command(about = "Keep an eye on the game servers you run")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// CLI profile name for backend configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List your servers with their last known status
    #[command(alias = "ls")]
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a server
    #[command(alias = "new")]
    Add {
        /// Display name
        name: String,
        /// Server IP address
        #[arg(long, value_name = "IP")]
        ip: Option<String>,
        /// Server port (defaults to 25565 when an IP is given)
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,
        /// Hostname, preferred over IP when probing
        #[arg(long, value_name = "HOST")]
        url: Option<String>,
        /// Initial status when not probing
        #[arg(long, value_parser = parse_status)]
        status: Option<ServerStatus>,
        /// Skip the status probe before saving
        #[arg(long)]
        no_probe: bool,
    },
    /// Edit a server
    Edit {
        /// Server ID or unique ID prefix
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_name = "IP")]
        ip: Option<String>,
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,
        #[arg(long, value_name = "HOST")]
        url: Option<String>,
        /// Manual status; kept until the next probe
        #[arg(long, value_parser = parse_status)]
        status: Option<ServerStatus>,
        /// Manual player count; kept until the next probe
        #[arg(long)]
        players: Option<u32>,
    },
    /// Delete a server
    #[command(alias = "rm")]
    Delete {
        /// Server ID or unique ID prefix
        id: String,
    },
    /// Probe every server once and save changed statuses
    Refresh {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep refreshing on a timer; type `r` + Enter to refresh now, `q` to quit
    Watch {
        /// Seconds between refreshes
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Query the status API for one address
    Probe {
        /// Hostname or ip:port
        address: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show player and status totals
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Admin-only account management
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Authenticate CLI profile with Supabase
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum AdminCommands {
    /// List user accounts, newest first
    Users {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sign-ups and activity per day or month
    Analytics {
        /// week, month or year
        #[arg(long, default_value = "week", value_parser = parse_period)]
        period: TimePeriod,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a user's profile
    Delete {
        /// Profile ID
        id: String,
    },
    /// Grant or revoke admin rights
    ToggleAdmin {
        /// Profile ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Status API base URL
        #[arg(long, value_name = "URL")]
        status_api_url: Option<String>,
        /// Seconds between timer refreshes in `watch`
        #[arg(long, value_name = "SECS")]
        refresh_interval: Option<u64>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile config
    Show,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Login with Supabase email/password and store session in keychain
    Login {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Supabase account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Supabase account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Create an account
    Signup {
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Show auth status for profile
    Status {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
    /// Logout profile and clear stored session
    Logout {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}

fn parse_status(value: &str) -> Result<ServerStatus, String> {
    value.parse()
}

fn parse_period(value: &str) -> Result<TimePeriod, String> {
    value.parse()
}
