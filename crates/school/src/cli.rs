//! Clap derive structures for the `school` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// school -- command-line client for the school server
#[derive(Debug, Parser)]
#[command(
    name = "school",
    version,
    about = "Talk to a school server from the command line",
    long_about = "Log in to a school server, call its resources, and follow\n\
        live notifications over the push socket.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "SCHOOL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server URL (overrides profile)
    #[arg(long, short = 's', env = "SCHOOL_SERVER", global = true)]
    pub server: Option<String>,

    /// Config file to read instead of the default location
    #[arg(long, env = "SCHOOL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SCHOOL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "SCHOOL_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (0 disables it)
    #[arg(long, env = "SCHOOL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and store the session for later commands
    Login(LoginArgs),

    /// End the stored session
    Logout,

    /// Show who the stored session belongs to
    Whoami,

    /// Call a server resource with the stored session
    #[command(alias = "req")]
    Request(RequestArgs),

    /// List, follow, and acknowledge notifications
    #[command(alias = "n")]
    Notifications(NotificationsArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Session ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Account email (defaults to the profile's email, else prompts)
    #[arg(long, short = 'e')]
    pub email: Option<String>,

    /// Read the password from this environment variable instead of prompting
    #[arg(long, value_name = "VAR")]
    pub password_env: Option<String>,
}

// ── Request ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

#[derive(Debug, Args)]
pub struct RequestArgs {
    /// HTTP method
    #[arg(value_enum, ignore_case = true)]
    pub method: HttpMethod,

    /// Resource path under /api/ (e.g. "students" or "dashboard/teacher")
    pub resource: String,

    /// Inline JSON body
    #[arg(long, short = 'd', conflicts_with_all = ["data_file", "file"])]
    pub data: Option<String>,

    /// JSON body read from a file
    #[arg(long, value_name = "PATH", conflicts_with = "file")]
    pub data_file: Option<PathBuf>,

    /// Upload a file as multipart/form-data
    #[arg(long, short = 'f', value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Form field name for --file
    #[arg(long, default_value = "file", requires = "file")]
    pub field: String,
}

// ── Notifications ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NotificationsArgs {
    #[command(subcommand)]
    pub command: NotificationsCommand,
}

#[derive(Debug, Subcommand)]
pub enum NotificationsCommand {
    /// List notifications, newest first
    #[command(alias = "ls")]
    List {
        /// Only show unread notifications
        #[arg(long, short = 'u')]
        unread: bool,
    },

    /// Follow notifications live until interrupted or the session ends
    Watch,

    /// Mark one notification read
    Read {
        /// Notification id
        id: String,
    },

    /// Mark every notification read
    ReadAll,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive setup wizard
    Init,

    /// Display the resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Add or replace a profile without prompting
    AddProfile {
        /// Profile name
        name: String,

        /// Server base URL
        #[arg(long)]
        url: String,

        /// Account email remembered for login
        #[arg(long)]
        email: Option<String>,

        /// Where the session is kept between runs
        #[arg(long, value_enum, default_value = "file")]
        store: StoreKindArg,
    },

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },

    /// List configured profiles
    Profiles,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StoreKindArg {
    Keyring,
    File,
    Memory,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
