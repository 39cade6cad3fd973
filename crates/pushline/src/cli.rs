//! Clap derive structures for the `pushline` CLI.

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// pushline -- listen on a resilient server push channel
#[derive(Debug, Parser)]
#[command(
    name = "pushline",
    version,
    about = "Listen on a server push channel from the command line",
    long_about = "Opens a long-lived event stream for one identity, answers the\n\
        server's liveness probes, and reconnects with exponential backoff\n\
        when the stream drops.",
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
    #[arg(long, short = 'p', env = "PUSHLINE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server base URL (overrides profile)
    #[arg(long, short = 's', env = "PUSHLINE_SERVER", global = true)]
    pub server: Option<String>,

    /// Bearer token (overrides profile)
    #[arg(long, env = "PUSHLINE_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "PUSHLINE_INSECURE", global = true)]
    pub insecure: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open the channel for an identity and print incoming events
    #[command(alias = "l")]
    Listen(ListenArgs),

    /// Inspect configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Identity to subscribe as
    pub identity: String,

    /// Print one JSON object per event instead of plain text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display the loaded configuration, tokens redacted
    Show,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
