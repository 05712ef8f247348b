//! CLI argument definitions for agentscan.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `list` | List agents across every configured chain |
//! | `get` | Look up one agent by `chainId:tokenId` |
//! | `chains` | Show configured chains |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--log-json` | `false` | Emit logs on stderr as JSON lines |
//!
//! Configuration comes from `AGENTSCAN_*` environment variables.
//!
//! # Examples
//!
//! ```bash
//! agentscan list --mcp true --limit 10 --pretty
//! agentscan list --chain 11155111 --sort name --order asc --cursor 20
//! agentscan get 84532:17
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};

use agentscan_core::{SortField, SortOrder};

/// Multi-chain AI agent registry explorer.
#[derive(Debug, Parser)]
#[command(
    name = "agentscan",
    author,
    version,
    about = "Browse AI agents registered across chain subgraphs"
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List agents matching the given filters.
    ///
    /// # Examples
    ///
    ///   agentscan list
    ///   agentscan list --mcp true --a2a true --limit 50
    ///   agentscan list --offset 40 --limit 20 --sort name --order asc
    List(ListArgs),

    /// Fetch a single agent by `chainId:tokenId`.
    Get(GetArgs),

    /// Show the chains this process is configured to query.
    Chains,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Restrict to these chain ids. Repeatable; defaults to every configured chain.
    #[arg(long = "chain")]
    pub chains: Vec<String>,

    #[arg(long)]
    pub mcp: Option<bool>,

    #[arg(long)]
    pub a2a: Option<bool>,

    #[arg(long)]
    pub x402: Option<bool>,

    #[arg(long)]
    pub active: Option<bool>,

    /// Owner address (case-insensitive).
    #[arg(long)]
    pub owner: Option<String>,

    /// Case-insensitive substring of the agent name.
    #[arg(long)]
    pub name: Option<String>,

    /// Required OASF skill. Repeatable.
    #[arg(long = "skill")]
    pub skills: Vec<String>,

    /// Required OASF domain. Repeatable.
    #[arg(long = "domain")]
    pub domains: Vec<String>,

    #[arg(long, value_enum, default_value_t = SortArg::CreatedAt)]
    pub sort: SortArg,

    #[arg(long, value_enum, default_value_t = OrderArg::Desc)]
    pub order: OrderArg,

    /// Page size; the configured default applies when omitted.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Absolute offset. Takes precedence over `--cursor`.
    #[arg(long)]
    pub offset: Option<usize>,

    /// Cursor from a previous page's `next_cursor`.
    #[arg(long)]
    pub cursor: Option<String>,

    #[command(flatten)]
    pub cache: CacheArgs,
}

#[derive(Debug, Args)]
#[group(multiple = false)]
pub struct CacheArgs {
    /// Skip the cached listing and store a fresh one.
    #[arg(long, default_value_t = false)]
    pub refresh: bool,

    /// Neither read nor write the cache.
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Agent identity, e.g. `11155111:42`.
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    CreatedAt,
    UpdatedAt,
    Name,
    ChainId,
    TokenId,
}

impl From<SortArg> for SortField {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::CreatedAt => Self::CreatedAt,
            SortArg::UpdatedAt => Self::UpdatedAt,
            SortArg::Name => Self::Name,
            SortArg::ChainId => Self::ChainId,
            SortArg::TokenId => Self::TokenId,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderArg {
    Asc,
    Desc,
}

impl From<OrderArg> for SortOrder {
    fn from(value: OrderArg) -> Self {
        match value {
            OrderArg::Asc => Self::Asc,
            OrderArg::Desc => Self::Desc,
        }
    }
}
