use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "pgsdk",
    about = "Generate a typed HTTP API server and client SDK from a live PostgreSQL database",
    version,
    after_help = "Examples:\n  pgsdk generate --db postgres://localhost/myapp --out generated\n  pgsdk generate --depth 4 --soft-delete deleted_at\n  pgsdk introspect --db postgres://localhost/myapp\n  pgsdk graph --db postgres://localhost/myapp --format mermaid\n  pgsdk pull --url http://localhost:3000 --out sdk"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Introspect the database and emit the API server and client SDK
    Generate(GenerateArgs),

    /// Introspect a database schema and display the model
    Introspect(IntrospectArgs),

    /// Visualize the foreign-key graph
    Graph(GraphArgs),

    /// Pull the client SDK from a running generated server
    Pull(PullArgs),
}

#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Database connection URL (postgres://)
    /// Falls back to DATABASE_URL env var or .env file
    #[arg(long, env = "DATABASE_URL")]
    pub db: Option<String>,

    /// Schema name to introspect (default: public)
    #[arg(long)]
    pub schema: Option<String>,

    /// Output directory (client SDK lands under its sdk/ subdirectory)
    #[arg(short, long)]
    pub out: Option<String>,

    /// Maximum include depth for relation hydration
    #[arg(long)]
    pub depth: Option<usize>,

    /// Soft-delete column; tables carrying it get soft deletes
    #[arg(long)]
    pub soft_delete: Option<String>,

    /// Pin the contract timestamp (RFC 3339) for reproducible output
    #[arg(long)]
    pub generated_at: Option<String>,

    /// Directory containing pgsdk.toml (default: current directory)
    #[arg(long)]
    pub config_dir: Option<String>,
}

#[derive(Parser, Debug)]
pub struct IntrospectArgs {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub db: Option<String>,

    /// Schema name to introspect
    #[arg(long)]
    pub schema: Option<String>,

    /// Output format
    #[arg(long, default_value = "table")]
    pub format: IntrospectFormat,
}

#[derive(Parser, Debug)]
pub struct GraphArgs {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub db: Option<String>,

    /// Schema name
    #[arg(long)]
    pub schema: Option<String>,

    /// Output format for the graph
    #[arg(long, default_value = "mermaid")]
    pub format: GraphFormat,
}

#[derive(Parser, Debug)]
pub struct PullArgs {
    /// Base URL of a running generated server
    #[arg(long)]
    pub url: String,

    /// Bearer token for protected pull endpoints
    #[arg(long, env = "PGSDK_PULL_TOKEN")]
    pub token: Option<String>,

    /// Directory to materialize the SDK into
    #[arg(short, long, default_value = "sdk")]
    pub out: String,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum IntrospectFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum GraphFormat {
    Mermaid,
    Dot,
}
