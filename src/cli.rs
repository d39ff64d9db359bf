use clap::{Parser, Subcommand};

/// Tangle - incremental execution for annotated documents
///
/// Runs the executable fragments of a markdown document, caches every
/// fragment's outcome, and splices results back into the rendered output.
#[derive(Parser, Debug)]
#[command(name = "tangle")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Incremental execution and caching for annotated documents", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Configuration arguments shared across commands
#[derive(Parser, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Config file path
    #[arg(short = 'c', long, env = "TANGLE_CONFIG")]
    pub config: Option<String>,

    /// Result cache directory
    #[arg(long, env = "TANGLE_CACHE_DIR")]
    pub cache_dir: Option<String>,

    /// Keep the result cache in memory only
    #[arg(long)]
    pub no_persist: bool,

    /// Cache key policy (chained|positional)
    #[arg(long, env = "TANGLE_KEY_POLICY")]
    pub key_policy: Option<String>,

    /// Artifact store directory
    #[arg(long, env = "TANGLE_STORE")]
    pub store: Option<String>,

    /// Public URL prefix for stored artifacts
    #[arg(long, env = "TANGLE_BASE_URL")]
    pub base_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a document, executing its fragments
    Render(RenderArgs),

    /// Inspect and manage the result cache
    Cache(CacheArgs),
}

#[derive(Parser, Debug)]
pub struct RenderArgs {
    /// Markdown document to render
    #[arg(short, long)]
    pub markdown: String,

    /// Output file, or an existing directory to write into
    #[arg(short, long)]
    pub output: String,

    /// Re-render whenever the document is saved
    #[arg(short, long)]
    pub watch: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show which blocks of a document are cached
    Status {
        /// Markdown document
        markdown: String,

        /// Show full keys
        #[arg(short, long)]
        verbose: bool,
    },

    /// Remove cached results
    Clean {
        /// Remove every cached result
        #[arg(long)]
        all: bool,
    },

    /// List all cached results
    List {
        /// Show detailed information
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show cache and artifact store statistics
    Stats,
}
