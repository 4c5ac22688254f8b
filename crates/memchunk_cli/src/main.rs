//! memchunk CLI
//!
//! Command-line tools for inspecting how memchunk lays data out in a
//! memcache pool.
//!
//! # Commands
//!
//! - `key` - Show the physical, chunk and lock keys for a logical key
//! - `flags` - Decode or encode a flags integer
//! - `simulate` - Round-trip a value through an in-memory pool

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use memchunk_core::BackendKind;
use tracing_subscriber::EnvFilter;

/// memchunk debugging tools.
#[derive(Parser)]
#[command(name = "memchunk")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Backend routing behavior.
#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// The backend hashes and prefixes keys itself
    SelfHashing,
    /// Keys are pre-hashed by the client
    ExternalHashing,
}

impl From<Backend> for BackendKind {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::SelfHashing => Self::SelfHashing,
            Backend::ExternalHashing => Self::ExternalHashing,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the physical keys derived from a logical key
    Key {
        /// Logical key
        key: String,

        /// Backend routing behavior
        #[arg(short, long, value_enum, default_value = "external-hashing")]
        backend: Backend,

        /// Key namespace prefix
        #[arg(short, long, default_value = "")]
        prefix: String,

        /// Number of chunks to list
        #[arg(short, long, default_value = "1")]
        chunks: u32,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decode or encode a flags integer
    Flags {
        #[command(subcommand)]
        action: FlagsAction,
    },

    /// Round-trip a value through an in-memory pool
    Simulate {
        /// Serialized value size in bytes
        #[arg(short, long)]
        size: usize,

        /// Largest number of bytes per physical key
        #[arg(short, long, default_value = "1000000")]
        max_chunk_size: usize,

        /// Number of simulated servers
        #[arg(long, default_value = "1")]
        servers: u16,

        /// Backend routing behavior
        #[arg(short, long, value_enum, default_value = "external-hashing")]
        backend: Backend,

        /// Refuse values larger than one chunk
        #[arg(long)]
        no_large_items: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum FlagsAction {
    /// Decode a flags integer
    Decode {
        /// Flags value as stored
        value: u32,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Encode chunk metadata into a flags integer
    Encode {
        /// Number of additional chunks
        #[arg(short, long)]
        parts: Option<u32>,

        /// Set the compression bit
        #[arg(short, long)]
        compressed: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Key {
            key,
            backend,
            prefix,
            chunks,
            format,
        } => {
            commands::key::run(&key, backend.into(), &prefix, chunks, &format)?;
        }
        Commands::Flags { action } => match action {
            FlagsAction::Decode { value, format } => commands::flags::decode(value, &format)?,
            FlagsAction::Encode { parts, compressed } => {
                commands::flags::encode(compressed, parts)?;
            }
        },
        Commands::Simulate {
            size,
            max_chunk_size,
            servers,
            backend,
            no_large_items,
            format,
        } => {
            let options = commands::simulate::Options {
                size,
                max_chunk_size,
                servers,
                backend: backend.into(),
                large_items: !no_large_items,
            };
            commands::simulate::run(&options, &format)?;
        }
        Commands::Version => {
            println!("memchunk CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("memchunk Core v{}", memchunk_core::VERSION);
        }
    }

    Ok(())
}
