//! Tether - pluggable session management
//!
//! CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use tether::cli::config_cmd::ConfigOptions;
use tether::cli::gc::GcOptions;
use tether::cli::id::IdOptions;
use tether::cli::{ConfigCommand, GcCommand, IdCommand, ProvidersCommand};
use tether::config::sessions_dir;
use tether::error::exit_codes;
use tether::{HashFunc, ProviderRegistry};

// =============================================================================
// CLI Definition
// =============================================================================

/// Tether - pluggable session management
#[derive(Parser)]
#[command(name = "tether")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate session identifiers
    Id {
        /// Client address mixed into the signature
        #[arg(long, default_value = "127.0.0.1")]
        addr: String,
        /// Hash function (sha1 or md5)
        #[arg(long, default_value = "sha1", value_parser = parse_hash_func)]
        hash_func: HashFunc,
        /// HMAC key (random when omitted)
        #[arg(long)]
        key: Option<String>,
        /// Number of identifiers
        #[arg(long, short = 'n', default_value_t = 1)]
        count: usize,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
    },

    /// Show the effective settings for a configuration file
    Config {
        /// Configuration file (.json or .toml)
        path: PathBuf,
        /// Provider to resolve the settings for
        #[arg(long, default_value = "memory")]
        provider: String,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
    },

    /// Remove expired sessions from a file provider directory
    Gc {
        /// Session directory (defaults to ~/.tether/sessions)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Idle lifetime in seconds
        #[arg(long)]
        lifetime: i64,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
    },

    /// List registered providers
    Providers {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
    },
}

fn parse_hash_func(s: &str) -> Result<HashFunc, String> {
    HashFunc::parse(s).ok_or_else(|| format!("unknown hash function '{}'", s))
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("tether error: {}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

/// Install the log subscriber. `TETHER_LOG` takes `RUST_LOG` syntax.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("TETHER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run the CLI and return the exit code.
fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let registry = match ProviderRegistry::with_builtin() {
        Ok(registry) => registry,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("tether error: {}", e);
            return Ok(ExitCode::from(exit_codes::FATAL));
        }
    };

    match cli.command {
        Commands::Id {
            addr,
            hash_func,
            key,
            count,
            json,
        } => {
            let options = IdOptions {
                addr,
                hash_func,
                key,
                count,
            };
            let output = IdCommand::new().run(&options);
            emit(json, &output, output.format_text())?;
            Ok(success_to_exit_code(output.success))
        }
        Commands::Config {
            path,
            provider,
            json,
        } => {
            let output = ConfigCommand::new(&registry).run(&ConfigOptions { path, provider });
            emit(json, &output, output.format_text())?;
            if output.fatal {
                return Ok(ExitCode::from(exit_codes::FATAL));
            }
            Ok(success_to_exit_code(output.success))
        }
        Commands::Gc {
            dir,
            lifetime,
            json,
        } => {
            let Some(dir) = dir.or_else(sessions_dir) else {
                eprintln!("tether error: could not determine home directory, pass --dir");
                return Ok(ExitCode::from(exit_codes::ERROR));
            };
            let output = GcCommand::new().run(&GcOptions { dir, lifetime });
            emit(json, &output, output.format_text())?;
            Ok(success_to_exit_code(output.success))
        }
        Commands::Providers { json } => {
            let output = ProvidersCommand::new(&registry).run();
            emit(json, &output, output.format_text())?;
            Ok(ExitCode::from(exit_codes::OK))
        }
    }
}

// =============================================================================
// Output Helpers
// =============================================================================

fn emit<T: Serialize>(json: bool, output: &T, text: String) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(output)?);
    } else if !text.is_empty() {
        println!("{}", text);
    }
    Ok(())
}

/// Convert a success boolean to an exit code.
fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::from(exit_codes::OK)
    } else {
        ExitCode::from(exit_codes::ERROR)
    }
}
