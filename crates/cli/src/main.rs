//! MakerDB CLI - Database migrations, seeding and maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! makerdb migrate
//!
//! # Seed everything from ./data
//! makerdb seed
//!
//! # Seed only designators and storage bins
//! makerdb seed --designators --storage
//!
//! # Rebuild the search index of a running server
//! makerdb reindex --api-url http://127.0.0.1:8000
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Seed reference data (companies, designators, storage, parts)
//! - `reindex` - Rebuild the server's search index

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use makerdb_server::seed::SeedOptions;

mod commands;

#[derive(Parser)]
#[command(name = "makerdb")]
#[command(author, version, about = "MakerDB CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database with reference data
    Seed(SeedArgs),
    /// Rebuild the search index of a running server
    Reindex {
        /// Base URL of the API server
        #[arg(long, env = "MAKERDB_API_URL", default_value = "http://127.0.0.1:8000")]
        api_url: String,
    },
}

#[derive(Args)]
struct SeedArgs {
    /// Seed companies from `companies.json`
    #[arg(long)]
    companies: bool,

    /// Seed reference designators from `designators.json`
    #[arg(long)]
    designators: bool,

    /// Generate the standard storage bins
    #[arg(long)]
    storage: bool,

    /// Seed parts and stock from `parts.csv`
    #[arg(long)]
    parts: bool,

    /// Seed everything (the default when nothing is selected)
    #[arg(long)]
    all: bool,

    /// Directory containing the seed files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

impl SeedArgs {
    const fn options(&self) -> SeedOptions {
        if self.all {
            return SeedOptions::all();
        }
        SeedOptions {
            companies: self.companies,
            designators: self.designators,
            storage: self.storage,
            parts: self.parts,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Seed(args) => commands::seed::run(args.options(), &args.data_dir).await,
        Commands::Reindex { api_url } => commands::reindex::run(&api_url).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_seed_flags_select_data_sets() {
        let cli = Cli::try_parse_from(["makerdb", "seed", "--parts", "--data-dir", "fixtures"])
            .expect("parse");
        let Commands::Seed(args) = cli.command else {
            panic!("expected seed command");
        };
        let options = args.options();
        assert!(options.parts);
        assert!(!options.companies);
        assert_eq!(args.data_dir, PathBuf::from("fixtures"));
    }

    #[test]
    fn test_seed_all_flag() {
        let cli = Cli::try_parse_from(["makerdb", "seed", "--all"]).expect("parse");
        let Commands::Seed(args) = cli.command else {
            panic!("expected seed command");
        };
        assert_eq!(args.options(), SeedOptions::all());
    }

    #[test]
    fn test_reindex_default_url() {
        let cli = Cli::try_parse_from(["makerdb", "reindex"]).expect("parse");
        let Commands::Reindex { api_url } = cli.command else {
            panic!("expected reindex command");
        };
        // MAKERDB_API_URL may be set in the environment.
        assert!(!api_url.is_empty());
    }
}
