use clap::{Parser, Subcommand};
use colored::Colorize;

use etuhinta::config::{StaticConfig, get_config, init_config, set_config};
use etuhinta::errors::EtuhintaError;
use etuhinta::runtime::run_server;
use etuhinta::system::init_logging;

/// Etuhinta - deals marketplace backend
#[derive(Parser)]
#[command(name = "etuhinta")]
#[command(version)]
#[command(about = "Offer analytics and AI offer-search chat backend", long_about = None)]
struct Cli {
    /// Configuration file (default: config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Generate example configuration file
    GenerateConfig {
        /// Output path (default: stdout)
        output_path: Option<String>,
    },
}

fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<EtuhintaError>() {
        Some(e) => eprintln!("{}", e.format_colored()),
        None => eprintln!("{} {:#}", "[ERROR]".red().bold(), err),
    }
}

fn generate_config(output_path: Option<String>) -> anyhow::Result<()> {
    match output_path {
        Some(path) => {
            StaticConfig::default()
                .save_to_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path, e))?;
            println!("{} {}", "Configuration written to".green(), path);
        }
        None => println!("{}", StaticConfig::generate_sample_config()),
    }
    Ok(())
}

async fn serve() -> anyhow::Result<()> {
    let config = get_config();
    let _guard = init_logging(&config.logging)?;
    run_server().await
}

#[actix_web::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match &cli.config {
        Some(path) => set_config(StaticConfig::load_from(path)),
        None => init_config(),
    }

    let result = match cli.command {
        Some(Commands::GenerateConfig { output_path }) => generate_config(output_path),
        Some(Commands::Serve) | None => serve().await,
    };

    if let Err(e) = result {
        report_error(&e);
        std::process::exit(1);
    }
}
