use clap::{Parser, Subcommand};
use colored::Colorize;

use smartlinker::config::{DEFAULT_CONFIG_PATH, StaticConfig, get_config, init_config_from};
use smartlinker::errors::SmartlinkError;
use smartlinker::runtime::modes::run_server;
use smartlinker::system::init_logging;

#[derive(Parser, Debug)]
#[command(name = "smartlinker", version, about = "SmartLink service for music releases")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Write a sample configuration file with every default
    GenerateConfig {
        #[arg(short, long, default_value = "config.example.toml")]
        output: String,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn generate_config(output: &str, force: bool) -> anyhow::Result<()> {
    if std::path::Path::new(output).exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", output);
    }
    StaticConfig::default().save_to_file(output)?;
    println!("{} Sample configuration written to {}", "✓".green(), output);
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::GenerateConfig { output, force } => generate_config(&output, force),
        Command::Serve => {
            init_config_from(&cli.config);
            let config = get_config();

            // guard 必须存活到进程结束
            let _guard = init_logging(&config.logging)?;

            if let Err(e) = run_server().await {
                match e.downcast_ref::<SmartlinkError>() {
                    Some(err) => eprintln!("{}", err.format_colored()),
                    None => eprintln!("{} {:#}", "[ERROR]".red().bold(), e),
                }
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
