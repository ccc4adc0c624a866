mod cli;
mod commands;
mod observability;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use descope_auth_config::loader;

use cli::{AdminUserCommands, Cli, Commands, MachineClientCommands, SecretsCommands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Best-effort .env loading; absence is not an error.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();
    observability::init_tracing_with_level("warn");

    let config = loader::load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    observability::apply_logging_level(&config.logging.level);
    tracing::debug!(project_id = %config.descope.project_id, backend = %config.secrets.backend, "configuration loaded");

    match &cli.command {
        Commands::Endpoints => commands::adapter::endpoints(&config, format)?,
        Commands::Provision(args) => {
            commands::adapter::provision(&config, &args.grantees, format).await?
        }
        Commands::AdminUser(args) => match &args.command {
            AdminUserCommands::Create(create) => {
                commands::adapter::create_admin_user(&config, create, format).await?
            }
        },
        Commands::MachineClient(args) => match &args.command {
            MachineClientCommands::Create(create) => {
                commands::adapter::create_machine_client(&config, create, format).await?
            }
            MachineClientCommands::List => {
                commands::adapter::list_machine_clients(&config, format).await?
            }
        },
        Commands::Reconcile(args) => {
            commands::adapter::reconcile(&config, &args.event, format).await?
        }
        Commands::Users(args) => commands::users::run(&config, &args.command, format).await?,
        Commands::Secrets(args) => match &args.command {
            SecretsCommands::Put { name, value } => {
                commands::secrets::put(&config, name, value.as_deref()).await?
            }
            SecretsCommands::Grant { name, grantee } => {
                commands::secrets::grant(&config, name, grantee).await?
            }
        },
    }

    Ok(())
}
