use anyhow::Result;
use colored::Colorize;
use descope_auth_config::AppConfig;
use descope_auth_provisioning::{NewUser, UserChanges};

use super::connect_management;
use crate::cli::{OutputFormat, UsersCommands};
use crate::output::{print_success, print_value};

pub async fn run(config: &AppConfig, command: &UsersCommands, format: OutputFormat) -> Result<()> {
    let users = connect_management(config).await?.users();

    match command {
        UsersCommands::List { limit, page } => {
            let found = users.list(*limit, *page).await?;
            print_value(&found, format)?;
        }
        UsersCommands::Get { login_id } => {
            print_value(&users.get(login_id).await?, format)?;
        }
        UsersCommands::Create(args) => {
            let created = users
                .create(&NewUser {
                    login_id: args.login_id.clone(),
                    email: args.email.clone(),
                    display_name: args.display_name.clone(),
                    role: args.role.clone(),
                })
                .await?;
            print_success(&format!("Created user {}", args.login_id.cyan()));
            print_value(&created, format)?;
        }
        UsersCommands::Update(args) => {
            let changes = UserChanges {
                email: args.email.clone(),
                display_name: args.display_name.clone(),
            };
            let updated = users.update(&args.login_id, &changes).await?;
            print_success(&format!("Updated user {}", args.login_id.cyan()));
            print_value(&updated, format)?;
        }
        UsersCommands::Enable { login_id } => {
            let user = users.enable(login_id).await?;
            print_success(&format!("Enabled user {}", login_id.cyan()));
            print_value(&user, format)?;
        }
        UsersCommands::Disable { login_id } => {
            let user = users.disable(login_id).await?;
            print_success(&format!("Disabled user {}", login_id.cyan()));
            print_value(&user, format)?;
        }
        UsersCommands::Delete { login_id } => {
            if users.delete(login_id).await? {
                print_success(&format!("Deleted user {}", login_id.cyan()));
            } else {
                println!("{} {} did not exist", "-".yellow(), login_id.cyan());
            }
        }
    }
    Ok(())
}
