use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "descope-auth")]
#[command(about = "Provision Descope credentials for a control plane")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ./descope-auth.toml when present)
    #[arg(short, long, global = true, env = "DESCOPE_AUTH_CONFIG")]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve and print the published endpoints (no network calls)
    Endpoints,
    /// Construct the adapter: provision or replay the default machine client
    Provision(ProvisionArgs),
    /// Manage additional admin users
    AdminUser(AdminUserArgs),
    /// Manage machine clients
    MachineClient(MachineClientArgs),
    /// Handle one lifecycle event and print the response
    Reconcile(ReconcileArgs),
    /// Day-2 user management
    Users(UsersArgs),
    /// Manage the encrypted secret file
    Secrets(SecretsArgs),
}

#[derive(clap::Args)]
pub struct ProvisionArgs {
    /// Identity allowed to read the machine client secret (repeatable)
    #[arg(long = "grant")]
    pub grantees: Vec<String>,
}

#[derive(clap::Args)]
pub struct AdminUserArgs {
    #[command(subcommand)]
    pub command: AdminUserCommands,
}

#[derive(Subcommand)]
pub enum AdminUserCommands {
    /// Create an admin user as a managed resource
    Create(AdminUserCreateArgs),
}

#[derive(clap::Args)]
pub struct AdminUserCreateArgs {
    /// Resource id; the logical id becomes AdminUser-<id>
    pub id: String,
    /// Login id of the user
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub role: Option<String>,
    #[arg(long)]
    pub display_name: Option<String>,
}

#[derive(clap::Args)]
pub struct MachineClientArgs {
    #[command(subcommand)]
    pub command: MachineClientCommands,
}

#[derive(Subcommand)]
pub enum MachineClientCommands {
    /// Create a machine client as a managed resource
    Create(MachineClientCreateArgs),
    /// List access keys in the project
    List,
}

#[derive(clap::Args)]
pub struct MachineClientCreateArgs {
    /// Resource id; the logical id becomes MachineClient-<id>
    pub id: String,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(clap::Args)]
pub struct ReconcileArgs {
    /// Path to the event JSON, or '-' for stdin
    #[arg(long)]
    pub event: String,
}

#[derive(clap::Args)]
pub struct UsersArgs {
    #[command(subcommand)]
    pub command: UsersCommands,
}

#[derive(Subcommand)]
pub enum UsersCommands {
    /// List users
    List {
        /// Page size (default 10)
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        page: u32,
    },
    /// Show one user
    Get { login_id: String },
    /// Create a user
    Create(UserCreateArgs),
    /// Change email and/or display name
    Update(UserUpdateArgs),
    /// Enable a user
    Enable { login_id: String },
    /// Disable a user
    Disable { login_id: String },
    /// Delete a user
    Delete { login_id: String },
}

#[derive(clap::Args)]
pub struct UserCreateArgs {
    pub login_id: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub display_name: Option<String>,
    #[arg(long)]
    pub role: Option<String>,
}

#[derive(clap::Args)]
pub struct UserUpdateArgs {
    pub login_id: String,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub display_name: Option<String>,
}

#[derive(clap::Args)]
pub struct SecretsArgs {
    #[command(subcommand)]
    pub command: SecretsCommands,
}

#[derive(Subcommand)]
pub enum SecretsCommands {
    /// Store a secret (reads the value from stdin if --value is omitted)
    Put {
        name: String,
        #[arg(long)]
        value: Option<String>,
    },
    /// Grant an identity read access to a secret
    Grant { name: String, grantee: String },
}
