use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bwo")]
#[command(about = "Manage Bitwarden organization groups, members and collections, and a local `bw serve` vault")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON config file (camelCase keys). Without it, BITWARDEN_* env vars are used
    #[arg(short, long, global = true, env = "BWO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a valid Public API bearer token, requesting one if needed
    Token,
    /// Public API groups
    #[command(subcommand)]
    Groups(GroupCommands),
    /// Public API members
    #[command(subcommand)]
    Members(MemberCommands),
    /// Public API collections
    #[command(subcommand)]
    Collections(CollectionCommands),
    /// Vault Management API (`bw serve`)
    #[command(subcommand)]
    Vault(VaultCommands),
}

#[derive(Args)]
pub struct IdArg {
    /// Resource id
    pub id: String,
}

#[derive(Args)]
pub struct BodyArg {
    /// JSON request body
    pub body: String,
}

#[derive(Args)]
pub struct IdBodyArgs {
    /// Resource id
    pub id: String,
    /// JSON request body
    pub body: String,
}

#[derive(Subcommand)]
pub enum GroupCommands {
    /// List groups
    List,
    /// List groups with collection access details
    Details,
    /// Get one group
    Get(IdArg),
    /// Create a group
    Create(BodyArg),
    /// Update a group
    Update(IdBodyArgs),
    /// Delete a group
    Delete(IdArg),
    /// List member ids of a group
    Users(IdArg),
    /// Replace the members of a group
    SetUsers(SetUsersArgs),
}

#[derive(Args)]
pub struct SetUsersArgs {
    /// Group id
    pub id: String,
    /// Member ids
    pub user_ids: Vec<String>,
}

#[derive(Args)]
pub struct IncludeArgs {
    /// Include collection access
    #[arg(long)]
    pub collections: bool,
    /// Include group membership
    #[arg(long)]
    pub groups: bool,
}

#[derive(Subcommand)]
pub enum MemberCommands {
    /// List members
    List(IncludeArgs),
    /// Get one member
    Get {
        id: String,
        #[command(flatten)]
        include: IncludeArgs,
    },
    /// Invite members by email
    Invite(BodyArg),
    /// Update a member
    Update(IdBodyArgs),
    /// Remove a member
    Delete(IdArg),
}

#[derive(Subcommand)]
pub enum CollectionCommands {
    /// List collections
    List,
    /// Get one collection
    Get(IdArg),
    /// Create a collection
    Create(BodyArg),
    /// Update a collection
    Update(IdBodyArgs),
    /// Delete a collection
    Delete(IdArg),
}

#[derive(Args)]
pub struct OrgArg {
    /// Organization id (defaults to the client id without `organization.`)
    #[arg(long)]
    pub org: Option<String>,
}

#[derive(Subcommand)]
pub enum VaultCommands {
    /// Vault server status
    Status,
    /// Pull the latest vault data
    Sync,
    /// Lock the vault
    Lock,
    /// Unlock the vault
    Unlock {
        /// Master password (defaults to BITWARDEN_VAULT_API_PASSWORD)
        #[arg(long, env = "BWO_VAULT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// List collections visible to the vault
    Collections,
    /// List organization collections
    OrgCollections(OrgArg),
    /// Get an organization collection
    Collection {
        id: String,
        #[command(flatten)]
        org: OrgArg,
    },
    /// Create an organization collection
    CreateCollection {
        body: String,
        #[command(flatten)]
        org: OrgArg,
    },
    /// Update an organization collection
    UpdateCollection {
        id: String,
        body: String,
        #[command(flatten)]
        org: OrgArg,
    },
    /// Delete an organization collection
    DeleteCollection {
        id: String,
        #[command(flatten)]
        org: OrgArg,
    },
    /// List organization members
    Members(OrgArg),
    /// Confirm an accepted member
    Confirm {
        member_id: String,
        #[command(flatten)]
        org: OrgArg,
    },
}
