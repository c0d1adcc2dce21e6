//! Subcommand dispatch. Every command prints its JSON result to stdout.

use crate::cli::*;
use bwo_bitwarden::bitwarden::{BitwardenError, BitwardenService};
use serde_json::{json, Value};

fn parse_body(raw: &str) -> Result<Value, BitwardenError> {
    serde_json::from_str(raw).map_err(|e| BitwardenError::invalid_input(format!("Invalid JSON body: {}", e)))
}

fn deleted(id: &str) -> Value {
    json!({ "success": true, "id": id })
}

/// Whether `command` talks to the Public API and so needs the persistent
/// token store. Vault commands are unauthenticated.
pub fn uses_token_store(command: &Commands) -> bool {
    !matches!(command, Commands::Vault(_))
}

pub async fn run(service: &BitwardenService, command: Commands) -> Result<Value, BitwardenError> {
    match command {
        Commands::Token => {
            let token = service.tokens().get_token().await?;
            Ok(json!({ "accessToken": token }))
        }
        Commands::Groups(cmd) => groups(service, cmd).await,
        Commands::Members(cmd) => members(service, cmd).await,
        Commands::Collections(cmd) => collections(service, cmd).await,
        Commands::Vault(cmd) => vault(service, cmd).await,
    }
}

async fn groups(service: &BitwardenService, cmd: GroupCommands) -> Result<Value, BitwardenError> {
    let api = service.public_api();
    match cmd {
        GroupCommands::List => api.get_groups().await,
        GroupCommands::Details => api.get_groups_with_details().await,
        GroupCommands::Get(a) => api.get_group(&a.id).await,
        GroupCommands::Create(a) => api.create_group(&parse_body(&a.body)?).await,
        GroupCommands::Update(a) => api.update_group(&a.id, &parse_body(&a.body)?).await,
        GroupCommands::Delete(a) => {
            api.delete_group(&a.id).await?;
            Ok(deleted(&a.id))
        }
        GroupCommands::Users(a) => api.get_group_users(&a.id).await,
        GroupCommands::SetUsers(a) => api.update_group_users(&a.id, &a.user_ids).await,
    }
}

async fn members(service: &BitwardenService, cmd: MemberCommands) -> Result<Value, BitwardenError> {
    let api = service.public_api();
    match cmd {
        MemberCommands::List(inc) => api.get_members(inc.collections, inc.groups).await,
        MemberCommands::Get { id, include } => api.get_member(&id, include.collections, include.groups).await,
        MemberCommands::Invite(a) => api.invite_members(&parse_body(&a.body)?).await,
        MemberCommands::Update(a) => api.update_member(&a.id, &parse_body(&a.body)?).await,
        MemberCommands::Delete(a) => {
            api.delete_member(&a.id).await?;
            Ok(deleted(&a.id))
        }
    }
}

async fn collections(service: &BitwardenService, cmd: CollectionCommands) -> Result<Value, BitwardenError> {
    let api = service.public_api();
    match cmd {
        CollectionCommands::List => api.get_collections().await,
        CollectionCommands::Get(a) => api.get_collection(&a.id).await,
        CollectionCommands::Create(a) => api.create_collection(&parse_body(&a.body)?).await,
        CollectionCommands::Update(a) => api.update_collection(&a.id, &parse_body(&a.body)?).await,
        CollectionCommands::Delete(a) => {
            api.delete_collection(&a.id).await?;
            Ok(deleted(&a.id))
        }
    }
}

async fn vault(service: &BitwardenService, cmd: VaultCommands) -> Result<Value, BitwardenError> {
    let api = service.vault_api();
    match cmd {
        VaultCommands::Status => api.status().await,
        VaultCommands::Sync => api.sync().await,
        VaultCommands::Lock => api.lock().await,
        VaultCommands::Unlock { password } => api.unlock(password.as_deref()).await,
        VaultCommands::Collections => api.list_collections().await,
        VaultCommands::OrgCollections(o) => api.list_org_collections(o.org.as_deref()).await,
        VaultCommands::Collection { id, org } => api.get_collection(&id, org.org.as_deref()).await,
        VaultCommands::CreateCollection { body, org } => {
            api.create_collection(&parse_body(&body)?, org.org.as_deref()).await
        }
        VaultCommands::UpdateCollection { id, body, org } => {
            api.update_collection(&id, &parse_body(&body)?, org.org.as_deref()).await
        }
        VaultCommands::DeleteCollection { id, org } => {
            api.delete_collection(&id, org.org.as_deref()).await?;
            Ok(deleted(&id))
        }
        VaultCommands::Members(o) => api.list_members(o.org.as_deref()).await,
        VaultCommands::Confirm { member_id, org } => api.confirm_member(&member_id, org.org.as_deref()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_json_body_is_invalid_input() {
        let err = parse_body("{not json").unwrap_err();
        assert_eq!(err.kind, bwo_bitwarden::bitwarden::BitwardenErrorKind::InvalidInput);
        assert_eq!(parse_body(r#"{"name":"Ops"}"#).unwrap()["name"], "Ops");
    }

    #[test]
    fn only_public_api_commands_open_the_token_store() {
        assert!(uses_token_store(&Commands::Token));
        assert!(uses_token_store(&Commands::Groups(GroupCommands::List)));
        assert!(!uses_token_store(&Commands::Vault(VaultCommands::Status)));
        assert!(!uses_token_store(&Commands::Vault(VaultCommands::Members(OrgArg { org: None }))));
    }

    #[tokio::test]
    async fn vault_status_without_url_reports_config_error() {
        let config = bwo_bitwarden::bitwarden::BitwardenConfig::default();
        let store = std::sync::Arc::new(bwo_bitwarden::bitwarden::MemoryTokenStore::new());
        let service = BitwardenService::new(config, store).unwrap();
        let err = run(&service, Commands::Vault(VaultCommands::Status)).await.unwrap_err();
        assert_eq!(err.kind, bwo_bitwarden::bitwarden::BitwardenErrorKind::InvalidConfig);
    }
}
