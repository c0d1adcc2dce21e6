//! Public API member operations.

use super::PublicApiClient;
use crate::bitwarden::http::{to_body, unwrap_data};
use crate::bitwarden::types::*;
use log::info;
use serde::Serialize;
use serde_json::Value;

fn include_flags(include_collections: bool, include_groups: bool) -> Vec<(&'static str, &'static str)> {
    let mut query = Vec::new();
    if include_collections {
        query.push(("includeCollections", "true"));
    }
    if include_groups {
        query.push(("includeGroups", "true"));
    }
    query
}

impl PublicApiClient {
    /// List organization members.
    pub async fn get_members(&self, include_collections: bool, include_groups: bool) -> Result<Value, BitwardenError> {
        let query = include_flags(include_collections, include_groups);
        Ok(unwrap_data(self.get(&["public", "members"], &query).await?))
    }

    pub async fn get_member(
        &self,
        member_id: &str,
        include_collections: bool,
        include_groups: bool,
    ) -> Result<Value, BitwardenError> {
        let query = include_flags(include_collections, include_groups);
        self.get(&["public", "members", member_id], &query).await
    }

    /// Invite one or more users by email.
    pub async fn invite_members<B: Serialize + ?Sized>(&self, body: &B) -> Result<Value, BitwardenError> {
        let response = self.post(&["public", "members", "invite"], &to_body(body)?).await?;
        info!("Invited Bitwarden organization members");
        Ok(response)
    }

    pub async fn update_member<B: Serialize + ?Sized>(
        &self,
        member_id: &str,
        body: &B,
    ) -> Result<Value, BitwardenError> {
        self.put(&["public", "members", member_id], &to_body(body)?).await
    }

    pub async fn delete_member(&self, member_id: &str) -> Result<(), BitwardenError> {
        self.delete(&["public", "members", member_id]).await?;
        info!("Removed Bitwarden member {}", member_id);
        Ok(())
    }
}
