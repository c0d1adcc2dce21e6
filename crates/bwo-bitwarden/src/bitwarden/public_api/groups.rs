//! Public API group operations.

use super::PublicApiClient;
use crate::bitwarden::http::{to_body, unwrap_data};
use crate::bitwarden::types::*;
use log::{debug, info};
use serde::Serialize;
use serde_json::{json, Value};

impl PublicApiClient {
    /// List all groups.
    pub async fn get_groups(&self) -> Result<Value, BitwardenError> {
        Ok(unwrap_data(self.get(&["public", "groups"], &[]).await?))
    }

    /// List all groups including collection access details.
    pub async fn get_groups_with_details(&self) -> Result<Value, BitwardenError> {
        self.get(&["public", "groups", "details"], &[]).await
    }

    pub async fn get_group(&self, group_id: &str) -> Result<Value, BitwardenError> {
        self.get(&["public", "groups", group_id], &[]).await
    }

    pub async fn create_group<B: Serialize + ?Sized>(&self, body: &B) -> Result<Value, BitwardenError> {
        let group = self.post(&["public", "groups"], &to_body(body)?).await?;
        info!("Created Bitwarden group {}", group.get("id").and_then(Value::as_str).unwrap_or("?"));
        Ok(group)
    }

    pub async fn update_group<B: Serialize + ?Sized>(
        &self,
        group_id: &str,
        body: &B,
    ) -> Result<Value, BitwardenError> {
        self.put(&["public", "groups", group_id], &to_body(body)?).await
    }

    pub async fn delete_group(&self, group_id: &str) -> Result<(), BitwardenError> {
        self.delete(&["public", "groups", group_id]).await?;
        info!("Deleted Bitwarden group {}", group_id);
        Ok(())
    }

    /// Member ids belonging to a group.
    pub async fn get_group_users(&self, group_id: &str) -> Result<Value, BitwardenError> {
        self.get(&["public", "groups", group_id, "users"], &[]).await
    }

    /// Replace the members of a group.
    pub async fn update_group_users(&self, group_id: &str, user_ids: &[String]) -> Result<Value, BitwardenError> {
        let payload = match self.settings.config().group_users_body {
            GroupUsersBody::Array => json!(user_ids),
            GroupUsersBody::Object => json!({ "userIds": user_ids }),
        };
        debug!("Bitwarden group {} users payload: {}", group_id, payload);

        let response = self.put(&["public", "groups", group_id, "users"], &payload).await?;
        debug!("Bitwarden group {} users response: {}", group_id, response);
        Ok(response)
    }
}
