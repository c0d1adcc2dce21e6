//! Public API collection operations.

use super::PublicApiClient;
use crate::bitwarden::http::{to_body, unwrap_data};
use crate::bitwarden::types::*;
use log::info;
use serde::Serialize;
use serde_json::Value;

impl PublicApiClient {
    pub async fn get_collections(&self) -> Result<Value, BitwardenError> {
        Ok(unwrap_data(self.get(&["public", "collections"], &[]).await?))
    }

    pub async fn get_collection(&self, collection_id: &str) -> Result<Value, BitwardenError> {
        self.get(&["public", "collections", collection_id], &[]).await
    }

    pub async fn create_collection<B: Serialize + ?Sized>(&self, body: &B) -> Result<Value, BitwardenError> {
        self.post(&["public", "collections"], &to_body(body)?).await
    }

    pub async fn update_collection<B: Serialize + ?Sized>(
        &self,
        collection_id: &str,
        body: &B,
    ) -> Result<Value, BitwardenError> {
        self.put(&["public", "collections", collection_id], &to_body(body)?).await
    }

    pub async fn delete_collection(&self, collection_id: &str) -> Result<(), BitwardenError> {
        self.delete(&["public", "collections", collection_id]).await?;
        info!("Deleted Bitwarden collection {}", collection_id);
        Ok(())
    }
}
