//! Cluster resource operations

use async_trait::async_trait;
use serde_json::Value;

use lab_cluster::{ClusterClient, ResourceRef};

use crate::capability::ResourceClient;
use crate::Result;

#[async_trait]
impl ResourceClient for ClusterClient {
    async fn exists(&self, resource: &ResourceRef) -> Result<bool> {
        Ok(self.resources().exists(resource).await?)
    }

    async fn get(&self, resource: &ResourceRef) -> Result<Option<Value>> {
        Ok(self.resources().get(resource).await?)
    }

    async fn list(&self, resource: &ResourceRef) -> Result<Vec<Value>> {
        Ok(self.resources().list(resource).await?)
    }

    async fn delete(&self, resource: &ResourceRef) -> Result<()> {
        Ok(self.resources().delete(resource).await?)
    }

    async fn ready(&self) -> Result<()> {
        Ok(ClusterClient::ready(self).await?)
    }
}
