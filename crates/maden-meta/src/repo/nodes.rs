use maden_common::keys::{node_key, NODES_PREFIX};
use maden_common::{Error, Node, ResourceKind, Result};

use super::{Repository, Versioned};

impl Repository {
    pub async fn create_node(&self, node: &Node) -> Result<()> {
        self.create_record(&node_key(&node.id), node, ResourceKind::Node, &node.id)
            .await
    }

    pub async fn get_node(&self, node_id: &str) -> Result<Versioned<Node>> {
        self.get_record(&node_key(node_id))
            .await?
            .ok_or_else(|| Error::not_found(ResourceKind::Node, node_id))
    }

    /// Nodes in key order, each with the revision it was read at.
    pub async fn list_nodes(&self) -> Result<Vec<Versioned<Node>>> {
        self.list_records(NODES_PREFIX).await
    }

    pub async fn update_node(&self, node: &Node) -> Result<()> {
        self.put_record(&node_key(&node.id), node).await
    }

    /// Write `node` only if its record is still at `revision`.
    pub async fn swap_node(&self, node: &Node, revision: u64) -> Result<bool> {
        self.swap_record(&node_key(&node.id), node, revision).await
    }

    pub async fn delete_node(&self, node_id: &str) -> Result<()> {
        self.delete_record(&node_key(node_id), ResourceKind::Node, node_id)
            .await
    }
}
