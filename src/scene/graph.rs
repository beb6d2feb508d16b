//! Scene graph — CPU-side hierarchy of nodes.
//!
//! The graph organizes the displayed avatar into parent/child
//! relationships under a permanent root. `flatten()` walks the tree,
//! propagates world transforms, and produces the flat draw list.
//! `remove_subtree()` hands the removed nodes back to the caller, which
//! is how the disposal sequence gets exactly one traversal over
//! everything that just left the graph.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Mat4;

use super::node::{LocalTransform, NodeContent, SceneNode, SceneNodeId};
use crate::scene::resources::{GpuGeometry, GpuMaterial};

/// One visible mesh after flattening, ready to draw
pub struct DrawEntry {
    pub geometry: Arc<GpuGeometry>,
    pub material: Arc<GpuMaterial>,
    pub world_transform: Mat4,
}

/// CPU-side scene graph with a permanent root Group node.
pub struct SceneGraph {
    nodes: HashMap<SceneNodeId, SceneNode>,
    root: SceneNodeId,
    next_id: u64,
    dirty: bool,
}

impl SceneGraph {
    /// Create a new scene graph with a root Group node.
    pub fn new() -> Self {
        let root_id = SceneNodeId(0);
        let root_node = SceneNode::new(root_id, "root", NodeContent::Group);

        let mut nodes = HashMap::new();
        nodes.insert(root_id, root_node);

        Self {
            nodes,
            root: root_id,
            next_id: 1,
            dirty: true,
        }
    }

    /// Get the root node ID.
    pub fn root(&self) -> SceneNodeId {
        self.root
    }

    fn alloc_id(&mut self) -> SceneNodeId {
        let id = SceneNodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a child node under `parent`. Returns the new node's ID.
    pub fn add_child(
        &mut self,
        parent: SceneNodeId,
        name: impl Into<String>,
        content: NodeContent,
    ) -> SceneNodeId {
        let id = self.alloc_id();
        let mut node = SceneNode::new(id, name, content);
        node.parent = Some(parent);

        self.nodes.insert(id, node);

        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(id);
        }

        self.dirty = true;
        id
    }

    /// Remove a node and its entire subtree, returning the removed nodes.
    ///
    /// The node is detached from its parent before anything else, so no
    /// traversal that starts at the root can reach the subtree once this
    /// returns. The root itself is not removable; asking for it returns
    /// an empty vec and changes nothing.
    pub fn remove_subtree(&mut self, id: SceneNodeId) -> Vec<SceneNode> {
        if id == self.root || !self.nodes.contains_key(&id) {
            return Vec::new();
        }

        // Detach from parent first.
        if let Some(parent_id) = self.nodes.get(&id).and_then(|n| n.parent) {
            if let Some(parent) = self.nodes.get_mut(&parent_id) {
                parent.children.retain(|c| *c != id);
            }
        }

        // Collect subtree IDs (BFS).
        let mut to_remove = vec![id];
        let mut i = 0;
        while i < to_remove.len() {
            let current = to_remove[i];
            if let Some(node) = self.nodes.get(&current) {
                to_remove.extend_from_slice(&node.children);
            }
            i += 1;
        }

        let mut removed = Vec::with_capacity(to_remove.len());
        for nid in to_remove {
            if let Some(node) = self.nodes.remove(&nid) {
                removed.push(node);
            }
        }

        self.dirty = true;
        removed
    }

    /// Set the local transform of a node.
    pub fn set_transform(&mut self, id: SceneNodeId, transform: LocalTransform) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.local_transform = transform;
            self.dirty = true;
        }
    }

    /// Set the visibility of a node.
    pub fn set_visible(&mut self, id: SceneNodeId, visible: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.visible = visible;
            self.dirty = true;
        }
    }

    /// Get an immutable reference to a node.
    pub fn get(&self, id: SceneNodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    /// Iterate over the children of a node.
    pub fn children(&self, id: SceneNodeId) -> impl Iterator<Item = SceneNodeId> + '_ {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .copied()
    }

    /// Total number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Walk the tree, propagate transforms, and collect all visible meshes.
    pub fn flatten(&mut self) -> Vec<DrawEntry> {
        self.propagate_transforms(self.root, Mat4::IDENTITY);

        let mut out = Vec::new();
        self.collect_visible(self.root, &mut out);
        self.dirty = false;
        out
    }

    /// Recursively propagate world transforms.
    fn propagate_transforms(&mut self, node_id: SceneNodeId, parent_world: Mat4) {
        let (local_mat, children) = {
            let node = match self.nodes.get(&node_id) {
                Some(n) => n,
                None => return,
            };
            (node.local_transform.to_mat4(), node.children.clone())
        };

        let world = parent_world * local_mat;

        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.world_transform = world;
        }

        for child_id in children {
            self.propagate_transforms(child_id, world);
        }
    }

    /// Recursively collect visible draw entries.
    fn collect_visible(&self, node_id: SceneNodeId, out: &mut Vec<DrawEntry>) {
        let node = match self.nodes.get(&node_id) {
            Some(n) => n,
            None => return,
        };

        if !node.visible {
            return;
        }

        match &node.content {
            NodeContent::Group => {}
            NodeContent::Mesh { geometry, material } => {
                out.push(DrawEntry {
                    geometry: geometry.clone(),
                    material: material.clone(),
                    world_transform: node.world_transform,
                });
            }
        }

        for &child_id in &node.children {
            self.collect_visible(child_id, out);
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
