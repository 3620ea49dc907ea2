//! Position Tree - the style tree or the language tree.
//!
//! Uses `petgraph::graphmap::DiGraphMap` with:
//! - Nodes: `PositionId`
//! - Edges: parent -> child
//!
//! Every node also keeps its materialized ancestor chain (root first,
//! parent last) so inheritance lookups never walk the graph. Chains are
//! recomputed top-down only when a subtree moves.

use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use vellum_core::{PositionId, TreeError, TreeKind};

/// A persisted tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: PositionId,
    /// `None` only for the root.
    pub parent: Option<PositionId>,
    /// Ancestors from the root down to the parent.
    #[serde(default)]
    pub ancestors: Vec<PositionId>,
}

impl TreeNode {
    pub fn new(id: PositionId, parent: Option<PositionId>) -> Self {
        Self {
            id,
            parent,
            ancestors: Vec::new(),
        }
    }
}

/// Result of moving a position under a new parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reparent {
    pub id: PositionId,
    pub old_ancestors: Vec<PositionId>,
    pub new_ancestors: Vec<PositionId>,
    /// The moved position and all of its descendants, breadth-first.
    pub subtree: Vec<PositionId>,
}

/// Result of removing a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub id: PositionId,
    pub parent: PositionId,
    /// Former children, now children of `parent`.
    pub children: Vec<PositionId>,
    /// Every position whose ancestor chain changed.
    pub moved: Vec<PositionId>,
}

/// A tree of positions rooted at [`PositionId::ROOT`].
#[derive(Debug, Clone)]
pub struct PositionTree {
    kind: TreeKind,
    graph: DiGraphMap<PositionId, ()>,
    parents: FxHashMap<PositionId, PositionId>,
    ancestors: FxHashMap<PositionId, Vec<PositionId>>,
}

impl PositionTree {
    /// Create a tree containing only the root.
    pub fn new(kind: TreeKind) -> Self {
        let mut graph = DiGraphMap::new();
        graph.add_node(PositionId::ROOT);
        let mut ancestors = FxHashMap::default();
        ancestors.insert(PositionId::ROOT, Vec::new());
        Self {
            kind,
            graph,
            parents: FxHashMap::default(),
            ancestors,
        }
    }

    /// Build a tree from persisted nodes given in any order.
    ///
    /// Stored ancestor chains are ignored and recomputed. A node whose
    /// parent does not exist is an orphan; nodes unreachable from the root
    /// despite having parents form a cycle.
    pub fn from_nodes(
        kind: TreeKind,
        nodes: impl IntoIterator<Item = TreeNode>,
    ) -> Result<Self, TreeError> {
        let mut parents: FxHashMap<PositionId, PositionId> = FxHashMap::default();
        for node in nodes {
            if node.id.is_root() {
                if node.parent.is_some() {
                    return Err(TreeError::RootImmutable { tree: kind });
                }
                continue;
            }
            let parent = node.parent.ok_or(TreeError::Orphan {
                tree: kind,
                id: node.id,
            })?;
            if parents.insert(node.id, parent).is_some() {
                return Err(TreeError::DuplicatePosition {
                    tree: kind,
                    id: node.id,
                });
            }
        }
        for (&id, parent) in &parents {
            if !parent.is_root() && !parents.contains_key(parent) {
                return Err(TreeError::Orphan { tree: kind, id });
            }
        }

        let mut tree = Self::new(kind);
        for (&id, &parent) in &parents {
            tree.graph.add_edge(parent, id, ());
        }
        tree.parents = parents;
        tree.recompute_chains(PositionId::ROOT);

        if tree.ancestors.len() != tree.parents.len() + 1 {
            let mut stuck: Vec<_> = tree
                .parents
                .iter()
                .filter(|(id, _)| !tree.ancestors.contains_key(*id))
                .collect();
            stuck.sort();
            if let Some(&(&id, &parent)) = stuck.first() {
                return Err(TreeError::Cycle {
                    tree: kind,
                    id,
                    parent,
                });
            }
        }
        Ok(tree)
    }

    pub fn kind(&self) -> TreeKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.ancestors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ancestors.is_empty()
    }

    pub fn contains(&self, id: PositionId) -> bool {
        self.ancestors.contains_key(&id)
    }

    pub fn parent(&self, id: PositionId) -> Option<PositionId> {
        self.parents.get(&id).copied()
    }

    /// Ancestors of `id` from the root down to its parent.
    pub fn ancestors(&self, id: PositionId) -> Result<&[PositionId], TreeError> {
        self.ancestors
            .get(&id)
            .map(Vec::as_slice)
            .ok_or(self.unknown(id))
    }

    /// Ancestors of `id` followed by `id` itself.
    pub fn chain(&self, id: PositionId) -> Result<Vec<PositionId>, TreeError> {
        let mut chain = self.ancestors(id)?.to_vec();
        chain.push(id);
        Ok(chain)
    }

    pub fn is_ancestor_or_self(&self, ancestor: PositionId, id: PositionId) -> bool {
        ancestor == id
            || self
                .ancestors
                .get(&id)
                .is_some_and(|chain| chain.contains(&ancestor))
    }

    /// Direct children in ascending id order.
    pub fn children(&self, id: PositionId) -> Vec<PositionId> {
        if !self.graph.contains_node(id) {
            return Vec::new();
        }
        let mut children: Vec<_> = self
            .graph
            .neighbors_directed(id, Direction::Outgoing)
            .collect();
        children.sort();
        children
    }

    /// `id` and every descendant, parents before children.
    pub fn subtree(&self, id: PositionId) -> Vec<PositionId> {
        if !self.contains(id) {
            return Vec::new();
        }
        let mut order = Vec::new();
        let mut queue = VecDeque::from([id]);
        while let Some(next) = queue.pop_front() {
            order.push(next);
            queue.extend(self.children(next));
        }
        order
    }

    /// Every descendant of `id`, parents before children.
    pub fn descendants(&self, id: PositionId) -> Vec<PositionId> {
        let mut subtree = self.subtree(id);
        if !subtree.is_empty() {
            subtree.remove(0);
        }
        subtree
    }

    /// All positions, parents before children.
    pub fn breadth_first(&self) -> Vec<PositionId> {
        self.subtree(PositionId::ROOT)
    }

    /// Add a new position under `parent`.
    pub fn insert(&mut self, id: PositionId, parent: PositionId) -> Result<(), TreeError> {
        if self.contains(id) {
            return Err(TreeError::DuplicatePosition {
                tree: self.kind,
                id,
            });
        }
        let chain = self.chain(parent)?;
        self.graph.add_edge(parent, id, ());
        self.parents.insert(id, parent);
        self.ancestors.insert(id, chain);
        Ok(())
    }

    /// Move `id` (with its subtree) under `parent`.
    ///
    /// Rejected when `parent` is `id` itself or one of its descendants.
    pub fn set_parent(
        &mut self,
        id: PositionId,
        parent: PositionId,
    ) -> Result<Reparent, TreeError> {
        if id.is_root() {
            return Err(TreeError::RootImmutable { tree: self.kind });
        }
        let old_ancestors = self.ancestors(id)?.to_vec();
        let parent_chain = self.ancestors(parent)?;
        if parent == id || parent_chain.contains(&id) {
            return Err(TreeError::Cycle {
                tree: self.kind,
                id,
                parent,
            });
        }

        if let Some(old_parent) = self.parents.insert(id, parent) {
            self.graph.remove_edge(old_parent, id);
        }
        self.graph.add_edge(parent, id, ());
        self.recompute_chains(id);

        Ok(Reparent {
            id,
            old_ancestors,
            new_ancestors: self.ancestors(id)?.to_vec(),
            subtree: self.subtree(id),
        })
    }

    /// Remove `id`; its children move to its parent.
    pub fn remove(&mut self, id: PositionId) -> Result<Removal, TreeError> {
        if id.is_root() {
            return Err(TreeError::RootImmutable { tree: self.kind });
        }
        let parent = self.parent(id).ok_or(self.unknown(id))?;
        let children = self.children(id);

        for &child in &children {
            self.graph.add_edge(parent, child, ());
            self.parents.insert(child, parent);
        }
        self.graph.remove_node(id);
        self.parents.remove(&id);
        self.ancestors.remove(&id);

        let mut moved = Vec::new();
        for &child in &children {
            self.recompute_chains(child);
            moved.extend(self.subtree(child));
        }

        Ok(Removal {
            id,
            parent,
            children,
            moved,
        })
    }

    /// Persistable view of every node, parents before children.
    pub fn nodes(&self) -> Vec<TreeNode> {
        self.breadth_first()
            .into_iter()
            .map(|id| TreeNode {
                id,
                parent: self.parent(id),
                ancestors: self.ancestors.get(&id).cloned().unwrap_or_default(),
            })
            .collect()
    }

    /// Recompute ancestor chains for `top` and everything below it.
    fn recompute_chains(&mut self, top: PositionId) {
        let mut queue = VecDeque::from([top]);
        while let Some(id) = queue.pop_front() {
            let chain = match self.parents.get(&id) {
                Some(parent) => {
                    let mut chain = self.ancestors.get(parent).cloned().unwrap_or_default();
                    chain.push(*parent);
                    chain
                }
                None => Vec::new(),
            };
            self.ancestors.insert(id, chain);
            queue.extend(self.children(id));
        }
    }

    fn unknown(&self, id: PositionId) -> TreeError {
        TreeError::UnknownPosition {
            tree: self.kind,
            id,
        }
    }
}
