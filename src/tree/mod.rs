use std::fmt::{Debug, Display};

use anyhow::bail;
use approx::relative_eq;
use hashbrown::HashMap;
use itertools::Itertools;

use crate::Result;

pub mod tree_parser;
pub use tree_parser::from_newick;

/// A single tree node stored in the arena. Parent and children are arena
/// indices, never owning references.
#[derive(Clone)]
pub struct Node {
    pub idx: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub blen: f64,
    pub id: String,
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.id.is_empty() {
            write!(f, "{}", self.idx)
        } else {
            write!(f, "{} with id {}", self.idx, self.id)
        }
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "({}) {}:{}, parent: {:?}, children: {:?}",
            self.id, self.idx, self.blen, self.parent, self.children,
        )
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        (self.idx == other.idx)
            && (self.parent == other.parent)
            && (self.children == other.children)
            && (self.id == other.id)
            && relative_eq!(self.blen, other.blen)
    }
}

impl Node {
    pub(crate) fn new_leaf(idx: usize, parent: Option<usize>, blen: f64, id: String) -> Self {
        Self {
            idx,
            parent,
            children: Vec::new(),
            blen,
            id,
        }
    }

    pub(crate) fn new_empty_internal(idx: usize) -> Self {
        Self {
            idx,
            parent: None,
            children: Vec::new(),
            blen: 0.0,
            id: "".to_string(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A rooted phylogenetic tree stored as an arena of nodes addressed by stable
/// integer indices. Topology is immutable once the tree is built, so the BFS
/// order, the id lookup table and the subtree leaf counts are computed once at
/// construction.
#[derive(Clone, Debug)]
pub struct Tree {
    pub root: usize,
    nodes: Vec<Node>,
    bfs: Vec<usize>,
    bfs_pos: Vec<usize>,
    ids: HashMap<String, usize>,
    leaf_count: Vec<usize>,
}

impl Tree {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn parent(&self, idx: usize) -> Option<usize> {
        self.nodes[idx].parent
    }

    pub fn children(&self, idx: usize) -> &[usize] {
        &self.nodes[idx].children
    }

    pub fn is_leaf(&self, idx: usize) -> bool {
        self.nodes[idx].is_leaf()
    }

    pub fn is_root(&self, idx: usize) -> bool {
        idx == self.root
    }

    /// Iterates over all leaf indices in arena order.
    pub fn leaves(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(|&idx| self.is_leaf(idx))
    }

    pub fn leaf_ids(&self) -> Vec<String> {
        self.leaves().map(|idx| self.nodes[idx].id.clone()).collect()
    }

    /// Breadth-first node order, root first, children visited in newick order.
    /// Its reverse is a valid children-before-parents evaluation order.
    pub fn bfs(&self) -> &[usize] {
        &self.bfs
    }

    /// The node's position in the BFS order. Fixed at construction, so it can
    /// serve as a stable index for deterministic tie-breaking.
    pub fn bfs_pos(&self, idx: usize) -> usize {
        self.bfs_pos[idx]
    }

    pub fn try_idx(&self, id: &str) -> Result<usize> {
        match self.ids.get(id) {
            Some(&idx) => Ok(idx),
            None => bail!("No node with id {} in the tree", id),
        }
    }

    /// Panicking variant of [`Tree::try_idx`] for ids known to be present.
    pub fn idx(&self, id: &str) -> usize {
        self.ids[id]
    }

    /// Walks from the node towards the root, nearest ancestor first. The node
    /// itself is not included; the last item is the root.
    pub fn ancestors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.nodes[idx].parent, |&anc| self.nodes[anc].parent)
    }

    /// Number of leaves in the subtree rooted at the node; 1 for a leaf.
    pub fn subtree_leaf_count(&self, idx: usize) -> usize {
        self.leaf_count[idx]
    }

    pub fn to_newick(&self) -> String {
        format!("{};", self.newick_subtree(self.root))
    }

    fn newick_subtree(&self, idx: usize) -> String {
        let node = &self.nodes[idx];
        if node.is_leaf() {
            format!("{}:{}", node.id, node.blen)
        } else {
            format!(
                "({}){}:{}",
                node.children
                    .iter()
                    .map(|&child| self.newick_subtree(child))
                    .join(","),
                node.id,
                node.blen
            )
        }
    }

    pub(crate) fn compute_bfs(&mut self) {
        let mut order = Vec::with_capacity(self.nodes.len());
        order.push(self.root);
        let mut head = 0;
        while head < order.len() {
            let idx = order[head];
            head += 1;
            order.extend_from_slice(&self.nodes[idx].children);
        }
        let mut bfs_pos = vec![0; self.nodes.len()];
        for (pos, &idx) in order.iter().enumerate() {
            bfs_pos[idx] = pos;
        }
        self.bfs = order;
        self.bfs_pos = bfs_pos;
    }

    pub(crate) fn compute_leaf_counts(&mut self) {
        let mut counts = vec![0; self.nodes.len()];
        for &idx in self.bfs.iter().rev() {
            if self.is_leaf(idx) {
                counts[idx] = 1;
            } else {
                counts[idx] = self.nodes[idx]
                    .children
                    .iter()
                    .map(|&child| counts[child])
                    .sum();
            }
        }
        self.leaf_count = counts;
    }
}
