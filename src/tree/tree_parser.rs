use std::fmt;

use anyhow::bail;
use hashbrown::HashMap;
use log::info;
use pest::{error::Error as PestError, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::tree::{Node, Tree};
use crate::Result;

#[derive(Parser)]
#[grammar = "./tree/newick.pest"]
pub struct NewickParser;

#[derive(Debug)]
pub(crate) struct ParsingError(pub(crate) Box<PestError<Rule>>);

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Malformed newick string")?;
        write!(f, "{}", self.0)
    }
}

/// Parses one or more rooted newick trees. Polytomies are legal, unlabeled
/// internal nodes get generated `node_<idx>` ids, and duplicate ids are an
/// error.
pub fn from_newick(newick: &str) -> Result<Vec<Tree>> {
    info!("Parsing newick trees.");
    let mut parsed = match NewickParser::parse(Rule::newick, newick) {
        Ok(parsed) => parsed,
        Err(error) => bail!(ParsingError(Box::new(error))),
    };
    let mut trees = Vec::new();
    for tree_rule in parsed.next().unwrap().into_inner() {
        if tree_rule.as_rule() != Rule::tree {
            continue;
        }
        let mut tree = Tree::new_empty();
        tree.root = tree.parse_subtree(tree_rule.into_inner().next().unwrap());
        tree.index()?;
        trees.push(tree);
    }
    info!("Parsed {} newick tree(s) successfully.", trees.len());
    Ok(trees)
}

impl Tree {
    fn new_empty() -> Self {
        Self {
            root: 0,
            nodes: Vec::new(),
            bfs: Vec::new(),
            bfs_pos: Vec::new(),
            ids: HashMap::new(),
            leaf_count: Vec::new(),
        }
    }

    fn parse_subtree(&mut self, pair: Pair<Rule>) -> usize {
        let idx = self.nodes.len();
        match pair.as_rule() {
            Rule::leaf => {
                self.nodes.push(Node::new_leaf(idx, None, 0.0, "".to_string()));
                for rule in pair.into_inner() {
                    match rule.as_rule() {
                        Rule::label => self.nodes[idx].id = Tree::parse_label_rule(rule),
                        Rule::branch_length => {
                            self.nodes[idx].blen = Tree::parse_branch_length_rule(rule)
                        }
                        _ => unreachable!(),
                    }
                }
            }
            Rule::internal => {
                self.nodes.push(Node::new_empty_internal(idx));
                let mut children = Vec::new();
                for rule in pair.into_inner() {
                    match rule.as_rule() {
                        Rule::label => self.nodes[idx].id = Tree::parse_label_rule(rule),
                        Rule::branch_length => {
                            self.nodes[idx].blen = Tree::parse_branch_length_rule(rule)
                        }
                        Rule::internal | Rule::leaf => children.push(self.parse_subtree(rule)),
                        _ => unreachable!(),
                    }
                }
                for &child in &children {
                    self.nodes[child].parent = Some(idx);
                }
                self.nodes[idx].children = children;
            }
            _ => unreachable!(),
        }
        idx
    }

    /// Finalizes a freshly parsed arena: generated ids, BFS order, id lookup
    /// and subtree leaf counts.
    fn index(&mut self) -> Result<()> {
        for idx in 0..self.nodes.len() {
            if self.nodes[idx].id.is_empty() {
                self.nodes[idx].id = format!("node_{idx}");
            }
        }
        let mut ids = HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if ids.insert(node.id.clone(), node.idx).is_some() {
                bail!("Duplicate node id {} in newick tree", node.id);
            }
        }
        self.ids = ids;
        self.compute_bfs();
        self.compute_leaf_counts();
        Ok(())
    }

    fn parse_branch_length_rule(rule: Pair<Rule>) -> f64 {
        rule.into_inner()
            .next()
            .unwrap()
            .as_str()
            .trim()
            .parse::<f64>()
            .unwrap_or_default()
    }

    fn parse_label_rule(rule: Pair<Rule>) -> String {
        rule.as_str().to_string()
    }
}
