//! Parsimony placement of a new sample on an annotated tree.
//!
//! Every tree node is an independent candidate: the sample's mutation list is
//! reconciled against the node's ancestral mutation path, and the number of
//! mutations left unexplained on either side is the candidate's set
//! difference. Candidates are scored in parallel; the winner and the tie count
//! come from a serial fold in BFS order, so the result is identical for any
//! scheduling. A shared monotone bound lets losing candidates abandon the
//! reconciliation early.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::bail;
use log::{debug, info};
use rayon::prelude::*;

use crate::mutations::{Mutation, MutationMap};
use crate::tree::Tree;
use crate::Result;

/// Outcome of reconciling one sample against one candidate node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateScore {
    pub node: usize,
    pub set_difference: usize,
    pub excess: Vec<Mutation>,
    pub imputed: Vec<Mutation>,
    pub has_unique: bool,
    pub admissible: bool,
}

/// The best placement found for a sample, with the winning candidate's excess
/// and imputed mutation lists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub node: usize,
    pub set_difference: usize,
    pub node_leaf_count: usize,
    pub node_bfs_pos: usize,
    pub tie_count: usize,
    pub has_unique: bool,
    pub excess: Vec<Mutation>,
    pub imputed: Vec<Mutation>,
}

impl Placement {
    fn from_candidate(tree: &Tree, candidate: CandidateScore, tie_count: usize) -> Self {
        Self {
            node: candidate.node,
            set_difference: candidate.set_difference,
            node_leaf_count: tree.subtree_leaf_count(candidate.node),
            node_bfs_pos: tree.bfs_pos(candidate.node),
            tie_count,
            has_unique: candidate.has_unique,
            excess: candidate.excess,
            imputed: candidate.imputed,
        }
    }
}

/// Scores attaching the sample under the candidate node. `sample_mutations`
/// must be sorted by position.
pub fn score_placement(
    tree: &Tree,
    map: &MutationMap,
    sample_mutations: &[Mutation],
    node: usize,
) -> CandidateScore {
    score_bounded(tree, map, sample_mutations, node, usize::MAX)
        .expect("unbounded scoring never prunes")
}

fn score_bounded(
    tree: &Tree,
    map: &MutationMap,
    sample_mutations: &[Mutation],
    node: usize,
    bound: usize,
) -> Option<CandidateScore> {
    debug_assert!(sample_mutations
        .windows(2)
        .all(|pair| pair[0].position < pair[1].position));

    let mut set_difference = 0usize;
    let mut path: Vec<Mutation> = Vec::new();
    let mut path_positions: Vec<u32> = Vec::new();
    let mut excess: Vec<Mutation> = Vec::new();
    let mut imputed: Vec<Mutation> = Vec::new();
    let mut has_unique = false;
    let mut node_mut_count = 0usize;
    let mut common_count = 0usize;

    // Reconcile the candidate's own branch mutations against the sample. A
    // shared state is common and seeds both the ancestral path and the new
    // branch's mutation list; a branch mutation back to the reference with no
    // sample call at the position is silent; anything else is unique to the
    // branch. The root's own mutations enter the path directly.
    if !tree.is_root(node) {
        for m1 in map.node(node) {
            node_mut_count += 1;
            let anc_nuc = m1.state();
            let mut found = false;
            let mut found_pos = false;
            if let Ok(at) = sample_mutations.binary_search_by_key(&m1.position, |m| m.position) {
                let m2 = &sample_mutations[at];
                found_pos = true;
                if m2.is_missing {
                    found = true;
                    common_count += 1;
                } else if m2.mut_nuc.contains(&anc_nuc) {
                    let m = Mutation::substitution(
                        m1.chrom.clone(),
                        m1.position,
                        m1.ref_nuc,
                        m1.par_nuc,
                        anc_nuc,
                    );
                    path_positions.push(m.position);
                    excess.push(m.clone());
                    if m2.is_ambiguous() {
                        imputed.push(m.clone());
                    }
                    path.push(m);
                    found = true;
                    common_count += 1;
                }
            }
            if !found {
                if !found_pos && anc_nuc == m1.ref_nuc {
                    let m = Mutation::substitution(
                        m1.chrom.clone(),
                        m1.position,
                        m1.ref_nuc,
                        m1.par_nuc,
                        anc_nuc,
                    );
                    path_positions.push(m.position);
                    excess.push(m.clone());
                    path.push(m);
                    common_count += 1;
                } else {
                    has_unique = true;
                }
            }
        }
    } else {
        for m in map.node(node) {
            path_positions.push(m.position);
            path.push(m.clone());
        }
    }

    // Ancestor walk, nearest ancestor wins per position.
    for anc in tree.ancestors(node) {
        for m in map.node(anc) {
            if !path_positions.contains(&m.position) {
                path_positions.push(m.position);
                path.push(m.clone());
            }
        }
    }
    path.sort_by_key(|m| m.position);

    // Sample side: every sample mutation is either explained by the path,
    // silently in the reference state, or counts towards the set difference.
    for m1 in sample_mutations {
        if m1.is_missing {
            continue;
        }
        let has_ref = m1.mut_nuc.contains(&m1.ref_nuc);
        let mut anc_nuc = m1.ref_nuc;
        let mut found = false;
        let mut found_pos = false;
        if let Ok(at) = path.binary_search_by_key(&m1.position, |m| m.position) {
            found_pos = true;
            anc_nuc = path[at].state();
            found = m1.mut_nuc.contains(&anc_nuc);
        }
        if found {
            if m1.is_ambiguous() {
                imputed.push(Mutation::substitution(
                    m1.chrom.clone(),
                    m1.position,
                    m1.ref_nuc,
                    anc_nuc,
                    anc_nuc,
                ));
            }
        } else if !found_pos && has_ref {
            if m1.is_ambiguous() {
                imputed.push(Mutation::substitution(
                    m1.chrom.clone(),
                    m1.position,
                    m1.ref_nuc,
                    anc_nuc,
                    m1.ref_nuc,
                ));
            }
        } else {
            set_difference += 1;
            if set_difference > bound {
                return None;
            }
            let mut_state = if has_ref { m1.ref_nuc } else { m1.mut_nuc[0] };
            let m = Mutation::substitution(
                m1.chrom.clone(),
                m1.position,
                m1.ref_nuc,
                anc_nuc,
                mut_state,
            );
            if m1.is_ambiguous() {
                imputed.push(m.clone());
            }
            excess.push(m);
        }
    }

    // Ancestral side: every path mutation the sample neither shares nor is
    // missing at, and that is not a silent return to the reference, also
    // counts towards the set difference.
    for m1 in &path {
        let anc_nuc = m1.state();
        let mut found = false;
        let mut found_pos = false;
        if let Ok(at) = sample_mutations.binary_search_by_key(&m1.position, |m| m.position) {
            found_pos = true;
            found = sample_mutations[at].explains(anc_nuc);
        }
        if found || (!found_pos && anc_nuc == m1.ref_nuc) {
            continue;
        }
        set_difference += 1;
        if set_difference > bound {
            return None;
        }
        excess.push(Mutation::substitution(
            m1.chrom.clone(),
            m1.position,
            m1.ref_nuc,
            anc_nuc,
            m1.ref_nuc,
        ));
    }

    // A sibling placement must not be equivalent to placing under the parent;
    // a placement under an internal node requires the sample to carry all of
    // the node's mutations.
    let is_leaf = tree.is_leaf(node);
    let admissible = (has_unique && !is_leaf && common_count > 0 && node_mut_count != common_count)
        || (is_leaf && common_count > 0)
        || (!has_unique && !is_leaf && node_mut_count == common_count);

    Some(CandidateScore {
        node,
        set_difference,
        excess,
        imputed,
        has_unique,
        admissible,
    })
}

/// Decides whether a candidate with an equal set difference displaces the
/// current best: a child of the best wins when its clade is more than half the
/// best's, a parent wins when its clade at least doubles the best's, an
/// unrelated candidate wins on a strictly larger clade, and otherwise on a
/// larger stable index.
fn beats(tree: &Tree, candidate: &CandidateScore, best: &Placement) -> bool {
    let cand_leaves = tree.subtree_leaf_count(candidate.node);
    let best_is_parent = tree.parent(candidate.node) == Some(best.node);
    let best_is_child = tree.parent(best.node) == Some(candidate.node);
    let unrelated = !best_is_parent && !best_is_child;
    (best_is_parent && 2 * cand_leaves > best.node_leaf_count)
        || (best_is_child && cand_leaves >= 2 * best.node_leaf_count)
        || (unrelated && cand_leaves > best.node_leaf_count)
        || (unrelated
            && cand_leaves == best.node_leaf_count
            && tree.bfs_pos(candidate.node) > best.node_bfs_pos)
}

/// Finds the node under which attaching the sample requires the fewest
/// unexplained mutations. `sample_mutations` must be sorted by position, and
/// the mutation map must already hold the full ancestral reconstruction.
///
/// Errors when no candidate is admissible, which only happens on a
/// single-leaf tree.
pub fn place_sample(
    tree: &Tree,
    map: &MutationMap,
    sample_mutations: &[Mutation],
) -> Result<Placement> {
    place_sample_impl(tree, map, sample_mutations, true)
}

fn place_sample_impl(
    tree: &Tree,
    map: &MutationMap,
    sample_mutations: &[Mutation],
    prune: bool,
) -> Result<Placement> {
    info!(
        "Placing a sample with {} mutation(s) among {} candidate node(s).",
        sample_mutations.len(),
        tree.len()
    );
    let bound = AtomicUsize::new(usize::MAX);
    let candidates: Vec<Option<CandidateScore>> = tree
        .bfs()
        .par_iter()
        .map(|&node| {
            let limit = if prune {
                bound.load(Ordering::Relaxed)
            } else {
                usize::MAX
            };
            let score = score_bounded(tree, map, sample_mutations, node, limit);
            if let Some(score) = &score {
                if score.admissible {
                    bound.fetch_min(score.set_difference, Ordering::Relaxed);
                }
            }
            score
        })
        .collect();

    let mut best: Option<Placement> = None;
    for candidate in candidates.into_iter().flatten() {
        if !candidate.admissible {
            continue;
        }
        best = Some(match best.take() {
            None => Placement::from_candidate(tree, candidate, 1),
            Some(mut best) => {
                if candidate.set_difference < best.set_difference {
                    Placement::from_candidate(tree, candidate, 1)
                } else if candidate.set_difference == best.set_difference {
                    best.tie_count += 1;
                    if beats(tree, &candidate, &best) {
                        let tie_count = best.tie_count;
                        Placement::from_candidate(tree, candidate, tie_count)
                    } else {
                        best
                    }
                } else {
                    best
                }
            }
        });
    }
    match best {
        Some(best) => {
            debug!(
                "Best placement at node {} with set difference {} ({} tied).",
                tree.node(best.node).id,
                best.set_difference,
                best.tie_count
            );
            Ok(best)
        }
        None => bail!("No admissible placement for the sample on this tree"),
    }
}

/// Scoring-only mode: the per-candidate set difference in BFS order, with
/// inadmissible candidates penalized by one as their best placement is
/// equivalent to placing at the parent or a child.
pub fn parsimony_scores(tree: &Tree, map: &MutationMap, sample_mutations: &[Mutation]) -> Vec<usize> {
    tree.bfs()
        .par_iter()
        .map(|&node| {
            let score = score_placement(tree, map, sample_mutations, node);
            score.set_difference + usize::from(!score.admissible)
        })
        .collect()
}
