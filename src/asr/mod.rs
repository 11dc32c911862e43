//! Per-site ancestral state reconstruction.
//!
//! Each genomic site is an independent unit of work: leaf observations seed a
//! per-node cost table, a children-before-parents pass accumulates the
//! unit-cost Sankoff recurrence, and a parents-before-children pass assigns
//! states and emits a mutation record on every state-change edge. Sites run in
//! parallel and their results are merged serially in input order, so the final
//! mutation map is identical for any scheduling.

use log::{debug, info};
use rayon::prelude::*;

use crate::mutations::{Mutation, MutationMap, Nuc, PendingSamples, VariantSite};
use crate::tree::Tree;
use crate::Result;

type CostRow = [usize; 4];

/// Everything one site contributes: mutation records for tree nodes and
/// deferred records for pending samples. Purely local to the unit of work.
pub(crate) struct SiteFit {
    node_mutations: Vec<(usize, Mutation)>,
    deferred: Vec<(usize, Mutation)>,
}

/// Seeds the per-node cost table with the leaf observations at one site.
///
/// Leaves start at zero cost for the reference state and at the sentinel (the
/// node count, which dominates any accumulated real cost) elsewhere. A call
/// for a tree sample overrides its row with zero cost at each resolved state.
/// Calls for pending samples never enter the table; they are recorded as
/// deferred mutations instead.
fn leaf_costs(
    tree: &Tree,
    site: &VariantSite,
    pending: &PendingSamples,
) -> Result<(Vec<CostRow>, Vec<(usize, Mutation)>)> {
    let sentinel = tree.len();
    let mut costs = vec![[0usize; 4]; tree.len()];
    for leaf in tree.leaves() {
        for j in 0..4 {
            if j != site.ref_nuc as usize {
                costs[leaf][j] = sentinel;
            }
        }
    }

    let mut deferred = Vec::new();
    for call in &site.calls {
        let states = call.resolved();
        if let Some(sample) = pending.idx(&call.sample) {
            let mutation = if states.is_empty() || states.len() == 4 {
                Mutation::missing(site.chrom.clone(), site.position, site.ref_nuc)
            } else {
                Mutation::ambiguous(site.chrom.clone(), site.position, site.ref_nuc, states)
            };
            deferred.push((sample, mutation));
        } else {
            let idx = tree.try_idx(&call.sample)?;
            costs[idx] = [sentinel; 4];
            for nuc in states {
                costs[idx][nuc as usize] = 0;
            }
        }
    }
    Ok((costs, deferred))
}

/// Forward pass: children before parents, the classic unit-cost parsimony
/// recurrence `cost(node, j) = sum over children of min_k cost(child, k) +
/// [k != j]`.
fn accumulate_costs(tree: &Tree, costs: &mut [CostRow]) {
    for &idx in tree.bfs().iter().rev() {
        if tree.is_leaf(idx) {
            continue;
        }
        for &child in tree.children(idx) {
            for j in 0..4 {
                let mut min_s = usize::MAX;
                for k in 0..4 {
                    min_s = min_s.min(costs[child][k] + usize::from(k != j));
                }
                costs[idx][j] += min_s;
            }
        }
    }
}

/// Backward pass: parents before children, each node takes the state that
/// minimizes its cost row. Ties prefer the parent's already assigned state,
/// then the reference state; the root's parent state is the reference.
fn assign_states(tree: &Tree, ref_nuc: Nuc, costs: &[CostRow]) -> Vec<Nuc> {
    let mut states = vec![ref_nuc; tree.len()];
    for &idx in tree.bfs() {
        let par_state = match tree.parent(idx) {
            Some(parent) => states[parent],
            None => ref_nuc,
        };
        let mut state = par_state;
        let mut min_s = costs[idx][par_state as usize];
        for j in 0..4 {
            if costs[idx][j] < min_s {
                min_s = costs[idx][j];
                state = Nuc::ALL[j];
            }
        }
        if state != par_state && costs[idx][ref_nuc as usize] == min_s {
            state = ref_nuc;
        }
        states[idx] = state;
    }
    states
}

/// Fits one site: minimal-cost state at every node, mutation records on
/// state-change edges, deferred records for pending samples.
pub(crate) fn fit_site(
    tree: &Tree,
    site: &VariantSite,
    pending: &PendingSamples,
) -> Result<SiteFit> {
    let (mut costs, deferred) = leaf_costs(tree, site, pending)?;
    accumulate_costs(tree, &mut costs);
    let states = assign_states(tree, site.ref_nuc, &costs);

    let mut node_mutations = Vec::new();
    for &idx in tree.bfs() {
        let par_state = tree.parent(idx).map_or(site.ref_nuc, |parent| states[parent]);
        if states[idx] != par_state {
            node_mutations.push((
                idx,
                Mutation::substitution(
                    site.chrom.clone(),
                    site.position,
                    site.ref_nuc,
                    par_state,
                    states[idx],
                ),
            ));
        }
    }
    debug!(
        "Site {}: {} mutation(s), {} deferred call(s).",
        site.position,
        node_mutations.len(),
        deferred.len()
    );
    Ok(SiteFit {
        node_mutations,
        deferred,
    })
}

/// Reconstructs ancestral states for every site and annotates the tree with
/// the resulting mutation records. Calls for pending samples land in their
/// deferred lists instead. A call naming a sample that is neither a tree node
/// nor a pending sample is an error.
pub fn annotate_tree(
    tree: &Tree,
    sites: &[VariantSite],
    pending: &mut PendingSamples,
) -> Result<MutationMap> {
    info!(
        "Reconstructing ancestral states at {} site(s) over {} node(s).",
        sites.len(),
        tree.len()
    );
    let pending_ref: &PendingSamples = pending;
    let fits = sites
        .par_iter()
        .map(|site| fit_site(tree, site, pending_ref))
        .collect::<Result<Vec<SiteFit>>>()?;

    let mut map = MutationMap::new(tree.len());
    for fit in fits {
        for (idx, mutation) in fit.node_mutations {
            map.insert(idx, mutation);
        }
        for (sample, mutation) in fit.deferred {
            pending.add_mutation_at(sample, mutation);
        }
    }
    info!(
        "Ancestral reconstruction finished with {} mutation(s) on the tree.",
        map.mutation_count()
    );
    Ok(map)
}
