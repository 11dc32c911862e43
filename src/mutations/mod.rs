use std::fmt;

use anyhow::bail;
use hashbrown::HashMap;
use lazy_static::lazy_static;

use crate::Result;

pub static NUCLEOTIDES: &[u8] = b"ACGT";

lazy_static! {
    /// Maps ASCII bytes to nucleotide codes; anything that is not an upper or
    /// lower case nucleotide letter maps to the ambiguous code 4.
    pub static ref NUCLEOTIDE_INDEX: [u8; 256] = {
        let mut index = [4u8; 256];
        for (i, char) in NUCLEOTIDES.iter().enumerate() {
            index[*char as usize] = i as u8;
            index[char.to_ascii_lowercase() as usize] = i as u8;
        }
        index
    };
}

/// One of the four nucleotide states. Raw input codes >= 4 denote the
/// ambiguous/missing supercategory and have no `Nuc` value; they are resolved
/// before entering the dynamic program.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Nuc {
    A = 0,
    C = 1,
    G = 2,
    T = 3,
}

impl Nuc {
    pub const ALL: [Nuc; 4] = [Nuc::A, Nuc::C, Nuc::G, Nuc::T];

    pub fn from_code(code: u8) -> Option<Nuc> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn from_byte(byte: u8) -> Option<Nuc> {
        Self::from_code(NUCLEOTIDE_INDEX[byte as usize])
    }
}

impl fmt::Display for Nuc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", NUCLEOTIDES[*self as usize] as char)
    }
}

/// A point mutation event on a tree edge or in a sample's deferred list.
///
/// `mut_nuc` holds one resulting state for a regular substitution and several
/// for an ambiguous or imputed call. All four states combined with
/// `is_missing` encode a fully missing observation at the site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mutation {
    pub chrom: String,
    pub position: u32,
    pub ref_nuc: Nuc,
    pub par_nuc: Nuc,
    pub mut_nuc: Vec<Nuc>,
    pub is_missing: bool,
}

impl Mutation {
    pub fn substitution(
        chrom: String,
        position: u32,
        ref_nuc: Nuc,
        par_nuc: Nuc,
        mut_nuc: Nuc,
    ) -> Self {
        Self {
            chrom,
            position,
            ref_nuc,
            par_nuc,
            mut_nuc: vec![mut_nuc],
            is_missing: false,
        }
    }

    pub fn ambiguous(chrom: String, position: u32, ref_nuc: Nuc, states: Vec<Nuc>) -> Self {
        debug_assert!(!states.is_empty() && states.len() < 4);
        Self {
            chrom,
            position,
            ref_nuc,
            par_nuc: ref_nuc,
            mut_nuc: states,
            is_missing: false,
        }
    }

    pub fn missing(chrom: String, position: u32, ref_nuc: Nuc) -> Self {
        Self {
            chrom,
            position,
            ref_nuc,
            par_nuc: ref_nuc,
            mut_nuc: Nuc::ALL.to_vec(),
            is_missing: true,
        }
    }

    /// The resulting state; the first listed one for ambiguous records.
    pub fn state(&self) -> Nuc {
        self.mut_nuc[0]
    }

    pub fn is_ambiguous(&self) -> bool {
        self.mut_nuc.len() > 1 && !self.is_missing
    }

    /// Whether this record accounts for the given state: a missing record
    /// explains anything, otherwise the state must be among the resulting ones.
    pub fn explains(&self, nuc: Nuc) -> bool {
        self.is_missing || self.mut_nuc.contains(&nuc)
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.par_nuc, self.position)?;
        if self.is_missing {
            write!(f, "N")
        } else {
            for nuc in &self.mut_nuc {
                write!(f, "{nuc}")?;
            }
            Ok(())
        }
    }
}

/// Raw observed states of one sample at one site; values >= 4 are unresolved
/// calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantCall {
    pub sample: String,
    pub states: Vec<u8>,
}

impl VariantCall {
    pub fn new(sample: &str, states: &[u8]) -> Self {
        Self {
            sample: sample.to_string(),
            states: states.to_vec(),
        }
    }

    /// The valid nucleotide states of the call, ambiguous codes filtered out.
    pub fn resolved(&self) -> Vec<Nuc> {
        self.states.iter().filter_map(|&s| Nuc::from_code(s)).collect()
    }
}

/// All non-reference calls at one genomic site. Samples without a call are
/// implicitly in the reference state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantSite {
    pub chrom: String,
    pub position: u32,
    pub ref_nuc: Nuc,
    pub calls: Vec<VariantCall>,
}

impl VariantSite {
    pub fn new(chrom: &str, position: u32, ref_nuc: Nuc, calls: Vec<VariantCall>) -> Self {
        Self {
            chrom: chrom.to_string(),
            position,
            ref_nuc,
            calls,
        }
    }
}

/// Per-node mutation records keyed by arena index. Each node's list is kept
/// sorted by position with at most one entry per position, enforced at
/// insertion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutationMap {
    node_mutations: Vec<Vec<Mutation>>,
}

impl MutationMap {
    pub fn new(node_count: usize) -> Self {
        Self {
            node_mutations: vec![Vec::new(); node_count],
        }
    }

    pub fn insert(&mut self, node: usize, mutation: Mutation) {
        let list = &mut self.node_mutations[node];
        match list.binary_search_by_key(&mutation.position, |m| m.position) {
            Ok(at) => list[at] = mutation,
            Err(at) => list.insert(at, mutation),
        }
    }

    pub fn node(&self, node: usize) -> &[Mutation] {
        &self.node_mutations[node]
    }

    /// Iterates over nodes that carry at least one mutation.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[Mutation])> {
        self.node_mutations
            .iter()
            .enumerate()
            .filter(|(_, list)| !list.is_empty())
            .map(|(idx, list)| (idx, list.as_slice()))
    }

    pub fn mutation_count(&self) -> usize {
        self.node_mutations.iter().map(Vec::len).sum()
    }
}

/// Deferred mutation lists for samples that are missing or ambiguous at some
/// sites and are to be placed after ancestral reconstruction. Lookup by name
/// goes through a precomputed index.
#[derive(Clone, Debug, Default)]
pub struct PendingSamples {
    names: Vec<String>,
    index: HashMap<String, usize>,
    mutations: Vec<Vec<Mutation>>,
}

impl PendingSamples {
    pub fn new(names: &[&str]) -> Self {
        let names: Vec<String> = names.iter().map(|name| name.to_string()).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        let mutations = vec![Vec::new(); names.len()];
        Self {
            names,
            index,
            mutations,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, idx: usize) -> &str {
        &self.names[idx]
    }

    pub fn idx(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn add_mutation(&mut self, name: &str, mutation: Mutation) -> Result<()> {
        match self.idx(name) {
            Some(idx) => {
                self.add_mutation_at(idx, mutation);
                Ok(())
            }
            None => bail!("No pending sample with name {}", name),
        }
    }

    pub(crate) fn add_mutation_at(&mut self, idx: usize, mutation: Mutation) {
        let list = &mut self.mutations[idx];
        match list.binary_search_by_key(&mutation.position, |m| m.position) {
            Ok(at) => list[at] = mutation,
            Err(at) => list.insert(at, mutation),
        }
    }

    /// The sample's accumulated mutation list, sorted by position.
    pub fn mutations(&self, idx: usize) -> &[Mutation] {
        &self.mutations[idx]
    }
}

#[cfg(test)]
#[cfg_attr(coverage, coverage(off))]
mod tests;
