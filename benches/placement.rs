use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use phyplace::asr::annotate_tree;
use phyplace::mutations::{Mutation, MutationMap, Nuc, PendingSamples, VariantCall, VariantSite};
use phyplace::placement::place_sample;
use phyplace::tree::{from_newick, Tree};

fn balanced_newick(depth: usize) -> String {
    fn subtree(depth: usize, next: &mut usize) -> String {
        if depth == 0 {
            let leaf = format!("L{next}");
            *next += 1;
            leaf
        } else {
            format!("({},{})", subtree(depth - 1, next), subtree(depth - 1, next))
        }
    }
    let mut next = 0;
    format!("{};", subtree(depth, &mut next))
}

fn synthetic_sites(tree: &Tree, site_count: usize) -> Vec<VariantSite> {
    let leaf_ids = tree.leaf_ids();
    (0..site_count)
        .map(|site| {
            let ref_nuc = Nuc::ALL[site % 4];
            let calls = leaf_ids
                .iter()
                .enumerate()
                .filter(|(leaf, _)| (leaf + site) % 3 == 0)
                .map(|(leaf, id)| VariantCall::new(id, &[((leaf + site) % 4) as u8]))
                .collect();
            VariantSite::new("chr1", (site as u32) * 13 + 1, ref_nuc, calls)
        })
        .collect()
}

fn synthetic_sample(sites: &[VariantSite]) -> Vec<Mutation> {
    sites
        .iter()
        .enumerate()
        .filter(|(at, _)| at % 4 == 0)
        .map(|(at, site)| {
            let state = Nuc::ALL[(site.ref_nuc as usize + at % 3 + 1) % 4];
            Mutation::substitution(
                site.chrom.clone(),
                site.position,
                site.ref_nuc,
                site.ref_nuc,
                state,
            )
        })
        .collect()
}

fn annotated(tree: &Tree, sites: &[VariantSite]) -> MutationMap {
    let mut pending = PendingSamples::default();
    annotate_tree(tree, sites, &mut pending).unwrap()
}

fn annotation(criterion: &mut Criterion) {
    let tree = from_newick(&balanced_newick(7)).unwrap().pop().unwrap();
    let sites = synthetic_sites(&tree, 200);
    criterion.bench_function("annotate_128_leaves_200_sites", |bench| {
        bench.iter(|| black_box(annotated(&tree, &sites)))
    });
}

fn placement(criterion: &mut Criterion) {
    let tree = from_newick(&balanced_newick(7)).unwrap().pop().unwrap();
    let sites = synthetic_sites(&tree, 200);
    let map = annotated(&tree, &sites);
    let sample = synthetic_sample(&sites);
    criterion.bench_function("place_128_leaves_50_mutations", |bench| {
        bench.iter(|| black_box(place_sample(&tree, &map, &sample).unwrap()))
    });
}

criterion_group!(benches, annotation, placement);
criterion_main!(benches);
