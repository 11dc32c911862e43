use assert_matches::assert_matches;
use rstest::rstest;

use crate::mutations::{Mutation, MutationMap, Nuc, PendingSamples, VariantCall};

#[rstest]
#[case(b'A', Some(Nuc::A))]
#[case(b'c', Some(Nuc::C))]
#[case(b'G', Some(Nuc::G))]
#[case(b't', Some(Nuc::T))]
#[case(b'N', None)]
#[case(b'-', None)]
fn nuc_from_byte(#[case] byte: u8, #[case] expected: Option<Nuc>) {
    assert_eq!(Nuc::from_byte(byte), expected);
}

#[test]
fn nuc_from_code() {
    assert_eq!(Nuc::from_code(0), Some(Nuc::A));
    assert_eq!(Nuc::from_code(3), Some(Nuc::T));
    assert_eq!(Nuc::from_code(4), None);
    assert_eq!(Nuc::from_code(255), None);
}

#[test]
fn substitution_record() {
    let m = sub!(500, A => G);
    assert_eq!(m.state(), Nuc::G);
    assert!(!m.is_ambiguous());
    assert!(!m.is_missing);
    assert!(m.explains(Nuc::G));
    assert!(!m.explains(Nuc::A));
    assert_eq!(m.to_string(), "A500G");
}

#[test]
fn ambiguous_record() {
    let m = ambig!(120, A => [C, G]);
    assert!(m.is_ambiguous());
    assert_eq!(m.state(), Nuc::C);
    assert!(m.explains(Nuc::G));
    assert!(!m.explains(Nuc::T));
    assert_eq!(m.to_string(), "A120CG");
}

#[test]
fn missing_record() {
    let m = Mutation::missing("chr1".to_string(), 42, Nuc::T);
    assert!(m.is_missing);
    assert!(!m.is_ambiguous());
    assert_eq!(m.mut_nuc.len(), 4);
    assert!(m.explains(Nuc::A));
    assert_eq!(m.to_string(), "T42N");
}

#[test]
fn variant_call_resolves_raw_codes() {
    let call = VariantCall::new("sample1", &[2, 4, 1, 7]);
    assert_eq!(call.resolved(), vec![Nuc::G, Nuc::C]);
    let call = VariantCall::new("sample2", &[5, 6]);
    assert!(call.resolved().is_empty());
}

#[test]
fn mutation_map_keeps_positions_sorted() {
    let mut map = MutationMap::new(3);
    map.insert(1, sub!(300, A => G));
    map.insert(1, sub!(100, C => T));
    map.insert(1, sub!(200, G => A));
    let positions: Vec<u32> = map.node(1).iter().map(|m| m.position).collect();
    assert_eq!(positions, vec![100, 200, 300]);
    assert!(map.node(0).is_empty());
    assert_eq!(map.mutation_count(), 3);
}

#[test]
fn mutation_map_one_entry_per_position() {
    let mut map = MutationMap::new(2);
    map.insert(0, sub!(100, A => G));
    map.insert(0, sub!(100, A => T));
    assert_eq!(map.node(0).len(), 1);
    assert_eq!(map.node(0)[0].state(), Nuc::T);
}

#[test]
fn mutation_map_iterates_annotated_nodes() {
    let mut map = MutationMap::new(4);
    map.insert(0, sub!(10, A => C));
    map.insert(3, sub!(20, A => G));
    let annotated: Vec<usize> = map.iter().map(|(idx, _)| idx).collect();
    assert_eq!(annotated, vec![0, 3]);
}

#[test]
fn pending_samples_lookup() {
    let pending = PendingSamples::new(&["S1", "S2"]);
    assert_eq!(pending.len(), 2);
    assert_eq!(pending.idx("S2"), Some(1));
    assert_eq!(pending.idx("S3"), None);
    assert!(pending.contains("S1"));
    assert_eq!(pending.name(0), "S1");
}

#[test]
fn pending_samples_sorted_accumulation() {
    let mut pending = PendingSamples::new(&["S1"]);
    pending.add_mutation("S1", sub!(900, A => T)).unwrap();
    pending.add_mutation("S1", sub!(100, A => C)).unwrap();
    pending
        .add_mutation("S1", Mutation::missing("chr1".to_string(), 500, Nuc::G))
        .unwrap();
    let positions: Vec<u32> = pending.mutations(0).iter().map(|m| m.position).collect();
    assert_eq!(positions, vec![100, 500, 900]);
}

#[test]
fn pending_samples_unknown_name() {
    let mut pending = PendingSamples::new(&["S1"]);
    assert_matches!(pending.add_mutation("S2", sub!(100, A => C)), Err(_));
}
