#[macro_export]
macro_rules! tree {
    ($e:expr) => {{
        use $crate::tree::tree_parser::from_newick;
        from_newick($e).unwrap().pop().unwrap()
    }};
}

#[macro_export]
macro_rules! sub {
    ($pos:expr, $r:ident => $m:ident) => {{
        use $crate::mutations::{Mutation, Nuc};
        Mutation::substitution("chr1".to_string(), $pos, Nuc::$r, Nuc::$r, Nuc::$m)
    }};
    ($pos:expr, $r:ident, $p:ident => $m:ident) => {{
        use $crate::mutations::{Mutation, Nuc};
        Mutation::substitution("chr1".to_string(), $pos, Nuc::$r, Nuc::$p, Nuc::$m)
    }};
}

#[macro_export]
macro_rules! ambig {
    ($pos:expr, $r:ident => [$($m:ident),+]) => {{
        use $crate::mutations::{Mutation, Nuc};
        Mutation::ambiguous("chr1".to_string(), $pos, Nuc::$r, vec![$(Nuc::$m),+])
    }};
}
