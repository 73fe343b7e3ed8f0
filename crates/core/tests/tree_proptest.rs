//! Property tests for the tree merge and set/unset laws.

use kvtree_core::Tree;
use proptest::prelude::*;

const KEY: &str = "[a-zA-Z0-9_.]{1,6}";

// keys that can never collide with the ones above
const FRESH_KEY: &str = "#[a-z0-9]{1,6}";

fn arb_tree() -> impl Strategy<Value = Tree> {
    let leaf = prop::collection::vec(KEY, 0..4).prop_map(|keys| {
        let mut t = Tree::new();
        for k in keys {
            t.set(&k, Tree::new());
        }
        t
    });
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop::collection::vec((KEY, inner), 0..4).prop_map(|pairs| {
            let mut t = Tree::new();
            for (k, sub) in pairs {
                t.set(&k, sub);
            }
            t
        })
    })
}

proptest! {
    #[test]
    fn merge_disjoint_adds_sizes(a in arb_tree(), b in arb_tree()) {
        let mut left = Tree::new();
        left.set("L", a);
        let mut right = Tree::new();
        right.set("R", b.clone());
        left.merge(&right);
        prop_assert_eq!(left.size(), 2);
        prop_assert_eq!(left.get("R").unwrap(), &b);
    }

    #[test]
    fn merge_is_idempotent(a in arb_tree()) {
        let mut merged = a.clone();
        merged.merge(&a);
        prop_assert_eq!(merged, a);
    }

    #[test]
    fn merge_into_empty_copies(a in arb_tree()) {
        let mut merged = Tree::new();
        merged.merge(&a);
        prop_assert_eq!(merged, a);
    }

    #[test]
    fn unset_undoes_set_of_fresh_key(base in arb_tree(), key in FRESH_KEY, sub in arb_tree()) {
        let mut t = base.clone();
        t.set(&key, sub.clone());
        prop_assert_eq!(t.size(), base.size() + 1);
        prop_assert_eq!(t.get(&key), Some(&sub));

        t.unset(&key);
        prop_assert_eq!(t, base);
    }

    #[test]
    fn unset_kv_undoes_set_kv_of_fresh_key(base in arb_tree(), key in FRESH_KEY, val in KEY) {
        let mut t = base.clone();
        t.set_kv(&key, &val);
        prop_assert!(t.get_kv(&key, &val).is_some());

        t.unset_kv(&key, &val);
        prop_assert_eq!(t, base);
    }

    #[test]
    fn extract_returns_what_was_set(base in arb_tree(), key in FRESH_KEY, sub in arb_tree()) {
        let mut t = base.clone();
        t.set(&key, sub.clone());
        prop_assert_eq!(t.extract(&key), Some(sub));
        prop_assert_eq!(t, base);
    }
}
