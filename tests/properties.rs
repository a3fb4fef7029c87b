use feature_flag_rules::{Configuration, Context, FlagSpec, Flags, RuleRegistry, RuleNode, RuleSet};
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeSet;

fn spec() -> impl Strategy<Value = FlagSpec> {
    prop_oneof![
        any::<bool>().prop_map(FlagSpec::Literal),
        (0i64..5).prop_map(|n| FlagSpec::Rules(RuleSet::new().with("eq", RuleNode::custom(json!({ "n": n }))))),
        (0i64..5).prop_map(|n| {
            FlagSpec::Rules(RuleSet::new().with("not", RuleNode::Not(RuleSet::new().with("gt", RuleNode::custom(json!({ "n": n }))))))
        }),
    ]
}

fn flags_strategy() -> impl Strategy<Value = Flags> {
    prop::collection::btree_map("[a-z]{1,6}", spec(), 0..8).prop_map(|specs| {
        let config = specs
            .into_iter()
            .fold(Configuration::new(), |cfg, (name, spec)| cfg.with_flag(name, spec));
        Flags::with_parts(config, RuleRegistry::with_builtins(), Context::default())
    })
}

proptest! {
    #[test]
    fn absent_flags_are_disabled(flags in flags_strategy(), name in "[A-Z]{1,6}", n in 0i64..5) {
        prop_assert!(!flags.enabled_for(&name, &Context::new().with("n", n)).unwrap());
    }

    #[test]
    fn literal_flags_ignore_context(value: bool, n in any::<i64>()) {
        let flags = Flags::new(Configuration::new().with_flag("f", FlagSpec::Literal(value)));
        prop_assert_eq!(flags.enabled_for("f", &Context::new().with("n", n)).unwrap(), value);
    }

    #[test]
    fn enabled_and_disabled_partition_the_flags(flags in flags_strategy(), n in 0i64..5) {
        let ctx = Context::new().with("n", n);
        let on: BTreeSet<String> = flags.all_enabled_for(&ctx).unwrap().into_iter().collect();
        let off: BTreeSet<String> = flags.all_disabled_for(&ctx).unwrap().into_iter().collect();
        let all: BTreeSet<String> = flags.configuration().names().map(String::from).collect();
        prop_assert!(on.is_disjoint(&off));
        prop_assert_eq!(on.union(&off).cloned().collect::<BTreeSet<_>>(), all);
    }

    #[test]
    fn bound_context_matches_explicit(flags in flags_strategy(), n in 0i64..5) {
        let ctx = Context::new().with("n", n);
        let bound = flags.with_context(ctx.clone());
        prop_assert_eq!(bound.all_enabled().unwrap(), flags.all_enabled_for(&ctx).unwrap());
    }
}
