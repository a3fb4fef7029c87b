use feature_flag_rules::{Configuration, Context, Flags, RuleRegistry};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::mpsc;
use std::time::Duration;

fn base() -> Flags {
    let flags = Flags::from_value(json!({ "f": { "a": 1 }, "g": { "b": 1 }, "h": true })).unwrap();
    flags
        .add_rule("a", |_, ctx| Ok(ctx.get("x") == Some(&json!(1))))
        .unwrap();
    flags
}

#[test]
fn test_with_context_matches_explicit_context() {
    let flags = base();
    let ctx = Context::new().with("x", 1);
    let bound = flags.with_context(ctx.clone());
    for name in ["f", "g", "h", "missing"] {
        assert_eq!(bound.enabled(name).unwrap(), flags.enabled_for(name, &ctx).unwrap());
    }
    assert_eq!(bound.all_enabled().unwrap(), flags.all_enabled_for(&ctx).unwrap());
    assert_eq!(bound.context(), &ctx);
    assert!(flags.context().is_empty());
}

#[test]
fn test_with_context_shares_registry_both_ways() {
    let flags = base();
    let bound = flags.with_context(Context::new().with("x", 1));
    bound.add_rule("b", |_, _| Ok(true)).unwrap();
    assert!(flags.has_rule("b"));
    assert!(flags.enabled("g").unwrap());
}

#[test]
fn test_clone_behaves_like_parent() {
    let flags = base();
    let fork = flags.clone();
    let ctx = Context::new().with("x", 1);
    assert_eq!(fork.all_enabled_for(&ctx).unwrap(), flags.all_enabled_for(&ctx).unwrap());
    assert_eq!(fork.configuration(), flags.configuration());
}

#[test]
fn test_clone_forks_registry() {
    let flags = base();
    let fork = flags.clone();
    fork.add_rule("b", |_, _| Ok(true)).unwrap();
    assert!(fork.enabled("g").unwrap());
    assert!(!flags.has_rule("b"));
    assert!(!flags.enabled("g").unwrap());

    flags.add_rule("c", |_, _| Ok(true)).unwrap();
    assert!(!fork.has_rule("c"));
    // pre-existing rules are still available on both sides
    assert!(fork.has_rule("a"));
}

#[test]
fn test_clone_with_overrides() {
    let flags = base();
    let fork = flags.clone_with(
        Some(Configuration::from_value(json!({ "only": { "eq": { "x": 2 } } })).unwrap()),
        Some(RuleRegistry::with_builtins()),
        Some(Context::new().with("x", 2)),
    );
    assert_eq!(fork.all_enabled().unwrap(), vec!["only"]);
    assert!(!fork.has_rule("a"));
    assert_eq!(flags.configuration().len(), 3);

    let same_rules = flags.clone_with(None, None, Some(Context::new().with("x", 1)));
    assert!(same_rules.enabled("f").unwrap());
}

#[test]
fn test_flags_are_shareable_across_threads() {
    let flags = std::sync::Arc::new(base().with_context(Context::new().with("x", 1)));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let flags = flags.clone();
            std::thread::spawn(move || flags.enabled("f").unwrap())
        })
        .collect();
    for h in handles {
        assert!(h.join().unwrap());
    }
}

#[test]
fn test_rule_can_register_rules_while_evaluating() {
    let flags = Flags::from_value(json!({ "f": { "lazy": 1 }, "g": { "other": 1 } })).unwrap();
    let view = flags.with_context(Context::new());
    flags
        .add_rule("lazy", move |_, _| {
            view.add_rule("other", |_, _| Ok(true))?;
            Ok(true)
        })
        .unwrap();

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let first = flags.enabled("f").unwrap();
        let second = flags.enabled("g").unwrap();
        tx.send((first, second)).unwrap();
    });
    let (first, second) = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("evaluation did not finish");
    assert!(first);
    assert!(second);
}

#[test]
fn test_rule_can_evaluate_other_flags() {
    let flags = Flags::from_value(json!({
        "base": { "a": 1 },
        "composite": { "flag": "base" }
    }))
    .unwrap();
    flags
        .add_rule("a", |_, ctx| Ok(ctx.get("x") == Some(&json!(1))))
        .unwrap();
    let view = flags.with_context(Context::new());
    flags
        .add_rule("flag", move |arg, ctx| {
            let name = arg.as_str().unwrap_or_default();
            view.enabled_for(name, ctx)
        })
        .unwrap();

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let on = flags.enabled_for("composite", &Context::new().with("x", 1)).unwrap();
        let off = flags.enabled_for("composite", &Context::new().with("x", 2)).unwrap();
        tx.send((on, off)).unwrap();
    });
    let (on, off) = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("evaluation did not finish");
    assert!(on);
    assert!(!off);
}
