use crate::context::Context;
use crate::errors::{FlagError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const OR: &str = "or";
pub const AND: &str = "and";
pub const NOT: &str = "not";

/// Names interpreted as combinators rather than registered rules.
pub const RESERVED: [&str; 3] = [OR, AND, NOT];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

/// A named predicate over the evaluation context.
///
/// `arg` is the value configured under the rule's name, e.g. `{"plan": "pro"}`
/// for `{"eq": {"plan": "pro"}}`. Closures of the same shape implement this.
pub trait Rule: Send + Sync {
    fn test(&self, arg: &Value, ctx: &Context) -> Result<bool>;
}

impl<F> Rule for F
where
    F: Fn(&Value, &Context) -> Result<bool> + Send + Sync,
{
    fn test(&self, arg: &Value, ctx: &Context) -> Result<bool> {
        self(arg, ctx)
    }
}

/// Rule functions by name. Cloning copies the map; the rule functions
/// themselves are shared.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    inner: HashMap<String, Arc<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the attribute rules in [`builtins`].
    pub fn with_builtins() -> Self {
        let mut map: HashMap<String, Arc<dyn Rule>> = HashMap::new();
        map.insert("eq".into(), Arc::new(builtins::Compare::Eq));
        map.insert("ne".into(), Arc::new(builtins::Compare::Ne));
        map.insert("gt".into(), Arc::new(builtins::Compare::Gt));
        map.insert("gte".into(), Arc::new(builtins::Compare::Gte));
        map.insert("lt".into(), Arc::new(builtins::Compare::Lt));
        map.insert("lte".into(), Arc::new(builtins::Compare::Lte));
        map.insert("in".into(), Arc::new(builtins::OneOf));
        map.insert("starts_with".into(), Arc::new(builtins::StartsWith));
        map.insert("ends_with".into(), Arc::new(builtins::EndsWith));
        map.insert("present".into(), Arc::new(builtins::Present));
        Self { inner: map }
    }

    /// Register `rule` under `name`, replacing any previous rule of that name.
    pub fn register<R: Rule + 'static>(&mut self, name: impl Into<String>, rule: R) -> Result<()> {
        self.register_arc(name, Arc::new(rule))
    }

    /// Register a closure `|arg, ctx| -> Result<bool>`.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F) -> Result<()>
    where
        F: Fn(&Value, &Context) -> Result<bool> + Send + Sync + 'static,
    {
        self.register_arc(name, Arc::new(f))
    }

    pub fn register_arc(&mut self, name: impl Into<String>, rule: Arc<dyn Rule>) -> Result<()> {
        let name = name.into();
        if is_reserved(&name) {
            return Err(FlagError::ReservedRule(name));
        }
        self.inner.insert(name, rule);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Rule>> {
        self.inner.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("RuleRegistry").field("rules", &names).finish()
    }
}

/// Attribute rules over context paths.
///
/// Each takes an object of `path → operand` and passes only when every entry
/// holds, so `{"eq": {"plan": "pro", "beta": true}}` needs both. Paths are
/// resolved with [`Context::lookup`]; a missing attribute never passes.
pub mod builtins {
    use super::*;
    use crate::comparison::{compare, equals, truthy};
    use serde_json::Map;
    use std::cmp::Ordering;

    fn entries<'a>(rule: &str, arg: &'a Value) -> Result<&'a Map<String, Value>> {
        arg.as_object()
            .ok_or_else(|| FlagError::rule(rule, format!("expected an object of attribute paths, got {arg}")))
    }

    #[derive(Debug, Clone, Copy)]
    pub enum Compare {
        Eq,
        Ne,
        Gt,
        Gte,
        Lt,
        Lte,
    }

    impl Compare {
        fn name(self) -> &'static str {
            match self {
                Compare::Eq => "eq",
                Compare::Ne => "ne",
                Compare::Gt => "gt",
                Compare::Gte => "gte",
                Compare::Lt => "lt",
                Compare::Lte => "lte",
            }
        }

        fn holds(self, ord: Option<Ordering>) -> bool {
            match (self, ord) {
                (Compare::Ne, ord) => ord != Some(Ordering::Equal),
                (_, None) => false,
                (Compare::Eq, Some(o)) => o.is_eq(),
                (Compare::Gt, Some(o)) => o.is_gt(),
                (Compare::Gte, Some(o)) => o.is_ge(),
                (Compare::Lt, Some(o)) => o.is_lt(),
                (Compare::Lte, Some(o)) => o.is_le(),
            }
        }
    }

    impl Rule for Compare {
        fn test(&self, arg: &Value, ctx: &Context) -> Result<bool> {
            Ok(entries(self.name(), arg)?.iter().all(|(path, expected)| {
                ctx.lookup(path)
                    .is_some_and(|actual| self.holds(compare(actual, expected)))
            }))
        }
    }

    /// `{"in": {"country": ["us", "ca"]}}`
    pub struct OneOf;
    impl Rule for OneOf {
        fn test(&self, arg: &Value, ctx: &Context) -> Result<bool> {
            let mut pass = true;
            for (path, options) in entries("in", arg)? {
                let options = options
                    .as_array()
                    .ok_or_else(|| FlagError::rule("in", format!("`{path}` expects an array of values")))?;
                pass &= ctx
                    .lookup(path)
                    .is_some_and(|actual| options.iter().any(|o| equals(actual, o)));
            }
            Ok(pass)
        }
    }

    pub struct StartsWith;
    impl Rule for StartsWith {
        fn test(&self, arg: &Value, ctx: &Context) -> Result<bool> {
            affix("starts_with", arg, ctx, |s, p| s.starts_with(p))
        }
    }

    pub struct EndsWith;
    impl Rule for EndsWith {
        fn test(&self, arg: &Value, ctx: &Context) -> Result<bool> {
            affix("ends_with", arg, ctx, |s, p| s.ends_with(p))
        }
    }

    fn affix(rule: &str, arg: &Value, ctx: &Context, f: impl Fn(&str, &str) -> bool) -> Result<bool> {
        let mut pass = true;
        for (path, pattern) in entries(rule, arg)? {
            let pattern = pattern
                .as_str()
                .ok_or_else(|| FlagError::rule(rule, format!("`{path}` expects a string")))?;
            pass &= ctx
                .lookup(path)
                .and_then(Value::as_str)
                .is_some_and(|s| f(s, pattern));
        }
        Ok(pass)
    }

    /// `{"present": "user.email"}` or `{"present": ["a", "b"]}`: every path
    /// resolves to a truthy value.
    pub struct Present;
    impl Rule for Present {
        fn test(&self, arg: &Value, ctx: &Context) -> Result<bool> {
            let present = |path: &str| ctx.lookup(path).is_some_and(truthy);
            match arg {
                Value::String(path) => Ok(present(path.as_str())),
                Value::Array(paths) => {
                    let mut pass = true;
                    for p in paths {
                        let p = p
                            .as_str()
                            .ok_or_else(|| FlagError::rule("present", format!("expected a path string, got {p}")))?;
                        pass &= present(p);
                    }
                    Ok(pass)
                }
                other => Err(FlagError::rule(
                    "present",
                    format!("expected a path or an array of paths, got {other}"),
                )),
            }
        }
    }
}
