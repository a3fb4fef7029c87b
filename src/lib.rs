pub mod errors;
pub mod context;
pub mod config;
pub mod rules;
mod comparison;

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::{debug, trace, warn};

pub use config::{Configuration, FlagSpec, RuleNode, RuleSet};
pub use context::Context;
pub use errors::{FlagError, Result};
pub use rules::{Rule, RuleRegistry};

/// The flag evaluator.
///
/// Holds a configuration, a rule registry and a default context.
/// [`Flags::with_context`] shares the configuration and registry with the
/// new instance, so rules added through either are seen by both;
/// [`Clone`] forks all three.
pub struct Flags {
    config: Arc<Configuration>,
    rules: Arc<RwLock<RuleRegistry>>,
    ctx: Context,
}

impl Flags {
    pub fn new(config: Configuration) -> Self {
        Self::with_parts(config, RuleRegistry::new(), Context::default())
    }

    pub fn with_parts(config: Configuration, rules: RuleRegistry, ctx: Context) -> Self {
        Self {
            config: Arc::new(config),
            rules: Arc::new(RwLock::new(rules)),
            ctx,
        }
    }

    /// Build from a parsed JSON configuration, rejecting malformed rule trees.
    pub fn from_value(config: Value) -> Result<Self> {
        Ok(Self::new(Configuration::from_value(config)?))
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Register `f` under `name`, replacing any rule of that name. Fails for
    /// the combinator names `or`, `and` and `not`.
    pub fn add_rule<F>(&self, name: impl Into<String>, f: F) -> Result<()>
    where
        F: Fn(&Value, &Context) -> Result<bool> + Send + Sync + 'static,
    {
        self.add_rule_arc(name, Arc::new(f))
    }

    pub fn add_rule_arc(&self, name: impl Into<String>, rule: Arc<dyn Rule>) -> Result<()> {
        let name = name.into();
        self.write_rules().register_arc(name.clone(), rule)?;
        debug!(rule = %name, "registered rule");
        Ok(())
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.read_rules().contains(name)
    }

    /// Whether `name` is on for the bound context.
    pub fn enabled(&self, name: &str) -> Result<bool> {
        self.enabled_for(name, &self.ctx)
    }

    /// Whether `name` is on for `ctx`. Unconfigured flags are off; errors
    /// raised by rule functions are returned as-is.
    pub fn enabled_for(&self, name: &str, ctx: &Context) -> Result<bool> {
        let Some(spec) = self.config.get(name) else {
            return Ok(false);
        };
        match spec {
            FlagSpec::Literal(b) => Ok(*b),
            FlagSpec::Rules(set) => self.any_passes(set, ctx),
        }
    }

    /// Like [`Flags::enabled`], but a failing rule reads as off.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled(name).unwrap_or_else(|e| {
            warn!(flag = name, error = %e, "flag evaluation failed, treating as disabled");
            false
        })
    }

    pub fn all_enabled(&self) -> Result<Vec<String>> {
        self.all_matching(&self.ctx, true)
    }

    pub fn all_enabled_for(&self, ctx: &Context) -> Result<Vec<String>> {
        self.all_matching(ctx, true)
    }

    pub fn all_disabled(&self) -> Result<Vec<String>> {
        self.all_matching(&self.ctx, false)
    }

    pub fn all_disabled_for(&self, ctx: &Context) -> Result<Vec<String>> {
        self.all_matching(ctx, false)
    }

    /// Configured flag names whose state under `ctx` equals `want`, in
    /// configuration order.
    pub fn all_matching(&self, ctx: &Context, want: bool) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for name in self.config.names() {
            if self.enabled_for(name, ctx)? == want {
                out.push(name.to_string());
            }
        }
        Ok(out)
    }

    /// A view bound to `ctx` that shares this instance's configuration and rules.
    pub fn with_context(&self, ctx: Context) -> Flags {
        Flags {
            config: Arc::clone(&self.config),
            rules: Arc::clone(&self.rules),
            ctx,
        }
    }

    /// Fork with any of the parts replaced; the rest are copied from `self`.
    pub fn clone_with(
        &self,
        config: Option<Configuration>,
        rules: Option<RuleRegistry>,
        ctx: Option<Context>,
    ) -> Flags {
        let config = config.unwrap_or_else(|| Configuration::clone(&self.config));
        let rules = rules.unwrap_or_else(|| self.read_rules().clone());
        let ctx = ctx.unwrap_or_else(|| self.ctx.clone());
        debug!(flags = config.len(), rules = rules.len(), "forked flags");
        Flags::with_parts(config, rules, ctx)
    }

    /// A rule set passes when any of its entries does, tried in order.
    fn any_passes(&self, set: &RuleSet, ctx: &Context) -> Result<bool> {
        for (name, node) in set.iter() {
            if self.test_rule(name, node, ctx)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // The registry guard is released before the rule runs, so a rule may
    // register rules or evaluate other flags through a shared view.
    fn test_rule(&self, name: &str, node: &RuleNode, ctx: &Context) -> Result<bool> {
        match node {
            RuleNode::Custom(arg) => {
                let rule = self.read_rules().get(name);
                match rule {
                    Some(rule) => {
                        let pass = rule.test(arg, ctx)?;
                        trace!(rule = name, pass, "tested rule");
                        Ok(pass)
                    }
                    None => {
                        debug!(rule = name, "unregistered rule evaluates to false");
                        Ok(false)
                    }
                }
            }
            RuleNode::Or(sets) => {
                for set in sets {
                    if self.any_passes(set, ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            RuleNode::And(sets) => {
                for set in sets {
                    if !self.any_passes(set, ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            RuleNode::Not(set) => Ok(!self.any_passes(set, ctx)?),
        }
    }

    // Registration never leaves the map half-written, so a poisoned lock is
    // still safe to use.
    fn read_rules(&self) -> RwLockReadGuard<'_, RuleRegistry> {
        self.rules.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_rules(&self) -> RwLockWriteGuard<'_, RuleRegistry> {
        self.rules.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clone for Flags {
    /// Independent copy: rules registered afterwards on either side stay
    /// local to it.
    fn clone(&self) -> Self {
        self.clone_with(None, None, None)
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flags")
            .field("config", &self.config)
            .field("rules", &*self.read_rules())
            .field("ctx", &self.ctx)
            .finish()
    }
}

/// Convenience: evaluate one flag of a JSON configuration against a JSON
/// context using the built-in rules.
pub fn enabled(config: Value, name: &str, ctx: Value) -> Result<bool> {
    let flags = Flags::with_parts(
        Configuration::from_value(config)?,
        RuleRegistry::with_builtins(),
        Context::from_value(ctx)?,
    );
    flags.enabled(name)
}
