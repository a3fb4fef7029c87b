//! Flag configuration: the validated rule trees the evaluator walks.
//!
//! A configuration maps flag names to a [`FlagSpec`], either a literal
//! boolean or a [`RuleSet`]. Rule sets map rule names to [`RuleNode`]s; the
//! names `or`, `and` and `not` are parsed as combinators, every other name
//! carries the argument handed to the registered rule of that name.
//!
//! ```
//! use feature_flag_rules::config::Configuration;
//! use serde_json::json;
//!
//! let cfg = Configuration::from_value(json!({
//!     "dark_mode": true,
//!     "beta": { "or": [{ "eq": { "plan": "pro" } }, { "not": { "eq": { "region": "eu" } } }] }
//! })).unwrap();
//! assert_eq!(cfg.len(), 2);
//! ```

use crate::errors::{FlagError, Result};
use crate::rules::{AND, NOT, OR};
use indexmap::IndexMap;
use itertools::Itertools;
use serde_json::{Map, Value};

pub const DEFAULT_FEATURE_PREFIX: &str = "feature_";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    flags: IndexMap<String, FlagSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlagSpec {
    Literal(bool),
    Rules(RuleSet),
}

/// Rules tested as an implicit OR, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    entries: IndexMap<String, RuleNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleNode {
    Or(Vec<RuleSet>),
    And(Vec<RuleSet>),
    Not(RuleSet),
    /// Argument for a registered rule.
    Custom(Value),
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate an already-parsed configuration object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Self::from_map(map),
            Value::Null => Ok(Self::default()),
            other => Err(config_error("", &[], format!("expected an object, got {other}"))),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Result<Self> {
        let flags = map
            .into_iter()
            .map(|(name, spec)| {
                let spec = parse_flag(&name, spec)?;
                Ok((name, spec))
            })
            .collect::<Result<IndexMap<_, _>>>()?;
        Ok(Self { flags })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Keep only `feature_`-prefixed keys (see [`parse_prefixed`]), then validate.
    pub fn from_prefixed(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Self::from_map(parse_prefixed(&map)),
            other => Self::from_value(other),
        }
    }

    pub fn with_flag(mut self, name: impl Into<String>, spec: FlagSpec) -> Self {
        self.flags.insert(name.into(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FlagSpec> {
        self.flags.get(name)
    }

    /// Flag names in configuration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.flags.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlagSpec)> {
        self.flags.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

impl TryFrom<Value> for Configuration {
    type Error = FlagError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<bool> for FlagSpec {
    fn from(b: bool) -> Self {
        FlagSpec::Literal(b)
    }
}

impl From<RuleSet> for FlagSpec {
    fn from(set: RuleSet) -> Self {
        FlagSpec::Rules(set)
    }
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, node: RuleNode) -> Self {
        self.entries.insert(name.into(), node);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuleNode)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RuleNode {
    pub fn custom(arg: impl Into<Value>) -> Self {
        RuleNode::Custom(arg.into())
    }
}

fn parse_flag(flag: &str, spec: Value) -> Result<FlagSpec> {
    match spec {
        Value::Bool(b) => Ok(FlagSpec::Literal(b)),
        Value::Null => Ok(FlagSpec::Literal(false)),
        Value::Object(map) => Ok(FlagSpec::Rules(parse_rule_set(flag, &mut Vec::new(), map)?)),
        other => Err(config_error(
            flag,
            &[],
            format!("expected a boolean or a rule object, got {other}"),
        )),
    }
}

fn parse_rule_set(flag: &str, path: &mut Vec<String>, map: Map<String, Value>) -> Result<RuleSet> {
    let mut entries = IndexMap::with_capacity(map.len());
    for (name, arg) in map {
        path.push(name.clone());
        let node = parse_rule_node(flag, path, &name, arg)?;
        path.pop();
        entries.insert(name, node);
    }
    Ok(RuleSet { entries })
}

fn parse_rule_node(flag: &str, path: &mut Vec<String>, name: &str, arg: Value) -> Result<RuleNode> {
    match name {
        OR | AND => {
            let Value::Array(items) = arg else {
                return Err(config_error(flag, path, format!("`{name}` expects an array of rule objects")));
            };
            let mut sets = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                path.push(i.to_string());
                let Value::Object(map) = item else {
                    return Err(config_error(flag, path, format!("`{name}` entries must be rule objects")));
                };
                sets.push(parse_rule_set(flag, path, map)?);
                path.pop();
            }
            Ok(if name == OR { RuleNode::Or(sets) } else { RuleNode::And(sets) })
        }
        NOT => match arg {
            Value::Object(map) => Ok(RuleNode::Not(parse_rule_set(flag, path, map)?)),
            _ => Err(config_error(flag, path, "`not` expects a rule object")),
        },
        _ => Ok(RuleNode::Custom(arg)),
    }
}

fn config_error(flag: &str, path: &[String], message: impl Into<String>) -> FlagError {
    let path = if path.is_empty() {
        "<root>".to_string()
    } else {
        path.iter().join(".")
    };
    FlagError::Config {
        flag: flag.to_string(),
        path,
        message: message.into(),
    }
}

/// Default key parser for [`parse_prefixed`]: lowercases the key and keeps
/// it only when it starts with `feature_`, which is stripped.
pub fn default_key_parser(key: &str, value: &Value) -> Option<(String, Value)> {
    let lower = key.to_lowercase();
    lower
        .strip_prefix(DEFAULT_FEATURE_PREFIX)
        .map(|name| (name.to_string(), value.clone()))
}

/// Filter a raw settings object down to feature flags using
/// [`default_key_parser`].
pub fn parse_prefixed(raw: &Map<String, Value>) -> Map<String, Value> {
    parse_prefixed_with(raw, default_key_parser)
}

/// Like [`parse_prefixed`] with a caller-supplied key parser. Returning
/// `None` drops the entry; later keys overwrite earlier ones that parse to
/// the same name.
pub fn parse_prefixed_with<F>(raw: &Map<String, Value>, parse: F) -> Map<String, Value>
where
    F: Fn(&str, &Value) -> Option<(String, Value)>,
{
    raw.iter()
        .filter_map(|(key, value)| parse(key, value))
        .collect()
}
