//! `param`/`paramauto`: the deferred-evaluation containers built on top of [`Container`].
//!
//! A [`Param`] stores raw, possibly-unevaluated entries (most commonly [`Value::Str`]
//! formulas) and evaluates them once, in insertion order, each key seeing only the keys
//! already evaluated before it. [`ParamAuto`] relaxes that ordering constraint: it first
//! derives a dependency graph from what each formula references and evaluates in topological
//! order instead, so a key may reference one declared after it in the container.

use crate::container::{Container, ContainerError, IndexSpec, Value};
use crate::error::Error;
use crate::expr::{self, EvalConfig, Namespace};
use indexmap::IndexMap;

struct EvaluatedNamespace<'a> {
    evaluated: &'a IndexMap<String, Value>,
}

impl Namespace for EvaluatedNamespace<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.evaluated.get(name).cloned()
    }
}

/// Evaluates one key's raw value against the keys evaluated so far, honoring
/// `cfg.debug`: outside debug mode a caught
/// error becomes an inline [`Value::Error`] marker instead of aborting the whole pass.
fn eval_one(key: &str, raw: &Value, evaluated: &IndexMap<String, Value>, cfg: &EvalConfig) -> Result<Value, Error> {
    let ns = EvaluatedNamespace { evaluated };
    eval_value(key, raw, &ns, cfg)
}

/// Evaluates a single raw value. A list is not a scalar formula: each element is evaluated
/// independently (and recursively, for nested lists) rather than the list being passed through
/// verbatim.
fn eval_value(key: &str, raw: &Value, ns: &EvaluatedNamespace<'_>, cfg: &EvalConfig) -> Result<Value, Error> {
    match raw {
        Value::Str(s) => match expr::interpolate(s, ns, cfg) {
            Ok(v) => Ok(v),
            Err(e) if cfg.debug => Err(Error::General(format!("error evaluating '{key}': {e}"))),
            Err(e) => Ok(Value::Error(e.to_string())),
        },
        Value::List(items) => {
            let evaluated =
                items.iter().map(|item| eval_value(key, item, ns, cfg)).collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(evaluated))
        }
        other => Ok(other.clone()),
    }
}

/// The insertion-ordered deferred-evaluation container.
#[derive(Debug, Clone, Default)]
pub struct Param {
    raw: Container,
    cfg: EvalConfig,
}

impl Param {
    /// Creates an empty param with the default evaluation policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty param with an explicit evaluation policy.
    #[must_use]
    pub fn with_config(cfg: EvalConfig) -> Self {
        Self { raw: Container::new(), cfg }
    }

    /// Builds a param from an already-ordered mapping of raw (possibly unevaluated) entries.
    #[must_use]
    pub fn from_mapping(entries: IndexMap<String, Value>, cfg: EvalConfig) -> Self {
        Self { raw: Container::from_mapping(entries), cfg }
    }

    /// The evaluation policy in effect.
    #[must_use]
    pub fn config(&self) -> EvalConfig {
        self.cfg
    }

    /// Overrides the evaluation policy.
    pub fn set_config(&mut self, cfg: EvalConfig) {
        self.cfg = cfg;
    }

    /// Attribute-style write of a raw (unevaluated) entry.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), ContainerError> {
        self.raw.set(key, value)
    }

    /// Attribute-style read of the raw (unevaluated) entry.
    pub fn get_raw(&self, key: &str) -> Result<&Value, ContainerError> {
        self.raw.get(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.raw.keys()
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// True if there are no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Evaluates every key in insertion order, each one seeing only the keys evaluated
    /// before it.
    pub fn eval(&self) -> Result<Container, Error> {
        let mut evaluated = IndexMap::new();
        for (key, raw) in self.raw.iter() {
            let value = eval_one(key, raw, &evaluated, &self.cfg)?;
            evaluated.insert(key.to_string(), value);
        }
        Ok(Container::from_mapping(evaluated))
    }

    /// Evaluates and freezes the result as a new, fully static [`Param`].
    pub fn tostatic(&self) -> Result<Self, Error> {
        Ok(Self { raw: self.eval()?, cfg: self.cfg })
    }

    /// Evaluates and returns a plain ordered mapping.
    pub fn todict(&self) -> Result<IndexMap<String, Value>, Error> {
        Ok(self.eval()?.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    /// Converts to the topologically-ordered [`ParamAuto`] variant, keeping the raw entries
    /// and evaluation policy.
    #[must_use]
    pub fn toparamauto(&self) -> ParamAuto {
        ParamAuto { raw: self.raw.clone(), cfg: self.cfg }
    }

    /// `A ⊕= B` at the raw-entry level: merges `other`'s raw entries in, right-wins.
    pub fn update(&mut self, other: &Self) {
        self.raw.merge_in_place(&other.raw);
    }

    /// Sub-selection by index/key list, over the raw entries.
    pub fn select(&self, specs: &[IndexSpec]) -> Result<Self, ContainerError> {
        Ok(Self { raw: self.raw.select(specs)?, cfg: self.cfg })
    }

    /// Persists the raw (unevaluated) entries to disk.
    pub fn write(&self, path: impl AsRef<std::path::Path>) -> Result<(), ContainerError> {
        self.raw.write(path)
    }

    /// Reconstructs a param from the format written by [`Param::write`], with the default
    /// evaluation policy.
    pub fn read(path: impl AsRef<std::path::Path>) -> Result<Self, ContainerError> {
        Ok(Self { raw: Container::read(path)?, cfg: EvalConfig::default() })
    }
}

/// The dependency-ordered variant of [`Param`]: evaluation order follows what each formula references rather than insertion
/// order, so a key may reference one declared after it.
///
/// A genuine circular dependency does not abort the pass: every key in the cycle fails
/// independently with a `<Error: circular dependency …>` marker, and evaluation of the rest
/// of the container continues.
#[derive(Debug, Clone, Default)]
pub struct ParamAuto {
    raw: Container,
    cfg: EvalConfig,
}

impl ParamAuto {
    /// Creates an empty paramauto with the default evaluation policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty paramauto with an explicit evaluation policy.
    #[must_use]
    pub fn with_config(cfg: EvalConfig) -> Self {
        Self { raw: Container::new(), cfg }
    }

    /// The evaluation policy in effect.
    #[must_use]
    pub fn config(&self) -> EvalConfig {
        self.cfg
    }

    /// Attribute-style write of a raw (unevaluated) entry.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), ContainerError> {
        self.raw.set(key, value)
    }

    /// Keys in declaration order (not evaluation order).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.raw.keys()
    }

    /// Converts back to the insertion-ordered [`Param`] variant, keeping the raw entries and
    /// evaluation policy.
    #[must_use]
    pub fn toparam(&self) -> Param {
        Param { raw: self.raw.clone(), cfg: self.cfg }
    }

    /// Computes a topological evaluation order over the declared keys from the names each
    /// formula references, via Kahn's algorithm. Keys involved in a cycle come last, in
    /// declaration order, flagged in the returned set.
    fn evaluation_order(&self) -> (Vec<String>, std::collections::HashSet<String>) {
        let keys: Vec<String> = self.raw.keys().map(str::to_string).collect();
        let key_set: std::collections::HashSet<&str> = keys.iter().map(String::as_str).collect();

        let mut dependents: IndexMap<&str, Vec<&str>> = IndexMap::new();
        let mut indegree: IndexMap<&str, usize> = keys.iter().map(|k| (k.as_str(), 0)).collect();

        for key in &keys {
            let raw = self.raw.try_get(key).expect("key came from raw.keys()");
            let refs: Vec<&str> = match raw {
                Value::Str(s) => expr::referenced_names(s)
                    .into_iter()
                    .filter(|n| key_set.contains(n.as_str()) && n != key)
                    .map(|n| *key_set.get(n.as_str()).expect("membership checked"))
                    .collect(),
                _ => Vec::new(),
            };
            for dep in &refs {
                dependents.entry(*dep).or_default().push(key.as_str());
            }
            *indegree.get_mut(key.as_str()).expect("key present") = refs.len();
        }

        let mut queue: std::collections::VecDeque<&str> =
            keys.iter().map(String::as_str).filter(|k| indegree[k] == 0).collect();
        let mut order: Vec<String> = Vec::with_capacity(keys.len());
        let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();

        while let Some(k) = queue.pop_front() {
            if !seen.insert(k) {
                continue;
            }
            order.push(k.to_string());
            if let Some(ds) = dependents.get(k) {
                for d in ds {
                    let e = indegree.get_mut(d).expect("dependent key present");
                    *e = e.saturating_sub(1);
                    if *e == 0 {
                        queue.push_back(*d);
                    }
                }
            }
        }

        let cyclic: std::collections::HashSet<String> =
            keys.iter().filter(|k| !seen.contains(k.as_str())).cloned().collect();
        for k in &keys {
            if cyclic.contains(k) {
                order.push(k.clone());
            }
        }
        (order, cyclic)
    }

    /// Evaluates every key in dependency order.
    pub fn eval(&self) -> Result<Container, Error> {
        let (order, cyclic) = self.evaluation_order();
        let mut evaluated = IndexMap::new();
        for key in order {
            if cyclic.contains(&key) {
                let msg = format!("circular dependency involving '{key}'");
                if self.cfg.debug {
                    return Err(Error::General(msg));
                }
                evaluated.insert(key, Value::Error(msg));
                continue;
            }
            let raw = self.raw.try_get(&key).expect("key came from evaluation_order");
            let value = eval_one(&key, raw, &evaluated, &self.cfg)?;
            evaluated.insert(key, value);
        }
        // Restore declaration order in the result container.
        let declared: IndexMap<String, Value> = self
            .raw
            .keys()
            .map(|k| (k.to_string(), evaluated.shift_remove(k).unwrap_or(Value::Empty)))
            .collect();
        Ok(Container::from_mapping(declared))
    }

    /// Evaluates and returns a plain ordered mapping (in declaration order).
    pub fn todict(&self) -> Result<IndexMap<String, Value>, Error> {
        Ok(self.eval()?.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }
}

/// Evaluates `defs ⊕ user` (USER always wins over DEFINITIONS) and substitutes the
/// result into `template`'s `${…}` placeholders.
///
/// Shared by [`crate::forcefield`] (style templates) and [`crate::script`] (`TEMPLATE`
/// rendering) — both reduce to "merge two Evaluators, then interpolate a line of text
/// against the merged, evaluated result".
pub fn render_template(template: &str, defs: &Param, user: &Param) -> Result<String, Error> {
    let mut merged = defs.clone();
    merged.update(user);
    let resolved = merged.eval()?;
    expr::interpolate(template, &resolved, &merged.cfg)
        .map(|v| v.render())
        .map_err(|e| Error::General(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_sees_only_earlier_keys() {
        let mut p = Param::new();
        p.set("a", Value::Int(2)).unwrap();
        p.set("b", Value::Str("${a * 3}".to_string())).unwrap();
        let result = p.eval().unwrap();
        assert_eq!(*result.get("b").unwrap(), Value::Int(6));
    }

    #[test]
    fn insertion_order_fails_forward_reference() {
        let mut p = Param::new();
        p.set("a", Value::Str("${b + 1}".to_string())).unwrap();
        p.set("b", Value::Int(1)).unwrap();
        let result = p.eval().unwrap();
        assert!(result.get("a").unwrap().is_error());
    }

    #[test]
    fn paramauto_resolves_forward_reference() {
        let mut p = ParamAuto::new();
        p.set("a", Value::Str("${b + 1}".to_string())).unwrap();
        p.set("b", Value::Int(1)).unwrap();
        let result = p.eval().unwrap();
        assert_eq!(*result.get("a").unwrap(), Value::Int(2));
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn paramauto_cycle_becomes_per_key_error() {
        let mut p = ParamAuto::new();
        p.set("a", Value::Str("${b + 1}".to_string())).unwrap();
        p.set("b", Value::Str("${a + 1}".to_string())).unwrap();
        let result = p.eval().unwrap();
        assert!(result.get("a").unwrap().is_error());
        assert!(result.get("b").unwrap().is_error());
    }

    #[test]
    fn debug_mode_propagates_instead_of_masking() {
        let mut p = Param::with_config(EvalConfig { debug: true, ..EvalConfig::default() });
        p.set("a", Value::Str("${missing}".to_string())).unwrap();
        assert!(p.eval().is_err());
    }

    #[test]
    fn list_entries_evaluate_each_element() {
        let mut p = Param::new();
        p.set("a", Value::Int(2)).unwrap();
        p.set(
            "b",
            Value::List(vec![Value::Str("${a + 1}".to_string()), Value::Str("${a * 2}".to_string())]),
        )
        .unwrap();
        let result = p.eval().unwrap();
        assert_eq!(*result.get("b").unwrap(), Value::List(vec![Value::Int(3), Value::Int(4)]));
    }
}
