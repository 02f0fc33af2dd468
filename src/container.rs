//! The structured container: an ordered key → value store with
//! attribute-style access, concat/slice/update operators, and disk round-tripping.
//!
//! [`Value`] is the single dynamic value type shared by [`Container`] and the expression
//! evaluator in [`crate::expr`] — scalars, lists, tuples, mappings, and numeric arrays all
//! live here so that a fully evaluated [`crate::param::Param`] can be read back out as a
//! plain `Container`.

use indexmap::IndexMap;
use ndarray::ArrayD;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors specific to [`Container`] operations.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// `set` was called with a key that is not a valid identifier.
    #[error("'{0}' is not a valid identifier")]
    InvalidKey(String),
    /// `get`/indexing referenced a key that does not exist.
    #[error("no such key: '{0}'")]
    MissingKey(String),
    /// A positional index was out of bounds.
    #[error("index {0} out of range for container of length {1}")]
    IndexOutOfRange(i64, usize),
    /// Reading or writing the container's disk format failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The on-disk representation was malformed.
    #[error("malformed container file at line {0}: {1}")]
    Parse(usize, String),
}

impl From<ContainerError> for crate::error::Error {
    fn from(e: ContainerError) -> Self {
        Self::General(e.to_string())
    }
}

/// Dynamic value held by a [`Container`] entry.
///
/// Values are immutable once constructed; composition clones.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer scalar.
    Int(i64),
    /// Floating-point scalar.
    Float(f64),
    /// Boolean scalar.
    Bool(bool),
    /// Text scalar — either a literal string or, before evaluation, an unresolved expression.
    Str(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Fixed-arity tuple of values; distinct from `List` only for stringification.
    Tuple(Vec<Value>),
    /// Ordered key → value mapping (nested, not flattened into the container itself).
    Mapping(IndexMap<String, Value>),
    /// N-dimensional numeric array (the `@{…}`/`np.` surface).
    Array(ArrayD<f64>),
    /// A caught evaluation error, stringified.
    Error(String),
    /// The empty-list deletion sentinel.
    Empty,
}

impl Value {
    /// Short machine-readable type tag, used in error messages and disk metadata.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Mapping(_) => "mapping",
            Self::Array(_) => "array",
            Self::Error(_) => "error",
            Self::Empty => "empty",
        }
    }

    /// True if this value is the deletion sentinel (an empty list or [`Value::Empty`]).
    #[must_use]
    pub fn is_delete_sentinel(&self) -> bool {
        matches!(self, Self::Empty) || matches!(self, Self::List(v) if v.is_empty())
    }

    /// True if this value carries a caught evaluation error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Render the value as text for template substitution.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Float(f) => format_float(*f),
            Self::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            Self::Str(s) => s.clone(),
            Self::List(items) => format!(
                "[{}]",
                items.iter().map(Value::render).collect::<Vec<_>>().join(", ")
            ),
            Self::Tuple(items) => format!(
                "({})",
                items.iter().map(Value::render).collect::<Vec<_>>().join(", ")
            ),
            Self::Mapping(m) => format!(
                "{{{}}}",
                m.iter()
                    .map(|(k, v)| format!("{}: {}", k, v.render()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::Array(a) => crate::expr::array::render_array(a, 4),
            Self::Error(e) => format!("<Error: {e}>"),
            Self::Empty => String::new(),
        }
    }
}

/// Format an `f64` the way the evaluator stringifies scalars: integral floats print without
/// a trailing `.0` inside templates (matching LAMMPS number literals), everything else uses
/// the shortest round-trippable representation.
pub(crate) fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{f:.0}")
    } else {
        format!("{f}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// A single index used for sub-selection.
#[derive(Debug, Clone)]
pub enum IndexSpec {
    /// Positional index, negative counts from the end.
    Position(i64),
    /// Key-based lookup.
    Key(String),
}

/// Ordered mapping from string keys to [`Value`]s.
///
/// Order is insertion order and is preserved by every operation except explicit
/// reordering; concatenation is right-wins on duplicate keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    entries: IndexMap<String, Value>,
}

/// Returns `true` if `key` is a valid Rust/Python-style identifier.
#[must_use]
pub fn is_valid_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

impl Container {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a container from an already-ordered mapping, skipping identifier validation
    /// (used internally when the mapping is known-valid, e.g. after `eval()`).
    #[must_use]
    pub fn from_mapping(entries: IndexMap<String, Value>) -> Self {
        Self { entries }
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the container holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Attribute-style read.
    pub fn get(&self, key: &str) -> Result<&Value, ContainerError> {
        self.entries
            .get(key)
            .ok_or_else(|| ContainerError::MissingKey(key.to_string()))
    }

    /// Attribute-style read, `None` instead of erroring when absent.
    #[must_use]
    pub fn try_get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Attribute-style write. Assigning the delete sentinel removes the key instead.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), ContainerError> {
        if !is_valid_identifier(key) {
            return Err(ContainerError::InvalidKey(key.to_string()));
        }
        if value.is_delete_sentinel() {
            self.entries.shift_remove(key);
        } else {
            self.entries.insert(key.to_string(), value);
        }
        Ok(())
    }

    /// Removes a key, if present.
    pub fn delete(&mut self, key: &str) {
        self.entries.shift_remove(key);
    }

    /// Positional read by (possibly negative) index.
    pub fn at(&self, index: i64) -> Result<(&str, &Value), ContainerError> {
        let len = self.entries.len();
        let i = normalize_index(index, len).ok_or(ContainerError::IndexOutOfRange(index, len))?;
        self.entries
            .get_index(i)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or(ContainerError::IndexOutOfRange(index, len))
    }

    /// Sub-selection by a list of indices/keys, preserving the requested order.
    pub fn select(&self, specs: &[IndexSpec]) -> Result<Self, ContainerError> {
        let mut out = IndexMap::new();
        for spec in specs {
            let (k, v) = match spec {
                IndexSpec::Position(i) => self.at(*i)?,
                IndexSpec::Key(k) => (k.as_str(), self.get(k)?),
            };
            out.insert(k.to_string(), v.clone());
        }
        Ok(Self::from_mapping(out))
    }

    /// Sub-selection by a half-open slice `[start, stop)` over positional order.
    #[must_use]
    pub fn slice(&self, start: usize, stop: usize) -> Self {
        let stop = stop.min(self.entries.len());
        let start = start.min(stop);
        let out = self
            .entries
            .iter()
            .skip(start)
            .take(stop - start)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self::from_mapping(out)
    }

    /// `A ⊕ B`: right-wins concatenation. Order is `keys(A)` then the keys of `B` not
    /// already in `A`, each taking B's value where duplicated.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        let mut out = self.entries.clone();
        for (k, v) in &other.entries {
            out.insert(k.clone(), v.clone());
        }
        Self::from_mapping(out)
    }

    /// `A ⊕= B`: in-place concatenation, same semantics as [`Container::concat`].
    pub fn merge_in_place(&mut self, other: &Self) {
        for (k, v) in &other.entries {
            self.entries.insert(k.clone(), v.clone());
        }
    }

    /// Persists the container to `path` in the line-oriented disk format.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ContainerError> {
        let mut out = String::new();
        for (k, v) in &self.entries {
            out.push_str(k);
            out.push_str(" = ");
            out.push_str(&encode_value(v));
            out.push('\n');
        }
        fs::write(path, out)?;
        Ok(())
    }

    /// Reconstructs a container from the format written by [`Container::write`].
    ///
    /// Round-trips exactly for every supported type.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        let text = fs::read_to_string(path)?;
        let mut entries = IndexMap::new();
        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, rest) = line
                .split_once(" = ")
                .ok_or_else(|| ContainerError::Parse(lineno + 1, line.to_string()))?;
            let value = decode_value(rest)
                .ok_or_else(|| ContainerError::Parse(lineno + 1, rest.to_string()))?;
            entries.insert(key.to_string(), value);
        }
        Ok(Self::from_mapping(entries))
    }
}

impl crate::expr::Namespace for Container {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.try_get(name).cloned()
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len_i = i64::try_from(len).ok()?;
    let i = if index < 0 { index + len_i } else { index };
    if i < 0 || i >= len_i {
        None
    } else {
        usize::try_from(i).ok()
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n")
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Encodes a value as a single-line text fragment understood by [`decode_value`].
fn encode_value(v: &Value) -> String {
    match v {
        Value::Int(n) => format!("i:{n}"),
        Value::Float(f) => format!("f:{f:?}"),
        Value::Bool(b) => format!("b:{b}"),
        Value::Str(s) => format!("s:{}", escape(s)),
        Value::Error(e) => format!("e:{}", escape(e)),
        Value::Empty => "x:".to_string(),
        Value::List(items) => format!(
            "l:[{}]",
            items.iter().map(encode_value).collect::<Vec<_>>().join("\u{1}")
        ),
        Value::Tuple(items) => format!(
            "t:({})",
            items.iter().map(encode_value).collect::<Vec<_>>().join("\u{1}")
        ),
        Value::Mapping(m) => format!(
            "m:{{{}}}",
            m.iter()
                .map(|(k, v)| format!("{k}\u{2}{}", encode_value(v)))
                .collect::<Vec<_>>()
                .join("\u{1}")
        ),
        Value::Array(a) => {
            let shape = a.shape().iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
            let data = a.iter().map(|x| format!("{x:?}")).collect::<Vec<_>>().join(",");
            format!("a:{shape};{data}")
        }
    }
}

fn decode_value(s: &str) -> Option<Value> {
    let (tag, rest) = s.split_once(':')?;
    match tag {
        "i" => rest.parse().ok().map(Value::Int),
        "f" => rest.parse().ok().map(Value::Float),
        "b" => rest.parse().ok().map(Value::Bool),
        "s" => Some(Value::Str(unescape(rest))),
        "e" => Some(Value::Error(unescape(rest))),
        "x" => Some(Value::Empty),
        "l" => {
            let inner = rest.strip_prefix('[')?.strip_suffix(']')?;
            decode_items(inner).map(Value::List)
        }
        "t" => {
            let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
            decode_items(inner).map(Value::Tuple)
        }
        "m" => {
            let inner = rest.strip_prefix('{')?.strip_suffix('}')?;
            if inner.is_empty() {
                return Some(Value::Mapping(IndexMap::new()));
            }
            let mut map = IndexMap::new();
            for entry in inner.split('\u{1}') {
                let (k, v) = entry.split_once('\u{2}')?;
                map.insert(k.to_string(), decode_value(v)?);
            }
            Some(Value::Mapping(map))
        }
        "a" => {
            let (shape_s, data_s) = rest.split_once(';')?;
            let shape: Vec<usize> = if shape_s.is_empty() {
                vec![]
            } else {
                shape_s
                    .split(',')
                    .map(str::parse)
                    .collect::<Result<_, _>>()
                    .ok()?
            };
            let data: Vec<f64> = if data_s.is_empty() {
                vec![]
            } else {
                data_s
                    .split(',')
                    .map(str::parse)
                    .collect::<Result<_, _>>()
                    .ok()?
            };
            ArrayD::from_shape_vec(shape, data).ok().map(Value::Array)
        }
        _ => None,
    }
}

fn decode_items(inner: &str) -> Option<Vec<Value>> {
    if inner.is_empty() {
        return Some(vec![]);
    }
    inner.split('\u{1}').map(decode_value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_key_rejected() {
        let mut c = Container::new();
        assert!(matches!(
            c.set("1bad", Value::Int(1)),
            Err(ContainerError::InvalidKey(_))
        ));
    }

    #[test]
    fn missing_key_errors() {
        let c = Container::new();
        assert!(matches!(c.get("nope"), Err(ContainerError::MissingKey(_))));
    }

    #[test]
    fn concat_is_right_wins_and_order_preserving() {
        let mut a = Container::new();
        a.set("x", Value::Int(1)).unwrap();
        a.set("y", Value::Int(2)).unwrap();
        let mut b = Container::new();
        b.set("y", Value::Int(20)).unwrap();
        b.set("z", Value::Int(3)).unwrap();

        let c = a.concat(&b);
        assert_eq!(c.keys().collect::<Vec<_>>(), vec!["x", "y", "z"]);
        assert_eq!(*c.get("y").unwrap(), Value::Int(20));
    }

    #[test]
    fn negative_index_from_end() {
        let mut a = Container::new();
        a.set("x", Value::Int(1)).unwrap();
        a.set("y", Value::Int(2)).unwrap();
        a.set("z", Value::Int(3)).unwrap();
        assert_eq!(a.at(-1).unwrap(), ("z", &Value::Int(3)));
    }

    #[test]
    fn delete_via_empty_list_sentinel() {
        let mut a = Container::new();
        a.set("x", Value::Int(1)).unwrap();
        a.set("x", Value::List(vec![])).unwrap();
        assert!(a.try_get("x").is_none());
    }

    #[test]
    fn round_trip_through_disk() {
        let dir = std::env::temp_dir().join(format!("pizza3-container-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("c.txt");

        let mut a = Container::new();
        a.set("n", Value::Int(42)).unwrap();
        a.set("f", Value::Float(1.5)).unwrap();
        a.set("s", Value::Str("hello world".to_string())).unwrap();
        a.set("l", Value::List(vec![Value::Int(1), Value::Int(2)])).unwrap();
        let mut m = IndexMap::new();
        m.insert("k".to_string(), Value::Int(7));
        a.set("m", Value::Mapping(m)).unwrap();
        a.set(
            "arr",
            Value::Array(ArrayD::from_shape_vec(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap()),
        )
        .unwrap();

        a.write(&path).unwrap();
        let b = Container::read(&path).unwrap();
        assert_eq!(a, b);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
