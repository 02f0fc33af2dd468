//! The expression and text-interpolation engine.
//!
//! [`crate::param::Param`] calls [`interpolate`] once per key, in whatever order its eval
//! strategy picks, passing itself (or the partial result built so far) as the [`Namespace`].
//! Everything reachable from an expression is either a previously evaluated key or a name in
//! [`registry`] — there is no broader scope to escape into.

pub mod array;
pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod shorthand;

pub use eval::{EvalConfig, EvalError, Namespace};

use crate::container::Value;

/// Evaluates `raw` as a key's stored text, applying every substitution rule in order:
/// literal `!`-prefixed expression lists, the `${…}`/`@{…}`/`$[…]` markers,
/// raw `{name}` interpolation, backslash-escaped markers, bare `$name` passthrough, and
/// finally (when nothing matched) a whole-string expression-evaluation attempt.
///
/// A single marker spanning the whole string yields that marker's native [`Value`] (so a key
/// whose text is just `${1 + 1}` becomes an `Int`, not a `Str`); anything with surrounding or
/// mixed text renders every piece and concatenates into a `Str`.
pub fn interpolate(raw: &str, ns: &dyn Namespace, cfg: &EvalConfig) -> Result<Value, EvalError> {
    interpolate_depth(raw, ns, cfg, 0)
}

fn interpolate_depth(raw: &str, ns: &dyn Namespace, cfg: &EvalConfig, depth: usize) -> Result<Value, EvalError> {
    if depth > cfg.max_recursion {
        return Err(EvalError::Recursion);
    }

    if let Some(body) = raw.strip_prefix('!') {
        let exprs = split_top_level(body, &[',', ';']);
        let values = exprs
            .iter()
            .map(|e| eval_expr_text(e.trim(), ns))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::List(values));
    }

    // A raw value that is *entirely* `$identifier` (nothing before or after it) is a literal
    // marker for the bare identifier text, never evaluated — distinct from a bare `$name`
    // appearing inside other text (e.g. `$HOME/run`), which passes through with its `$` intact.
    if let Some(name) = whole_string_dollar_identifier(raw) {
        return Ok(Value::Str(name.to_string()));
    }

    let mut parts: Vec<Value> = Vec::new();
    let mut buf = String::new();
    let chars: Vec<char> = raw.chars().collect();
    let mut i = 0;
    let flush = |buf: &mut String, parts: &mut Vec<Value>| {
        if !buf.is_empty() {
            parts.push(Value::Str(std::mem::take(buf)));
        }
    };

    while i < chars.len() {
        let c = chars[i];

        if c == cfg.escape && matches!(chars.get(i + 1), Some('$') | Some('@')) && chars.get(i + 2) == Some(&'{') {
            let marker = chars[i + 1];
            if let Some(end) = find_matching_brace_at(&chars, i + 2) {
                buf.push(marker);
                buf.push('{');
                buf.extend(&chars[i + 3..end]);
                buf.push('}');
                i = end + 1;
                continue;
            }
        }

        if c == '$' && chars.get(i + 1) == Some(&'{') {
            if let Some(end) = find_matching_brace_at(&chars, i + 1) {
                let inner: String = chars[i + 2..end].iter().collect();
                flush(&mut buf, &mut parts);
                let value = match eval_expr_text(&inner, ns) {
                    Ok(v) => v,
                    Err(e) if cfg.debug => return Err(e),
                    Err(e) => Value::Error(e.to_string()),
                };
                parts.push(resolve_nested(value, ns, cfg, depth)?);
                i = end + 1;
                continue;
            }
        }

        if c == '@' && chars.get(i + 1) == Some(&'{') {
            if let Some(end) = find_matching_brace_at(&chars, i + 1) {
                let inner: String = chars[i + 2..end].iter().collect();
                flush(&mut buf, &mut parts);
                let value = match eval_expr_text(&inner, ns)
                    .and_then(|v| array::to_array(&v))
                    .map(|a| Value::Array(array::atleast_2d(&a)))
                {
                    Ok(v) => v,
                    Err(e) if cfg.debug => return Err(e),
                    Err(e) => Value::Error(e.to_string()),
                };
                parts.push(value);
                i = end + 1;
                continue;
            }
        }

        if c == '$' && chars.get(i + 1) == Some(&'[') {
            if let Some(end) = find_matching_bracket(&chars, i + 1) {
                let inner: String = chars[i + 2..end].iter().collect();
                flush(&mut buf, &mut parts);
                let value = match shorthand::parse_array_literal(&inner) {
                    Ok(a) => Value::Array(a),
                    Err(e) if cfg.debug => return Err(e),
                    Err(e) => Value::Error(e.to_string()),
                };
                parts.push(value);
                i = end + 1;
                continue;
            }
        }

        if c == '{' {
            if let Some(end) = find_matching_brace_at(&chars, i) {
                let name: String = chars[i + 1..end].iter().collect();
                let name = name.trim();
                flush(&mut buf, &mut parts);
                let value = match ns.lookup(name) {
                    Some(v) => v,
                    None => {
                        let e = EvalError::Undefined(name.to_string());
                        if cfg.debug {
                            return Err(e);
                        }
                        Value::Error(e.to_string())
                    }
                };
                parts.push(value);
                i = end + 1;
                continue;
            }
        }

        if c == '$' && chars.get(i + 1).is_some_and(|c| c.is_alphabetic() || *c == '_') {
            buf.push('$');
            i += 1;
            while chars.get(i).is_some_and(|c| c.is_alphanumeric() || *c == '_') {
                buf.push(chars[i]);
                i += 1;
            }
            continue;
        }

        buf.push(c);
        i += 1;
    }
    flush(&mut buf, &mut parts);

    let assembled = match parts.len() {
        0 => Value::Str(String::new()),
        1 => parts.into_iter().next().expect("checked len==1"),
        _ => Value::Str(parts.iter().map(Value::render).collect::<Vec<_>>().concat()),
    };
    Ok(try_global_eval(assembled, ns))
}

/// After interpolation, attempt a final global evaluation of the resulting string; if it
/// parses and evaluates cleanly, replace the value with the result; otherwise keep the
/// interpolated string.
///
/// Only applies to values that are still text after step 1 — a value already typed by a
/// single whole-string `${…}`/`@{…}`/`$[…]` marker (an `Int`, `Array`, `List`, …) is left
/// alone, matching scenario S1 ("b is evaluated first as text `1+2` then globally to 3").
fn try_global_eval(value: Value, ns: &dyn Namespace) -> Value {
    match &value {
        Value::Str(s) => eval_expr_text(s, ns).unwrap_or(value),
        _ => value,
    }
}

/// If an evaluated marker's own text still contains substitution syntax, re-interpolate it
/// (bounded by `cfg.max_recursion`) so nested templates resolve fully in one `eval()` pass.
fn resolve_nested(value: Value, ns: &dyn Namespace, cfg: &EvalConfig, depth: usize) -> Result<Value, EvalError> {
    match value {
        Value::Str(s) if s.contains("${") || s.contains("@{") || s.contains("$[") => {
            interpolate_depth(&s, ns, cfg, depth + 1)
        }
        other => Ok(other),
    }
}

fn eval_expr_text(src: &str, ns: &dyn Namespace) -> Result<Value, EvalError> {
    let expr = parser::parse(src)?;
    eval::eval(&expr, ns)
}

/// Recognizes a raw value whose entire text is `$` followed by one identifier and nothing
/// else, returning the identifier. `$HOME/run` or `$a+1` do not qualify — only a lone
/// `$identifier` spanning the whole string does.
fn whole_string_dollar_identifier(s: &str) -> Option<&str> {
    let rest = s.strip_prefix('$')?;
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return None,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_').then_some(rest)
}

/// Splits on any of `seps` at bracket/paren/brace nesting depth 0 — used for the `!`-prefixed
/// list-of-expressions form, which is comma- or semicolon-separated.
fn split_top_level(s: &str, seps: &[char]) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut cur = String::new();
    for c in s.chars() {
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                cur.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                cur.push(c);
            }
            c if depth == 0 && seps.contains(&c) => {
                out.push(std::mem::take(&mut cur));
            }
            c => cur.push(c),
        }
    }
    if !cur.trim().is_empty() {
        out.push(cur);
    }
    out
}

/// Scans `raw` for the names it references through `${…}`, `@{…}`, or raw `{name}` markers —
/// the dependency edges [`crate::param::ParamAuto`] topologically sorts on. Escaped markers
/// and bare `$name` passthrough contribute nothing (they are never evaluated).
#[must_use]
pub fn referenced_names(raw: &str) -> std::collections::BTreeSet<String> {
    let mut out = std::collections::BTreeSet::new();
    let chars: Vec<char> = raw.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && matches!(chars.get(i + 1), Some('$') | Some('@')) {
            if let Some(end) = find_matching_brace_at(&chars, i + 2) {
                i = end + 1;
                continue;
            }
        }
        if (c == '$' || c == '@') && chars.get(i + 1) == Some(&'{') {
            if let Some(end) = find_matching_brace_at(&chars, i + 1) {
                let inner: String = chars[i + 2..end].iter().collect();
                if let Ok(toks) = lexer::Lexer::new(&inner).tokenize() {
                    for t in toks {
                        if let lexer::Tok::Ident(name) = t {
                            out.insert(name);
                        }
                    }
                }
                i = end + 1;
                continue;
            }
        }
        if c == '{' {
            if let Some(end) = find_matching_brace_at(&chars, i) {
                let name: String = chars[i + 1..end].iter().collect();
                out.insert(name.trim().to_string());
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }
    out
}

/// Given `open` pointing at a `{`, returns the index of its matching `}`, honoring nesting.
fn find_matching_brace_at(chars: &[char], open: usize) -> Option<usize> {
    if chars.get(open) != Some(&'{') {
        return None;
    }
    let mut depth = 0i32;
    for (offset, c) in chars[open..].iter().enumerate() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn find_matching_bracket(chars: &[char], open: usize) -> Option<usize> {
    if chars.get(open) != Some(&'[') {
        return None;
    }
    let mut depth = 0i32;
    for (offset, c) in chars[open..].iter().enumerate() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use std::cell::RefCell;

    struct MapNs(RefCell<IndexMap<String, Value>>);
    impl Namespace for MapNs {
        fn lookup(&self, name: &str) -> Option<Value> {
            self.0.borrow().get(name).cloned()
        }
    }

    #[test]
    fn whole_string_marker_preserves_type() {
        let ns = MapNs(RefCell::new(IndexMap::new()));
        let v = interpolate("${1 + 2}", &ns, &EvalConfig::default()).unwrap();
        assert_eq!(v, Value::Int(3));
    }

    #[test]
    fn mixed_text_renders_to_string() {
        let ns = MapNs(RefCell::new(IndexMap::new()));
        let v = interpolate("x = ${1 + 2} atoms", &ns, &EvalConfig::default()).unwrap();
        assert_eq!(v, Value::Str("x = 3 atoms".to_string()));
    }

    #[test]
    fn raw_curly_does_not_evaluate() {
        let mut m = IndexMap::new();
        m.insert("name".to_string(), Value::Str("a+b".to_string()));
        let ns = MapNs(RefCell::new(m));
        let v = interpolate("{name}", &ns, &EvalConfig::default()).unwrap();
        assert_eq!(v, Value::Str("a+b".to_string()));
    }

    #[test]
    fn escaped_marker_passes_through_literally() {
        let ns = MapNs(RefCell::new(IndexMap::new()));
        let v = interpolate(r"\${1 + 2}", &ns, &EvalConfig::default()).unwrap();
        assert_eq!(v, Value::Str("${1 + 2}".to_string()));
    }

    #[test]
    fn whole_string_dollar_identifier_strips_the_dollar() {
        let ns = MapNs(RefCell::new(IndexMap::new()));
        let v = interpolate("$si", &ns, &EvalConfig::default()).unwrap();
        assert_eq!(v, Value::Str("si".to_string()));
    }

    #[test]
    fn bare_dollar_identifier_passes_through() {
        let ns = MapNs(RefCell::new(IndexMap::new()));
        let v = interpolate("$HOME/run", &ns, &EvalConfig::default()).unwrap();
        assert_eq!(v, Value::Str("$HOME/run".to_string()));
    }

    #[test]
    fn undefined_name_becomes_error_marker_outside_debug() {
        let ns = MapNs(RefCell::new(IndexMap::new()));
        let v = interpolate("${missing}", &ns, &EvalConfig::default()).unwrap();
        assert!(matches!(v, Value::Error(_)));
    }

    #[test]
    fn undefined_name_propagates_in_debug_mode() {
        let ns = MapNs(RefCell::new(IndexMap::new()));
        let cfg = EvalConfig { debug: true, ..EvalConfig::default() };
        assert!(interpolate("${missing}", &ns, &cfg).is_err());
    }

    #[test]
    fn bang_prefixed_list_evaluates_each_expression() {
        let ns = MapNs(RefCell::new(IndexMap::new()));
        let v = interpolate("!1+1, 2+2", &ns, &EvalConfig::default()).unwrap();
        assert_eq!(v, Value::List(vec![Value::Int(2), Value::Int(4)]));
    }

    #[test]
    fn shorthand_array_literal_whole_string() {
        let ns = MapNs(RefCell::new(IndexMap::new()));
        let v = interpolate("$[1 2; 3 4]", &ns, &EvalConfig::default()).unwrap();
        assert!(matches!(v, Value::Array(_)));
    }

    #[test]
    fn at_brace_scalar_is_1x1_not_0d() {
        let ns = MapNs(RefCell::new(IndexMap::new()));
        let v = interpolate("@{5}", &ns, &EvalConfig::default()).unwrap();
        match v {
            Value::Array(a) => assert_eq!(a.shape(), &[1, 1]),
            other => panic!("expected an array, found {other:?}"),
        }
    }

    #[test]
    fn at_brace_list_is_1xn_not_flat() {
        let ns = MapNs(RefCell::new(IndexMap::new()));
        let v = interpolate("@{[1, 2, 3]}", &ns, &EvalConfig::default()).unwrap();
        match v {
            Value::Array(a) => assert_eq!(a.shape(), &[1, 3]),
            other => panic!("expected an array, found {other:?}"),
        }
    }
}
