//! The sandboxed expression interpreter.
//!
//! Evaluates an [`Expr`] tree against a [`Namespace`] of already-evaluated keys plus the
//! read-only reserved-name [`super::registry`]. There is no way to reach outside this
//! whitelist: no attribute access beyond the fixed numeric-array method set, no imports, no
//! comprehensions.

use super::array;
use super::ast::{BinOp, BoolOp, CmpOp, Expr, UnOp};
use super::registry;
use crate::container::Value;
use thiserror::Error;

/// An error caught during expression evaluation.
///
/// These never propagate past [`super::interpolate`] unless the evaluator is running in
/// `debug` mode — ordinarily they are rendered as `<Error: …>` markers.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    /// `${x}` where `x` is not defined in the visible namespace.
    #[error("Variable or function '{0}' is not defined")]
    Undefined(String),
    /// A type mismatch, e.g. indexing a list with a string.
    #[error("{0}")]
    Type(String),
    /// Division (or floor-division/modulo) by zero.
    #[error("division by zero")]
    ZeroDivision,
    /// Index out of range, or a key missing from a mapping.
    #[error("{0}")]
    IndexError(String),
    /// The expression text itself did not parse.
    #[error("syntax error: {0}")]
    Syntax(String),
    /// Nested substitution depth exceeded the configured cap.
    #[error("recursion depth exceeded")]
    Recursion,
}

impl From<super::parser::ParseError> for EvalError {
    fn from(e: super::parser::ParseError) -> Self {
        Self::Syntax(e.0)
    }
}

/// Read access to the names visible to an expression: the keys evaluated so far in this
/// pass. Implemented by [`crate::param::Param`] and [`crate::param::ParamAuto`].
pub trait Namespace {
    /// Resolves `name`, if it has already been evaluated in this pass.
    fn lookup(&self, name: &str) -> Option<Value>;
}

/// A namespace with nothing in it but the reserved-name registry — used to evaluate
/// standalone expressions that don't reference a `Param`.
pub struct EmptyNamespace;

impl Namespace for EmptyNamespace {
    fn lookup(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Per-evaluation policy knobs.
///
/// Copy, small, built with defaults and overridden field-by-field.
#[derive(Debug, Clone, Copy)]
pub struct EvalConfig {
    /// When `true`, an evaluation error aborts the whole pass instead of being caught as an
    /// inline `<Error: …>` marker.
    pub debug: bool,
    /// Significant digits used when rendering floats inside numeric arrays.
    pub digits: usize,
    /// Cap on nested `${…}`/`@{…}` substitution depth.
    pub max_recursion: usize,
    /// The escape character recognized before `${`/`@{`/`$[`.
    pub escape: char,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self { debug: false, digits: 4, max_recursion: 10, escape: '\\' }
    }
}

const MAX_AST_DEPTH: usize = 256;

/// Evaluates `expr` against `ns`.
pub fn eval(expr: &Expr, ns: &dyn Namespace) -> Result<Value, EvalError> {
    eval_depth(expr, ns, 0)
}

fn eval_depth(expr: &Expr, ns: &dyn Namespace, depth: usize) -> Result<Value, EvalError> {
    if depth > MAX_AST_DEPTH {
        return Err(EvalError::Recursion);
    }
    match expr {
        Expr::Int(n) => Ok(Value::Int(*n)),
        Expr::Float(f) => Ok(Value::Float(*f)),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Ident(name) => resolve_ident(name, ns),
        Expr::List(items) => Ok(Value::List(
            items.iter().map(|e| eval_depth(e, ns, depth + 1)).collect::<Result<_, _>>()?,
        )),
        Expr::Tuple(items) => Ok(Value::Tuple(
            items.iter().map(|e| eval_depth(e, ns, depth + 1)).collect::<Result<_, _>>()?,
        )),
        Expr::Unary(UnOp::Neg, e) => negate(eval_depth(e, ns, depth + 1)?),
        Expr::Unary(UnOp::Not, e) => Ok(Value::Bool(!truthy(&eval_depth(e, ns, depth + 1)?))),
        Expr::Not(e) => Ok(Value::Bool(!truthy(&eval_depth(e, ns, depth + 1)?))),
        Expr::BoolOp(op, l, r) => {
            let lv = eval_depth(l, ns, depth + 1)?;
            match (op, truthy(&lv)) {
                (BoolOp::And, false) | (BoolOp::Or, true) => Ok(lv),
                _ => eval_depth(r, ns, depth + 1),
            }
        }
        Expr::Compare(l, op, r) => {
            let lv = eval_depth(l, ns, depth + 1)?;
            let rv = eval_depth(r, ns, depth + 1)?;
            compare(&lv, *op, &rv)
        }
        Expr::Binary(op, l, r) => {
            let lv = eval_depth(l, ns, depth + 1)?;
            let rv = eval_depth(r, ns, depth + 1)?;
            binary(*op, &lv, &rv)
        }
        Expr::Call(callee, args) => eval_call(callee, args, ns, depth),
        Expr::Attr(base, name) => eval_attr(base, name, ns, depth),
        Expr::MethodCall(base, name, args) => eval_method_call(base, name, args, ns, depth),
        Expr::Index(base, idx) => eval_index(base, idx, ns, depth),
        Expr::Slice(base, start, stop, step) => eval_slice(base, start, stop, step, ns, depth),
        Expr::Dotted(module, field) => Err(EvalError::Undefined(format!("{module}.{field}"))),
    }
}

fn resolve_ident(name: &str, ns: &dyn Namespace) -> Result<Value, EvalError> {
    if let Some(v) = ns.lookup(name) {
        return Ok(v);
    }
    if let Some(v) = registry::constant(name) {
        return Ok(v);
    }
    Err(EvalError::Undefined(name.to_string()))
}

#[must_use]
pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Float(f) => *f != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::List(items) | Value::Tuple(items) => !items.is_empty(),
        Value::Mapping(m) => !m.is_empty(),
        Value::Array(a) => a.iter().any(|x| *x != 0.0),
        Value::Error(_) => false,
        Value::Empty => false,
    }
}

fn negate(v: Value) -> Result<Value, EvalError> {
    match v {
        Value::Int(n) => Ok(Value::Int(-n)),
        Value::Float(f) => Ok(Value::Float(-f)),
        Value::Array(a) => Ok(Value::Array(a.mapv(|x| -x))),
        other => Err(EvalError::Type(format!("bad operand type for unary -: '{}'", other.describe()))),
    }
}

fn as_f64(v: &Value) -> Result<f64, EvalError> {
    match v {
        Value::Int(n) => Ok(*n as f64),
        Value::Float(f) => Ok(*f),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(EvalError::Type(format!("expected a number, found {}", other.describe()))),
    }
}

fn compare(l: &Value, op: CmpOp, r: &Value) -> Result<Value, EvalError> {
    if let (Value::Str(a), Value::Str(b)) = (l, r) {
        let ord = a.cmp(b);
        return Ok(Value::Bool(match op {
            CmpOp::Eq => ord.is_eq(),
            CmpOp::Ne => ord.is_ne(),
            CmpOp::Lt => ord.is_lt(),
            CmpOp::Le => ord.is_le(),
            CmpOp::Gt => ord.is_gt(),
            CmpOp::Ge => ord.is_ge(),
        }));
    }
    if matches!(op, CmpOp::Eq | CmpOp::Ne) && (as_f64(l).is_err() || as_f64(r).is_err()) {
        let eq = l == r;
        return Ok(Value::Bool(if op == CmpOp::Eq { eq } else { !eq }));
    }
    let (a, b) = (as_f64(l)?, as_f64(r)?);
    Ok(Value::Bool(match op {
        CmpOp::Eq => float_cmp::approx_eq!(f64, a, b),
        CmpOp::Ne => !float_cmp::approx_eq!(f64, a, b),
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
    }))
}

fn binary(op: BinOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    match op {
        BinOp::Add => add(l, r),
        BinOp::Sub => arith(l, r, |a, b| a - b, "-"),
        BinOp::Mul => mul(l, r),
        BinOp::Div => {
            let (a, b) = (as_f64(l)?, as_f64(r)?);
            if b == 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            Ok(Value::Float(a / b))
        }
        BinOp::FloorDiv => {
            let (a, b) = (as_f64(l)?, as_f64(r)?);
            if b == 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            let q = (a / b).floor();
            Ok(if matches!((l, r), (Value::Int(_), Value::Int(_))) {
                Value::Int(q as i64)
            } else {
                Value::Float(q)
            })
        }
        BinOp::Mod => {
            let (a, b) = (as_f64(l)?, as_f64(r)?);
            if b == 0.0 {
                return Err(EvalError::ZeroDivision);
            }
            let m = a.rem_euclid(b);
            Ok(if matches!((l, r), (Value::Int(_), Value::Int(_))) {
                Value::Int(m as i64)
            } else {
                Value::Float(m)
            })
        }
        BinOp::Pow => {
            if let (Value::Int(a), Value::Int(b)) = (l, r) {
                if *b >= 0 {
                    return Ok(Value::Int(a.pow((*b).try_into().unwrap_or(0))));
                }
            }
            let (a, b) = (as_f64(l)?, as_f64(r)?);
            Ok(Value::Float(a.powf(b)))
        }
        BinOp::MatMul => {
            let (a, b) = (array::to_array(l)?, array::to_array(r)?);
            array::matmul(&a, &b).map(Value::Array)
        }
    }
}

fn add(l: &Value, r: &Value) -> Result<Value, EvalError> {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) => {
            let mut out = a.clone();
            out.extend(b.clone());
            Ok(Value::List(out))
        }
        (Value::Array(_), _) | (_, Value::Array(_)) => {
            let (a, b) = (array::to_array(l)?, array::to_array(r)?);
            array_elementwise(&a, &b, |x, y| x + y).map(Value::Array)
        }
        _ => arith(l, r, |a, b| a + b, "+"),
    }
}

fn mul(l: &Value, r: &Value) -> Result<Value, EvalError> {
    match (l, r) {
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) => {
            Ok(Value::Str(s.repeat((*n).max(0) as usize)))
        }
        (Value::List(items), Value::Int(n)) | (Value::Int(n), Value::List(items)) => {
            let mut out = Vec::with_capacity(items.len() * (*n).max(0) as usize);
            for _ in 0..(*n).max(0) {
                out.extend(items.clone());
            }
            Ok(Value::List(out))
        }
        (Value::Array(_), _) | (_, Value::Array(_)) => {
            let (a, b) = (array::to_array(l)?, array::to_array(r)?);
            array_elementwise(&a, &b, |x, y| x * y).map(Value::Array)
        }
        _ => arith(l, r, |a, b| a * b, "*"),
    }
}

/// Elementwise array op with scalar (single-element-array) broadcasting. `ndarray`'s own
/// operator overloads on dynamic-rank arrays require identical shapes, so the "one side is a
/// scalar" case is handled explicitly here.
fn array_elementwise(
    a: &ndarray::ArrayD<f64>,
    b: &ndarray::ArrayD<f64>,
    f: impl Fn(f64, f64) -> f64,
) -> Result<ndarray::ArrayD<f64>, EvalError> {
    if a.shape() == b.shape() {
        let mut out = a.clone();
        ndarray::Zip::from(&mut out).and(b).for_each(|x, y| *x = f(*x, *y));
        Ok(out)
    } else if b.len() == 1 {
        let scalar = b.iter().next().copied().unwrap_or(0.0);
        Ok(a.mapv(|x| f(x, scalar)))
    } else if a.len() == 1 {
        let scalar = a.iter().next().copied().unwrap_or(0.0);
        Ok(b.mapv(|x| f(scalar, x)))
    } else {
        Err(EvalError::Type(format!(
            "operands could not be broadcast together with shapes {:?} {:?}",
            a.shape(),
            b.shape()
        )))
    }
}

fn arith(l: &Value, r: &Value, f: fn(f64, f64) -> f64, op: &str) -> Result<Value, EvalError> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => {
            let result = f(*a as f64, *b as f64);
            Ok(Value::Int(result as i64))
        }
        _ => {
            let a = as_f64(l).map_err(|_| {
                EvalError::Type(format!(
                    "unsupported operand type(s) for {op}: '{}' and '{}'",
                    l.describe(),
                    r.describe()
                ))
            })?;
            let b = as_f64(r).map_err(|_| {
                EvalError::Type(format!(
                    "unsupported operand type(s) for {op}: '{}' and '{}'",
                    l.describe(),
                    r.describe()
                ))
            })?;
            Ok(Value::Float(f(a, b)))
        }
    }
}

fn eval_call(callee: &Expr, args: &[Expr], ns: &dyn Namespace, depth: usize) -> Result<Value, EvalError> {
    let argvals: Vec<Value> =
        args.iter().map(|e| eval_depth(e, ns, depth + 1)).collect::<Result<_, _>>()?;
    match callee {
        Expr::Ident(name) => {
            if let Some(result) = registry::call_bare(name, &argvals) {
                result
            } else {
                Err(EvalError::Undefined(name.clone()))
            }
        }
        Expr::Dotted(module, func) if module == "np" => registry::call_np(func, &argvals),
        Expr::Dotted(module, func) => Err(EvalError::Undefined(format!("{module}.{func}"))),
        _ => Err(EvalError::Type("expression is not callable".into())),
    }
}

/// Whitelisted attribute access: `.T` and `.shape` on arrays.
fn eval_attr(base: &Expr, name: &str, ns: &dyn Namespace, depth: usize) -> Result<Value, EvalError> {
    let base_val = eval_depth(base, ns, depth + 1)?;
    let arr = array::to_array(&base_val)?;
    match name {
        "T" => array::transpose(&arr).map(Value::Array),
        "shape" => Ok(Value::Tuple(arr.shape().iter().map(|d| Value::Int(*d as i64)).collect())),
        other => Err(EvalError::Type(format!("no attribute '{other}' on a numeric array"))),
    }
}

/// Whitelisted methods: `.flatten()`, `.reshape(...)`, `.astype(...)`.
fn eval_method_call(
    base: &Expr,
    name: &str,
    args: &[Expr],
    ns: &dyn Namespace,
    depth: usize,
) -> Result<Value, EvalError> {
    let base_val = eval_depth(base, ns, depth + 1)?;
    let arr = array::to_array(&base_val)?;
    let argvals: Vec<Value> =
        args.iter().map(|e| eval_depth(e, ns, depth + 1)).collect::<Result<_, _>>()?;
    match name {
        "flatten" => Ok(Value::Array(array::flatten(&arr))),
        "reshape" => {
            let dims: Vec<usize> = argvals
                .iter()
                .map(|v| match v {
                    Value::Int(n) if *n >= 0 => Ok(*n as usize),
                    other => Err(EvalError::Type(format!(
                        "reshape dimensions must be non-negative integers, found {}",
                        other.describe()
                    ))),
                })
                .collect::<Result<_, _>>()?;
            array::reshape(&arr, &dims).map(Value::Array)
        }
        "astype" => {
            let kind = match argvals.first() {
                Some(Value::Str(s)) => s.clone(),
                _ => return Err(EvalError::Type("astype() expects a string argument".into())),
            };
            array::astype(&arr, &kind).map(Value::Array)
        }
        other => Err(EvalError::Type(format!("no method '{other}' on a numeric array"))),
    }
}

fn normalize_index(i: i64, len: usize) -> Option<usize> {
    let len_i = len as i64;
    let idx = if i < 0 { i + len_i } else { i };
    if idx < 0 || idx >= len_i {
        None
    } else {
        Some(idx as usize)
    }
}

fn eval_index(base: &Expr, idx: &Expr, ns: &dyn Namespace, depth: usize) -> Result<Value, EvalError> {
    let base_val = eval_depth(base, ns, depth + 1)?;
    // "Mixed-origin indexing": mapping indexing accepts a bare identifier as a literal key
    // with no quoting required.
    if let Value::Mapping(m) = &base_val {
        if let Expr::Ident(key) = idx {
            return m
                .get(key)
                .cloned()
                .ok_or_else(|| EvalError::IndexError(format!("key '{key}' not found")));
        }
    }
    let idx_val = eval_depth(idx, ns, depth + 1)?;
    match &base_val {
        Value::Mapping(m) => {
            let key = match &idx_val {
                Value::Str(s) => s.clone(),
                other => {
                    return Err(EvalError::Type(format!(
                        "mapping indices must be strings, found {}",
                        other.describe()
                    )))
                }
            };
            m.get(&key)
                .cloned()
                .ok_or_else(|| EvalError::IndexError(format!("key '{key}' not found")))
        }
        Value::List(items) | Value::Tuple(items) => {
            let Value::Int(i) = idx_val else {
                return Err(EvalError::Type(format!(
                    "list indices must be integers, found {}",
                    idx_val.describe()
                )));
            };
            let pos = normalize_index(i, items.len())
                .ok_or_else(|| EvalError::IndexError(format!("index {i} out of range")))?;
            Ok(items[pos].clone())
        }
        Value::Str(s) => {
            let Value::Int(i) = idx_val else {
                return Err(EvalError::Type("string indices must be integers".into()));
            };
            let chars: Vec<char> = s.chars().collect();
            let pos = normalize_index(i, chars.len())
                .ok_or_else(|| EvalError::IndexError(format!("index {i} out of range")))?;
            Ok(Value::Str(chars[pos].to_string()))
        }
        Value::Array(a) => {
            let Value::Int(i) = idx_val else {
                return Err(EvalError::Type("array indices must be integers".into()));
            };
            let len = a.shape().first().copied().unwrap_or(0);
            let pos =
                normalize_index(i, len).ok_or_else(|| EvalError::IndexError(format!("index {i} out of range")))?;
            Ok(Value::Array(a.index_axis(ndarray::Axis(0), pos).to_owned().into_dyn()))
        }
        other => Err(EvalError::Type(format!("'{}' object is not subscriptable", other.describe()))),
    }
}

fn eval_slice(
    base: &Expr,
    start: &Option<Box<Expr>>,
    stop: &Option<Box<Expr>>,
    step: &Option<Box<Expr>>,
    ns: &dyn Namespace,
    depth: usize,
) -> Result<Value, EvalError> {
    let base_val = eval_depth(base, ns, depth + 1)?;
    let opt_int = |e: &Option<Box<Expr>>| -> Result<Option<i64>, EvalError> {
        match e {
            None => Ok(None),
            Some(e) => match eval_depth(e, ns, depth + 1)? {
                Value::Int(n) => Ok(Some(n)),
                other => Err(EvalError::Type(format!("slice indices must be integers, found {}", other.describe()))),
            },
        }
    };
    let start = opt_int(start)?;
    let stop = opt_int(stop)?;
    let step = opt_int(step)?.unwrap_or(1);
    if step == 0 {
        return Err(EvalError::Type("slice step cannot be zero".into()));
    }
    match base_val {
        Value::List(items) => Ok(Value::List(slice_vec(&items, start, stop, step))),
        Value::Tuple(items) => Ok(Value::Tuple(slice_vec(&items, start, stop, step))),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let sliced = slice_vec(&chars, start, stop, step);
            Ok(Value::Str(sliced.into_iter().collect()))
        }
        other => Err(EvalError::Type(format!("'{}' object is not sliceable", other.describe()))),
    }
}

fn slice_vec<T: Clone>(items: &[T], start: Option<i64>, stop: Option<i64>, step: i64) -> Vec<T> {
    let len = items.len() as i64;
    if step > 0 {
        let s = start.map_or(0, |i| i.clamp(-len, len));
        let s = if s < 0 { (s + len).max(0) } else { s };
        let e = stop.map_or(len, |i| i.clamp(-len, len));
        let e = if e < 0 { (e + len).max(0) } else { e };
        let mut out = Vec::new();
        let mut i = s;
        while i < e {
            if let Some(v) = items.get(i as usize) {
                out.push(v.clone());
            }
            i += step;
        }
        out
    } else {
        let s = start.map_or(len - 1, |i| if i < 0 { i + len } else { i });
        let e = stop.map_or(-1, |i| if i < 0 { i + len } else { i });
        let mut out = Vec::new();
        let mut i = s;
        while i > e {
            if i >= 0 && i < len {
                out.push(items[i as usize].clone());
            }
            i += step;
        }
        out
    }
}
