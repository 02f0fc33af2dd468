//! The hosted numeric-array library and its whitelisted methods: `.T`, `.flatten()`,
//! `.reshape(...)`, `.astype(...)`, `.shape`.
//!
//! Backed by [`ndarray`].

use super::eval::EvalError;
use crate::container::{format_float, Value};
use ndarray::{ArrayD, IxDyn};

/// Converts a [`Value`] into a numeric array, the way `np.array(...)` would.
///
/// Scalars become a 0-d array, lists become row vectors (nested lists become the obvious
/// multi-dimensional shape provided every row has equal length), and arrays pass through.
pub fn to_array(v: &Value) -> Result<ArrayD<f64>, EvalError> {
    match v {
        Value::Array(a) => Ok(a.clone()),
        Value::Int(n) => Ok(ArrayD::from_elem(IxDyn(&[]), *n as f64)),
        Value::Float(f) => Ok(ArrayD::from_elem(IxDyn(&[]), *f)),
        Value::Bool(b) => Ok(ArrayD::from_elem(IxDyn(&[]), if *b { 1.0 } else { 0.0 })),
        Value::List(items) | Value::Tuple(items) => rows_to_array(items),
        other => Err(EvalError::Type(format!(
            "cannot convert {} to a numeric array",
            other.describe()
        ))),
    }
}

fn rows_to_array(items: &[Value]) -> Result<ArrayD<f64>, EvalError> {
    if items.is_empty() {
        return Ok(ArrayD::from_shape_vec(vec![0], vec![]).expect("empty shape is valid"));
    }
    let all_nested = items.iter().all(|v| matches!(v, Value::List(_) | Value::Tuple(_)));
    if all_nested {
        let rows: Vec<ArrayD<f64>> = items.iter().map(to_array).collect::<Result<_, _>>()?;
        let width = rows[0].len();
        if rows.iter().any(|r| r.len() != width) {
            return Err(EvalError::Type("ragged array literal: rows of unequal length".into()));
        }
        let mut data = Vec::with_capacity(rows.len() * width);
        for r in &rows {
            data.extend(r.iter().copied());
        }
        ArrayD::from_shape_vec(vec![rows.len(), width], data)
            .map_err(|e| EvalError::Type(e.to_string()))
    } else {
        let data: Vec<f64> = items
            .iter()
            .map(|v| match v {
                Value::Int(n) => Ok(*n as f64),
                Value::Float(f) => Ok(*f),
                Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
                other => Err(EvalError::Type(format!(
                    "array elements must be numeric, found {}",
                    other.describe()
                ))),
            })
            .collect::<Result<_, _>>()?;
        ArrayD::from_shape_vec(vec![data.len()], data).map_err(|e| EvalError::Type(e.to_string()))
    }
}

/// `np.atleast_2d`: promotes 0-d/1-d arrays to a 2-d row, leaves higher-rank arrays as-is.
#[must_use]
pub fn atleast_2d(a: &ArrayD<f64>) -> ArrayD<f64> {
    match a.ndim() {
        0 => {
            let v = a.iter().next().copied().unwrap_or(0.0);
            ArrayD::from_shape_vec(vec![1, 1], vec![v]).expect("1x1 shape is valid")
        }
        1 => {
            let data: Vec<f64> = a.iter().copied().collect();
            let n = data.len();
            ArrayD::from_shape_vec(vec![1, n], data).expect("1xn shape is valid")
        }
        _ => a.clone(),
    }
}

/// `.T` — reverses the axis order (full transpose for 2-d matrices).
pub fn transpose(a: &ArrayD<f64>) -> Result<ArrayD<f64>, EvalError> {
    Ok(a.clone().reversed_axes())
}

/// `.flatten()` — collapses to a 1-d array in row-major order.
#[must_use]
pub fn flatten(a: &ArrayD<f64>) -> ArrayD<f64> {
    let data: Vec<f64> = a.iter().copied().collect();
    let n = data.len();
    ArrayD::from_shape_vec(vec![n], data).expect("flat shape is valid")
}

/// `.reshape(dims...)`.
pub fn reshape(a: &ArrayD<f64>, dims: &[usize]) -> Result<ArrayD<f64>, EvalError> {
    let data: Vec<f64> = a.iter().copied().collect();
    ArrayD::from_shape_vec(dims.to_vec(), data)
        .map_err(|e| EvalError::Type(format!("reshape error: {e}")))
}

/// `.astype(name)` — for this engine's purposes, either a no-op (`"float64"`/`"float"`) or a
/// round-to-integer pass (`"int"`/`"int64"`), still represented as `f64` internally.
pub fn astype(a: &ArrayD<f64>, kind: &str) -> Result<ArrayD<f64>, EvalError> {
    match kind {
        "float64" | "float" => Ok(a.clone()),
        "int64" | "int" => Ok(a.mapv(|x| x.trunc())),
        other => Err(EvalError::Type(format!("unsupported dtype '{other}'"))),
    }
}

/// Matrix multiplication for the `@` operator, supporting 2-d `@` 2-d and the 1xn/nx1
/// combinations that `atleast_2d` promotion produces.
pub fn matmul(a: &ArrayD<f64>, b: &ArrayD<f64>) -> Result<ArrayD<f64>, EvalError> {
    let (ra, rb) = (a.ndim(), b.ndim());
    if ra != 2 || rb != 2 {
        return Err(EvalError::Type(format!(
            "matrix multiplication requires 2-d operands, found ranks {ra} and {rb}"
        )));
    }
    let a2 = a.view().into_dimensionality::<ndarray::Ix2>().expect("checked rank 2");
    let b2 = b.view().into_dimensionality::<ndarray::Ix2>().expect("checked rank 2");
    if a2.shape()[1] != b2.shape()[0] {
        return Err(EvalError::Type(format!(
            "incompatible shapes for matrix multiplication: {:?} @ {:?}",
            a2.shape(),
            b2.shape()
        )));
    }
    Ok(a2.dot(&b2).into_dyn())
}

/// `np.zeros(shape)` / `np.ones(shape)`.
pub fn shaped_literal(args: &[Value], fill: f64) -> Result<ArrayD<f64>, EvalError> {
    if args.len() != 1 {
        return Err(EvalError::Type("expected exactly one shape argument".into()));
    }
    let dims: Vec<usize> = match &args[0] {
        Value::Int(n) if *n >= 0 => vec![*n as usize],
        Value::List(items) | Value::Tuple(items) => items
            .iter()
            .map(|v| match v {
                Value::Int(n) if *n >= 0 => Ok(*n as usize),
                other => Err(EvalError::Type(format!(
                    "shape components must be non-negative integers, found {}",
                    other.describe()
                ))),
            })
            .collect::<Result<_, _>>()?,
        other => {
            return Err(EvalError::Type(format!(
                "expected an integer or list of integers for shape, found {}",
                other.describe()
            )))
        }
    };
    let len = dims.iter().product();
    ArrayD::from_shape_vec(dims, vec![fill; len]).map_err(|e| EvalError::Type(e.to_string()))
}

/// Renders an array for text interpolation.
///
/// Fully-evaluated arrays always render in full bracketed-nested-list form: this engine only
/// ever holds fully evaluated arrays (there is no "partially evaluated matrix" representation
/// distinct from the final numeric array), so the configurable-precision path only affects
/// how many significant digits each element gets.
#[must_use]
pub fn render_array(a: &ArrayD<f64>, digits: usize) -> String {
    render_dim(a.view().into_dyn(), digits)
}

fn render_dim(a: ndarray::ArrayViewD<f64>, digits: usize) -> String {
    if a.ndim() == 0 {
        return render_scalar(a.iter().next().copied().unwrap_or(0.0), digits);
    }
    if a.ndim() == 1 {
        let items: Vec<String> = a.iter().map(|x| render_scalar(*x, digits)).collect();
        return format!("[{}]", items.join(", "));
    }
    let items: Vec<String> = a.outer_iter().map(|row| render_dim(row, digits)).collect();
    format!("[{}]", items.join(", "))
}

fn render_scalar(x: f64, digits: usize) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format_float(x)
    } else {
        format!("{:.*}", digits.min(15), x)
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    }
}
