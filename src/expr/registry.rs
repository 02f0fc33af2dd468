//! The process-wide reserved-name registry.
//!
//! Initialized once (these are `const`/plain functions, so there is nothing to actually
//! initialize at runtime) and read-only thereafter — the only process-wide state the engine
//! has. Everything reachable here is a safe, pure function; there is no way for an expression
//! to reach outside this table.

use super::array;
use super::eval::EvalError;
use crate::container::Value;
use rand::Rng;

/// Resolves a bare reserved name (`pi`, `e`, `nan`, `inf`) to its constant value.
#[must_use]
pub fn constant(name: &str) -> Option<Value> {
    match name {
        "pi" => Some(Value::Float(std::f64::consts::PI)),
        "e" => Some(Value::Float(std::f64::consts::E)),
        "nan" => Some(Value::Float(f64::NAN)),
        "inf" => Some(Value::Float(f64::INFINITY)),
        _ => None,
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

fn numeric_items(v: &Value) -> Result<Vec<f64>, EvalError> {
    match v {
        Value::List(items) | Value::Tuple(items) => items.iter().map(as_f64).collect(),
        other => as_f64(other).map(|x| vec![x]),
    }
}

/// Calls a builtin (`abs round min max sum divmod`), a math function (`sin cos tan exp log`),
/// or a statistics function (`gauss uniform randint choice`) by bare name.
///
/// Returns `None` if `name` is not one of these — the caller then tries the `np.` namespace
/// or treats it as an undefined reference.
pub fn call_bare(name: &str, args: &[Value]) -> Option<Result<Value, EvalError>> {
    if !matches!(
        name,
        "abs" | "round" | "min" | "max" | "sum" | "divmod" | "sin" | "cos" | "tan" | "exp" | "log"
            | "gauss" | "uniform" | "randint" | "choice"
    ) {
        return None;
    }
    let result: Result<Value, EvalError> = (|| match name {
        "abs" => match arity1(args, name)? {
            Value::Int(n) => Ok(Value::Int(n.abs())),
            other => as_f64(other).map(f64::abs).map(Value::Float),
        },
        "round" => {
            let f = as_f64(arity1(args, name)?)?;
            Ok(Value::Float(f.round()))
        }
        "min" => numeric_reduce(args, name, f64::min),
        "max" => numeric_reduce(args, name, f64::max),
        "sum" => {
            if args.len() != 1 {
                Err(EvalError::Type(format!("sum() takes exactly one argument ({} given)", args.len())))
            } else {
                numeric_items(&args[0]).map(|v| Value::Float(v.into_iter().sum()))
            }
        }
        "divmod" => {
            if args.len() != 2 {
                Err(EvalError::Type("divmod() takes exactly two arguments".into()))
            } else {
                let (a, b) = (as_f64(&args[0])?, as_f64(&args[1])?);
                Ok(Value::Tuple(vec![Value::Float((a / b).floor()), Value::Float(a.rem_euclid(b))]))
            }
        }
        "sin" => arity1(args, name).and_then(|v| as_f64(v)).map(f64::sin).map(Value::Float),
        "cos" => arity1(args, name).and_then(|v| as_f64(v)).map(f64::cos).map(Value::Float),
        "tan" => arity1(args, name).and_then(|v| as_f64(v)).map(f64::tan).map(Value::Float),
        "exp" => arity1(args, name).and_then(|v| as_f64(v)).map(f64::exp).map(Value::Float),
        "log" => arity1(args, name).and_then(|v| as_f64(v)).map(f64::ln).map(Value::Float),
        "gauss" => {
            if args.len() != 2 {
                Err(EvalError::Type("gauss() takes exactly two arguments".into()))
            } else {
                let (mu, sigma) = (as_f64(&args[0])?, as_f64(&args[1])?);
                // Box-Muller, using the crate-wide thread RNG.
                let mut rng = rand::thread_rng();
                let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
                let u2: f64 = rng.gen_range(0.0..1.0);
                let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
                Ok(Value::Float(mu + sigma * z))
            }
        }
        "uniform" => {
            if args.len() != 2 {
                Err(EvalError::Type("uniform() takes exactly two arguments".into()))
            } else {
                let (a, b) = (as_f64(&args[0])?, as_f64(&args[1])?);
                Ok(Value::Float(rand::thread_rng().gen_range(a..=b)))
            }
        }
        "randint" => {
            if args.len() != 2 {
                Err(EvalError::Type("randint() takes exactly two arguments".into()))
            } else {
                let (a, b) = (as_usize_i(&args[0])?, as_usize_i(&args[1])?);
                Ok(Value::Int(rand::thread_rng().gen_range(a..=b)))
            }
        }
        "choice" => {
            if args.len() != 1 {
                Err(EvalError::Type("choice() takes exactly one argument".into()))
            } else {
                match &args[0] {
                    Value::List(items) | Value::Tuple(items) if !items.is_empty() => {
                        let i = rand::thread_rng().gen_range(0..items.len());
                        Ok(items[i].clone())
                    }
                    other => Err(EvalError::Type(format!("choice() expects a non-empty list, found {}", other.describe()))),
                }
            }
        }
        _ => unreachable!("guarded above"),
    })();
    Some(result)
}

fn as_usize_i(v: &Value) -> Result<i64, EvalError> {
    match v {
        Value::Int(n) => Ok(*n),
        other => Err(EvalError::Type(format!("expected an integer, found {}", other.describe()))),
    }
}

fn arity1<'a>(args: &'a [Value], name: &str) -> Result<&'a Value, EvalError> {
    if args.len() == 1 {
        Ok(&args[0])
    } else {
        Err(EvalError::Type(format!("{name}() takes exactly one argument ({} given)", args.len())))
    }
}

fn numeric_reduce(args: &[Value], name: &str, f: fn(f64, f64) -> f64) -> Result<Value, EvalError> {
    let values = if args.len() == 1 {
        numeric_items(&args[0])?
    } else {
        args.iter().map(as_f64).collect::<Result<_, _>>()?
    };
    values
        .into_iter()
        .reduce(f)
        .map(Value::Float)
        .ok_or_else(|| EvalError::Type(format!("{name}() arg is an empty sequence")))
}

/// Calls a function in the hosted numeric-array namespace, `np.name(args...)`.
pub fn call_np(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "array" => {
            let v = arity1(args, "np.array")?;
            array::to_array(v).map(Value::Array)
        }
        "atleast_2d" => {
            let v = arity1(args, "np.atleast_2d")?;
            let a = array::to_array(v)?;
            Ok(Value::Array(array::atleast_2d(&a)))
        }
        "zeros" => array::shaped_literal(args, 0.0).map(Value::Array),
        "ones" => array::shaped_literal(args, 1.0).map(Value::Array),
        "transpose" => {
            let v = arity1(args, "np.transpose")?;
            let a = array::to_array(v)?;
            array::transpose(&a).map(Value::Array)
        }
        other => Err(EvalError::Undefined(format!("np.{other}"))),
    }
}
