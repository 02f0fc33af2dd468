//! The `$[...]` array-literal shorthand.
//!
//! A grammar of its own, not valid Python, so it gets its own tiny parser rather than going
//! through [`super::parser`]. Rows are separated by `;`, columns by whitespace or commas, and
//! a bare `start:stop` or `start:step:stop` token expands into an inclusive run of values —
//! the author's MATLAB-derived range convention, distinct from the exclusive Python slice
//! syntax [`super::parser`] handles inside `[...]` indexing.

use super::eval::EvalError;
use ndarray::ArrayD;

/// Parses and evaluates a `$[...]` literal's interior (the text between the brackets) into a
/// numeric array.
pub fn parse_array_literal(src: &str) -> Result<ArrayD<f64>, EvalError> {
    let rows: Vec<&str> = src.split(';').map(str::trim).filter(|s| !s.is_empty()).collect();
    if rows.is_empty() {
        return Ok(ArrayD::from_shape_vec(vec![0], vec![]).expect("empty shape is valid"));
    }
    let parsed_rows: Vec<Vec<f64>> = rows.iter().map(|r| parse_row(r)).collect::<Result<_, _>>()?;
    let width = parsed_rows[0].len();
    if parsed_rows.iter().any(|r| r.len() != width) {
        return Err(EvalError::Type("ragged $[...] literal: rows of unequal length".into()));
    }
    if parsed_rows.len() == 1 {
        // A single row is still a 2-d 1×n row vector, never a flat 1-d array: every
        // vector here is MATLAB-shaped, so `.T` has a visible effect.
        return ArrayD::from_shape_vec(vec![1, width], parsed_rows.into_iter().next().expect("checked len==1"))
            .map_err(|e| EvalError::Type(e.to_string()));
    }
    let mut data = Vec::with_capacity(parsed_rows.len() * width);
    for r in &parsed_rows {
        data.extend(r);
    }
    ArrayD::from_shape_vec(vec![parsed_rows.len(), width], data).map_err(|e| EvalError::Type(e.to_string()))
}

fn parse_row(src: &str) -> Result<Vec<f64>, EvalError> {
    let mut out = Vec::new();
    for tok in src.split([',', ' ', '\t']).filter(|s| !s.is_empty()) {
        if tok.contains(':') {
            out.extend(parse_range(tok)?);
        } else {
            out.push(
                tok.parse::<f64>()
                    .map_err(|_| EvalError::Syntax(format!("bad number '{tok}' in array literal")))?,
            );
        }
    }
    if out.is_empty() {
        return Err(EvalError::Syntax("empty row in array literal".into()));
    }
    Ok(out)
}

/// `start:stop` (step 1) or `start:step:stop`, both ends inclusive.
fn parse_range(tok: &str) -> Result<Vec<f64>, EvalError> {
    let parts: Vec<f64> = tok
        .split(':')
        .map(|p| {
            p.parse::<f64>()
                .map_err(|_| EvalError::Syntax(format!("bad range '{tok}' in array literal")))
        })
        .collect::<Result<_, _>>()?;
    let (start, step, stop) = match parts.as_slice() {
        [a, b] => (*a, 1.0, *b),
        [a, s, b] => (*a, *s, *b),
        _ => return Err(EvalError::Syntax(format!("bad range '{tok}' in array literal"))),
    };
    if step == 0.0 {
        return Err(EvalError::Syntax("range step cannot be zero".into()));
    }
    let n_steps = ((stop - start) / step).floor();
    if n_steps < 0.0 {
        return Ok(Vec::new());
    }
    let n_steps = n_steps as i64;
    Ok((0..=n_steps).map(|i| start + step * i as f64).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_row_is_1xn_not_flat() {
        let a = parse_array_literal("1 2 3").unwrap();
        assert_eq!(a.shape(), &[1, 3]);
    }

    #[test]
    fn two_rows() {
        let a = parse_array_literal("1 2; 3 4").unwrap();
        assert_eq!(a.shape(), &[2, 2]);
        assert_eq!(a.iter().copied().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn inclusive_range_expands() {
        let a = parse_array_literal("1:2:9").unwrap();
        assert_eq!(a.iter().copied().collect::<Vec<_>>(), vec![1.0, 3.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn ragged_rows_rejected() {
        assert!(parse_array_literal("1 2; 3").is_err());
    }
}
