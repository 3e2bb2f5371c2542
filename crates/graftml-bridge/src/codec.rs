//! Structured-Value Codec
//!
//! Converts between nested values and the flat, positional sequences the
//! host autodiff engine works with. Flattening is depth-first and
//! left-to-right. A flat slot may be `None`, meaning "no value here",
//! which is distinct from a zero tensor.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use graftml_core::{Structure, Template};

use crate::error::{BridgeError, BridgeResult};

/// Leaves of `value` in depth-first, left-to-right order.
pub fn flatten<T: Clone>(value: &Structure<T>) -> Vec<T> {
    value.leaves().into_iter().cloned().collect()
}

/// Flattens `value` after checking it against `template`.
///
/// At every level the value must have as many children as the template,
/// except that an empty sequence stands in for a template of any length and
/// expands to one `None` per template leaf.
pub fn flatten_against<T: Clone>(
    value: &Structure<T>,
    template: &Template,
    path: &str,
) -> BridgeResult<Vec<Option<T>>> {
    let mut out = Vec::with_capacity(template.num_leaves());
    flatten_against_into(value, template, path, &mut out)?;
    Ok(out)
}

fn flatten_against_into<T: Clone>(
    value: &Structure<T>,
    template: &Template,
    path: &str,
    out: &mut Vec<Option<T>>,
) -> BridgeResult<()> {
    match (value, template) {
        (Structure::Leaf(v), Structure::Leaf(())) => out.push(Some(v.clone())),
        (Structure::Branch(values), Structure::Branch(slots)) if values.len() == slots.len() => {
            for (i, (v, t)) in values.iter().zip(slots).enumerate() {
                flatten_against_into(v, t, &format!("{path}[{i}]"), out)?;
            }
        }
        (Structure::Branch(values), Structure::Branch(_)) if values.is_empty() => {
            out.extend(std::iter::repeat_with(|| None).take(template.num_leaves()));
        }
        _ => {
            return Err(BridgeError::ShapeMismatch {
                path: path.to_string(),
                expected: template.outline(),
                actual: value.outline(),
            })
        }
    }
    Ok(())
}

/// Rebuilds a structure shaped like `template` from the front of `flat`.
///
/// Returns the structure and the number of elements consumed, so callers
/// walking several templates can continue from a shared cursor. Running out
/// of elements is an error.
pub fn unflatten<T: Clone>(flat: &[T], template: &Template) -> BridgeResult<(Structure<T>, usize)> {
    match template {
        Structure::Leaf(()) => flat
            .first()
            .map(|v| (Structure::leaf(v.clone()), 1))
            .ok_or_else(|| {
                BridgeError::Inconsistent(format!(
                    "flat sequence exhausted while rebuilding {}",
                    template.outline()
                ))
            }),
        Structure::Branch(children) => {
            let mut consumed = 0;
            let mut values = Vec::with_capacity(children.len());
            for child in children {
                let (value, n) = unflatten(&flat[consumed..], child)?;
                consumed += n;
                values.push(value);
            }
            Ok((Structure::branch(values), consumed))
        }
    }
}

/// Like [`unflatten`], but `flat` must be consumed exactly.
pub fn unflatten_exact<T: Clone>(flat: &[T], template: &Template) -> BridgeResult<Structure<T>> {
    let (value, consumed) = unflatten(flat, template)?;
    if consumed != flat.len() {
        return Err(BridgeError::Inconsistent(format!(
            "rebuilding {} consumed {consumed} of {} flat values",
            template.outline(),
            flat.len()
        )));
    }
    Ok(value)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(v: i32) -> Structure<i32> {
        Structure::leaf(v)
    }

    fn nested() -> Structure<i32> {
        Structure::branch(vec![
            leaf(1),
            Structure::branch(vec![leaf(2), Structure::branch(vec![leaf(3), leaf(4)])]),
            leaf(5),
        ])
    }

    #[test]
    fn test_flatten_order() {
        assert_eq!(flatten(&nested()), vec![1, 2, 3, 4, 5]);
        assert_eq!(flatten(&leaf(7)), vec![7]);
        assert!(flatten(&Structure::<i32>::branch(vec![])).is_empty());
    }

    #[test]
    fn test_unflatten_inverts_flatten() {
        let value = nested();
        let flat = flatten(&value);
        let (rebuilt, consumed) = unflatten(&flat, &value.template()).unwrap();
        assert_eq!(rebuilt, value);
        assert_eq!(consumed, 5);
    }

    #[test]
    fn test_unflatten_shared_cursor() {
        let t1 = Structure::branch(vec![Structure::leaf(()), Structure::leaf(())]);
        let t2 = Structure::leaf(());
        let flat = vec![1, 2, 3];
        let (a, n) = unflatten(&flat, &t1).unwrap();
        let (b, m) = unflatten(&flat[n..], &t2).unwrap();
        assert_eq!(flatten(&a), vec![1, 2]);
        assert_eq!(b, leaf(3));
        assert_eq!(n + m, 3);
    }

    #[test]
    fn test_unflatten_shortfall_and_leftover() {
        let template = nested().template();
        assert!(matches!(
            unflatten(&[1, 2], &template),
            Err(BridgeError::Inconsistent(_))
        ));
        assert!(matches!(
            unflatten_exact(&[1, 2, 3, 4, 5, 6], &template),
            Err(BridgeError::Inconsistent(_))
        ));
        assert!(unflatten_exact(&[1, 2, 3, 4, 5], &template).is_ok());
    }

    #[test]
    fn test_flatten_against_matching() {
        let value = nested();
        let flat = flatten_against(&value, &value.template(), "x").unwrap();
        assert_eq!(flat, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
    }

    #[test]
    fn test_empty_value_pads_with_none() {
        let template = nested().template();
        let empty = Structure::<i32>::branch(vec![]);
        let flat = flatten_against(&empty, &template, "x").unwrap();
        assert_eq!(flat, vec![None; 5]);

        // Padding also applies to nested positions.
        let partial = Structure::branch(vec![leaf(1), Structure::branch(vec![]), leaf(5)]);
        let flat = flatten_against(&partial, &template, "x").unwrap();
        assert_eq!(flat, vec![Some(1), None, None, None, Some(5)]);
    }

    #[test]
    fn test_length_mismatch_is_shape_error() {
        let template = nested().template();
        let short = Structure::branch(vec![leaf(1), leaf(2)]);
        let err = flatten_against(&short, &template, "grad_out@input_1").unwrap_err();
        match err {
            BridgeError::ShapeMismatch {
                path,
                expected,
                actual,
            } => {
                assert_eq!(path, "grad_out@input_1");
                assert_eq!(expected, "[*, [*, [*, *]], *]");
                assert_eq!(actual, "[*, *]");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_leaf_against_sequence_is_shape_error() {
        let template = Structure::branch(vec![Structure::leaf(())]);
        let err = flatten_against(&leaf(1), &template, "x").unwrap_err();
        assert!(matches!(err, BridgeError::ShapeMismatch { .. }));
    }
}
