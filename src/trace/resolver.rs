use crate::language::ast::Pattern;
use crate::language::span::Span;
use crate::trace::environment::Environment;
use crate::trace::error::{TraceError, TraceResult};
use crate::trace::value::{TraceValue, TupleBinding};

/// Resolves an index operand to a trace-time literal. There is no
/// runtime-indexed fallback: heterogeneous slots have no uniform
/// representation a runtime index could dispatch over.
pub fn constant_index(index: &TraceValue, span: Span) -> TraceResult<i64> {
    index
        .constant()
        .ok_or(TraceError::StaticIndex { span })
}

fn checked_position(tuple: &TupleBinding, index: &TraceValue, span: Span) -> TraceResult<usize> {
    let literal = constant_index(index, span)?;
    if literal < 0 || literal as usize >= tuple.arity() {
        return Err(TraceError::IndexOutOfRange {
            index: literal,
            arity: tuple.arity(),
            span,
        });
    }
    Ok(literal as usize)
}

pub fn index_read(
    tuple: &TupleBinding,
    index: &TraceValue,
    span: Span,
) -> TraceResult<TraceValue> {
    let position = checked_position(tuple, index, span)?;
    Ok(tuple.get(position).cloned().expect("position was validated"))
}

/// Returns a new binding with the slot replaced; the caller rebinds the
/// owning name. The replacement must match the existing slot structurally.
pub fn index_write(
    tuple: &TupleBinding,
    index: &TraceValue,
    new_value: TraceValue,
    span: Span,
) -> TraceResult<TupleBinding> {
    let position = checked_position(tuple, index, span)?;
    let existing = tuple.get(position).expect("position was validated");
    check_replacement(existing, &new_value, span)?;
    Ok(tuple.with_element(position, new_value))
}

fn check_replacement(existing: &TraceValue, new: &TraceValue, span: Span) -> TraceResult<()> {
    match (existing, new) {
        (TraceValue::Slot(old), TraceValue::Slot(replacement)) => {
            if old.tag.accepts(&replacement.tag) {
                Ok(())
            } else {
                Err(TraceError::TypeIncompatible {
                    expected: old.tag.to_string(),
                    found: replacement.tag.to_string(),
                    span,
                })
            }
        }
        (TraceValue::Tuple(old), TraceValue::Tuple(replacement)) => {
            if old.arity() != replacement.arity() {
                return Err(TraceError::ShapeMismatch {
                    message: format!(
                        "arity {} cannot replace arity {}",
                        replacement.arity(),
                        old.arity()
                    ),
                    span,
                });
            }
            for (old_elem, new_elem) in old.elements().iter().zip(replacement.elements()) {
                check_replacement(old_elem, new_elem, span)?;
            }
            Ok(())
        }
        (old, new) => Err(TraceError::ShapeMismatch {
            message: format!("{} cannot replace {}", new.describe(), old.describe()),
            span,
        }),
    }
}

pub fn construct(elements: Vec<TraceValue>) -> TupleBinding {
    TupleBinding::new(elements)
}

/// Structural destructuring: binds every leaf name in the current scope.
/// Arity disagreement at the top level is an arity mismatch; disagreement
/// inside nested structure is a shape mismatch.
pub fn destructure(
    tuple: &TupleBinding,
    patterns: &[Pattern],
    env: &mut Environment,
    span: Span,
) -> TraceResult<()> {
    if patterns.len() != tuple.arity() {
        return Err(TraceError::ArityMismatch {
            expected: patterns.len(),
            received: tuple.arity(),
            span,
        });
    }
    for (pattern, element) in patterns.iter().zip(tuple.elements()) {
        bind_pattern(pattern, element, env)?;
    }
    Ok(())
}

fn bind_pattern(pattern: &Pattern, value: &TraceValue, env: &mut Environment) -> TraceResult<()> {
    match pattern {
        Pattern::Name(ident) => {
            env.declare(&ident.name, value.clone());
            Ok(())
        }
        Pattern::Tuple(inner, span) => match value {
            TraceValue::Tuple(tuple) => {
                if inner.len() != tuple.arity() {
                    return Err(TraceError::ShapeMismatch {
                        message: format!(
                            "pattern of {} names against a tuple of arity {}",
                            inner.len(),
                            tuple.arity()
                        ),
                        span: *span,
                    });
                }
                for (sub, element) in inner.iter().zip(tuple.elements()) {
                    bind_pattern(sub, element, env)?;
                }
                Ok(())
            }
            other => Err(TraceError::ShapeMismatch {
                message: format!("tuple pattern against a {}", other.describe()),
                span: *span,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::ast::Identifier;
    use crate::trace::ir::ValueId;
    use crate::trace::value::{DType, TypeTag, ValueSlot};

    fn span() -> Span {
        Span::new(0, 1)
    }

    fn scalar(id: u32) -> TraceValue {
        TraceValue::Slot(ValueSlot::new(TypeTag::Scalar(DType::F32), ValueId(id)))
    }

    fn index(value: i64) -> TraceValue {
        TraceValue::Slot(ValueSlot::with_constant(
            TypeTag::Scalar(DType::I32),
            ValueId(100),
            value,
        ))
    }

    fn name(text: &str) -> Pattern {
        Pattern::Name(Identifier {
            name: text.into(),
            span: span(),
        })
    }

    fn tuple_of(ids: &[u32]) -> TupleBinding {
        construct(ids.iter().map(|id| scalar(*id)).collect())
    }

    #[test]
    fn read_after_write_returns_the_written_value() {
        let tuple = tuple_of(&[0, 1, 2]);
        for i in 0..3 {
            let written = index_write(&tuple, &index(i), scalar(40 + i as u32), span()).unwrap();
            let read = index_read(&written, &index(i), span()).unwrap();
            assert_eq!(read.as_slot().unwrap().id, ValueId(40 + i as u32));
        }
    }

    #[test]
    fn out_of_range_indices_fail_for_every_arity() {
        for arity in 0..4usize {
            let tuple = tuple_of(&(0..arity as u32).collect::<Vec<_>>());
            for bad in [-1, arity as i64, arity as i64 + 5] {
                assert!(matches!(
                    index_read(&tuple, &index(bad), span()),
                    Err(TraceError::IndexOutOfRange { .. })
                ));
                assert!(matches!(
                    index_write(&tuple, &index(bad), scalar(9), span()),
                    Err(TraceError::IndexOutOfRange { .. })
                ));
            }
        }
    }

    #[test]
    fn non_constant_index_is_a_static_index_error() {
        let tuple = tuple_of(&[0, 1]);
        let runtime_index = scalar(50); // no constant attached
        assert!(matches!(
            index_read(&tuple, &runtime_index, span()),
            Err(TraceError::StaticIndex { .. })
        ));
    }

    #[test]
    fn write_rejects_incompatible_slot_category() {
        let tuple = tuple_of(&[0]);
        let pointer = TraceValue::Slot(ValueSlot::new(TypeTag::Pointer(DType::F32), ValueId(9)));
        assert!(matches!(
            index_write(&tuple, &index(0), pointer, span()),
            Err(TraceError::TypeIncompatible { .. })
        ));
    }

    #[test]
    fn write_rejects_mismatched_dtype() {
        let tuple = tuple_of(&[0]);
        let f64_scalar = TraceValue::Slot(ValueSlot::new(TypeTag::Scalar(DType::F64), ValueId(9)));
        assert!(matches!(
            index_write(&tuple, &index(0), f64_scalar, span()),
            Err(TraceError::TypeIncompatible { .. })
        ));
    }

    #[test]
    fn nested_tuple_replacement_must_match_structure() {
        let inner = TraceValue::Tuple(tuple_of(&[1, 2]));
        let tuple = construct(vec![scalar(0), inner]);
        let wrong_arity = TraceValue::Tuple(tuple_of(&[5]));
        assert!(matches!(
            index_write(&tuple, &index(1), wrong_arity, span()),
            Err(TraceError::ShapeMismatch { .. })
        ));
        let right_shape = TraceValue::Tuple(tuple_of(&[7, 8]));
        assert!(index_write(&tuple, &index(1), right_shape, span()).is_ok());
    }

    #[test]
    fn construct_then_destructure_round_trips_in_order() {
        let tuple = tuple_of(&[10, 11, 12]);
        let mut env = Environment::new();
        let patterns = [name("a"), name("b"), name("c")];
        destructure(&tuple, &patterns, &mut env, span()).unwrap();
        for (i, n) in ["a", "b", "c"].iter().enumerate() {
            assert_eq!(
                env.get(n).unwrap().as_slot().unwrap().id,
                ValueId(10 + i as u32)
            );
        }
    }

    #[test]
    fn destructure_arity_mismatch_fails() {
        let tuple = tuple_of(&[0, 1, 2]);
        let mut env = Environment::new();
        let patterns = [name("a"), name("b")];
        assert!(matches!(
            destructure(&tuple, &patterns, &mut env, span()),
            Err(TraceError::ArityMismatch {
                expected: 2,
                received: 3,
                ..
            })
        ));
    }

    #[test]
    fn nested_destructure_recurses_and_checks_shape() {
        let inner = TraceValue::Tuple(tuple_of(&[1, 2]));
        let tuple = construct(vec![scalar(0), inner]);
        let mut env = Environment::new();
        let patterns = [
            name("a"),
            Pattern::Tuple(vec![name("b"), name("c")], span()),
        ];
        destructure(&tuple, &patterns, &mut env, span()).unwrap();
        assert_eq!(env.get("c").unwrap().as_slot().unwrap().id, ValueId(2));

        // a nested pattern against a flat slot disagrees in shape
        let flat = tuple_of(&[0, 1]);
        let bad = [
            name("a"),
            Pattern::Tuple(vec![name("b"), name("c")], span()),
        ];
        assert!(matches!(
            destructure(&flat, &bad, &mut env, span()),
            Err(TraceError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn empty_tuple_supports_everything_except_indexing() {
        let empty = TupleBinding::empty();
        let mut env = Environment::new();
        destructure(&empty, &[], &mut env, span()).unwrap();
        assert!(matches!(
            index_read(&empty, &index(0), span()),
            Err(TraceError::IndexOutOfRange { arity: 0, .. })
        ));
        assert!(matches!(
            index_write(&empty, &index(0), scalar(1), span()),
            Err(TraceError::IndexOutOfRange { arity: 0, .. })
        ));
    }
}
