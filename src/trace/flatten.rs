use crate::language::ast::Identifier;
use crate::language::span::Span;
use crate::trace::environment::Environment;
use crate::trace::error::{TraceError, TraceResult};
use crate::trace::resolver;
use crate::trace::tracer::{BlockFlow, Tracer};
use crate::trace::value::{TraceValue, ValueSlot};

/// Expands a formal parameter list against the shapes of this call site's
/// actual arguments: one dotted name per leaf slot, left-to-right depth
/// first. Shapes are static per specialization, so the expansion is exact.
pub fn expand_formals(formals: &[Identifier], actuals: &[TraceValue]) -> Vec<String> {
    let mut names = Vec::new();
    for (formal, actual) in formals.iter().zip(actuals) {
        expand_leaf_names(&formal.name, actual, &mut names);
    }
    names
}

fn expand_leaf_names(prefix: &str, value: &TraceValue, names: &mut Vec<String>) {
    match value {
        TraceValue::Slot(_) => names.push(prefix.to_string()),
        TraceValue::Tuple(tuple) => {
            for (index, element) in tuple.elements().iter().enumerate() {
                expand_leaf_names(&format!("{prefix}.{index}"), element, names);
            }
        }
    }
}

/// Binds flattened actual slots to expanded formal names 1:1. The counts
/// must agree exactly; nothing is truncated or padded.
pub fn bind_arguments(
    expanded_formals: &[String],
    flat_actuals: Vec<ValueSlot>,
    env: &mut Environment,
    span: Span,
) -> TraceResult<()> {
    if expanded_formals.len() != flat_actuals.len() {
        return Err(TraceError::ArityMismatch {
            expected: expanded_formals.len(),
            received: flat_actuals.len(),
            span,
        });
    }
    for (name, slot) in expanded_formals.iter().zip(flat_actuals) {
        env.declare(name, TraceValue::Slot(slot));
    }
    Ok(())
}

/// Several returned values form a tuple, one passes through unwrapped, none
/// yield the unit marker.
pub fn assemble_return(mut values: Vec<TraceValue>) -> TraceValue {
    match values.len() {
        0 => TraceValue::unit(),
        1 => values.pop().expect("length was checked"),
        _ => TraceValue::Tuple(resolver::construct(values)),
    }
}

impl Tracer<'_> {
    /// Inlines a call: the callee body is traced in a fresh child scope with
    /// arguments pre-bound and the result substituted at the call site. The
    /// target has no call stack for tuple-shaped values, so every call gets
    /// its own flattened layout.
    pub(crate) fn inline_call(
        &mut self,
        callee: &Identifier,
        args: Vec<TraceValue>,
        span: Span,
    ) -> TraceResult<TraceValue> {
        let def = self
            .function(&callee.name)
            .ok_or_else(|| TraceError::UnknownFunction {
                name: callee.name.clone(),
                span: callee.span,
            })?;
        if def.params.len() != args.len() {
            return Err(TraceError::ArityMismatch {
                expected: def.params.len(),
                received: args.len(),
                span,
            });
        }

        let expanded = expand_formals(&def.params, &args);
        let flattened: Vec<ValueSlot> = args.iter().flat_map(|arg| arg.flattened()).collect();

        self.env.push_scope();
        let flow = (|| {
            bind_arguments(&expanded, flattened, &mut self.env, span)?;
            for (param, arg) in def.params.iter().zip(args) {
                self.env.declare(&param.name, arg);
            }
            self.trace_block(&def.body)
        })();
        self.env.pop_scope();

        match flow? {
            BlockFlow::Return(value) => Ok(value),
            BlockFlow::Normal => Ok(TraceValue::unit()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::ir::ValueId;
    use crate::trace::value::{DType, TupleBinding, TypeTag};

    fn span() -> Span {
        Span::new(0, 1)
    }

    fn ident(name: &str) -> Identifier {
        Identifier {
            name: name.into(),
            span: span(),
        }
    }

    fn scalar(id: u32) -> TraceValue {
        TraceValue::Slot(ValueSlot::new(TypeTag::Scalar(DType::F32), ValueId(id)))
    }

    #[test]
    fn formals_expand_against_actual_shapes_depth_first() {
        let formals = [ident("p"), ident("values")];
        let actuals = [
            scalar(0),
            TraceValue::Tuple(TupleBinding::new(vec![
                scalar(1),
                TraceValue::Tuple(TupleBinding::new(vec![scalar(2), scalar(3)])),
            ])),
        ];
        assert_eq!(
            expand_formals(&formals, &actuals),
            vec!["p", "values.0", "values.1.0", "values.1.1"]
        );
    }

    #[test]
    fn bind_arguments_requires_exact_flattened_counts() {
        let mut env = Environment::new();
        let names = vec!["a".to_string(), "b".to_string()];
        let slots = vec![
            ValueSlot::new(TypeTag::Scalar(DType::F32), ValueId(0)),
        ];
        assert!(matches!(
            bind_arguments(&names, slots, &mut env, span()),
            Err(TraceError::ArityMismatch {
                expected: 2,
                received: 1,
                ..
            })
        ));
    }

    #[test]
    fn bind_arguments_binds_leaves_in_order() {
        let mut env = Environment::new();
        let names = vec!["values.0".to_string(), "values.1".to_string()];
        let slots = vec![
            ValueSlot::new(TypeTag::Scalar(DType::F32), ValueId(4)),
            ValueSlot::new(TypeTag::Scalar(DType::F32), ValueId(5)),
        ];
        bind_arguments(&names, slots, &mut env, span()).unwrap();
        assert_eq!(env.get("values.0").unwrap().as_slot().unwrap().id, ValueId(4));
        assert_eq!(env.get("values.1").unwrap().as_slot().unwrap().id, ValueId(5));
    }

    #[test]
    fn assemble_return_wraps_only_multiple_values() {
        assert!(matches!(
            assemble_return(vec![]),
            TraceValue::Tuple(tuple) if tuple.arity() == 0
        ));
        assert!(matches!(assemble_return(vec![scalar(0)]), TraceValue::Slot(_)));
        assert!(matches!(
            assemble_return(vec![scalar(0), scalar(1)]),
            TraceValue::Tuple(tuple) if tuple.arity() == 2
        ));
    }
}
