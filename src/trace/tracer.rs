use crate::language::ast::{
    BinaryOp, Block, Expr, KernelDef, Literal, Pattern, Program, Statement,
};
use crate::language::span::Span;
use crate::trace::environment::Environment;
use crate::trace::error::{TraceError, TraceResult};
use crate::trace::ir::{IrBuilder, Op};
use crate::trace::resolver;
use crate::trace::value::{DType, TraceValue, TupleBinding, TypeTag, ValueSlot};
use std::collections::HashMap;

/// Shape of one specialization argument. `Constexpr` is a parameter already
/// resolved to a literal; the other kinds become flattened kernel parameters.
#[derive(Clone, Debug)]
pub enum ArgSpec {
    Constexpr(i64),
    Scalar(DType),
    Pointer(DType),
    Tensor(DType, Vec<usize>),
    Tuple(Vec<ArgSpec>),
}

#[derive(Debug)]
pub struct TraceOutput {
    pub ops: Vec<Op>,
    pub result: TraceValue,
}

/// Traces one kernel for one specialization, returning the flattened op list
/// and the kernel's result binding.
pub fn trace_function(
    program: &Program,
    kernel: &str,
    args: &[ArgSpec],
) -> TraceResult<TraceOutput> {
    let mut tracer = Tracer::new(program);
    let result = tracer.trace_kernel(kernel, args)?;
    Ok(TraceOutput {
        ops: tracer.ir.into_ops(),
        result,
    })
}

pub(crate) enum BlockFlow {
    Normal,
    Return(TraceValue),
}

/// One trace context. Owns its environment and op builder, so distinct
/// specializations can trace on independent threads without shared state.
pub struct Tracer<'p> {
    functions: HashMap<&'p str, &'p KernelDef>,
    pub(crate) env: Environment,
    pub(crate) ir: IrBuilder,
}

impl<'p> Tracer<'p> {
    pub fn new(program: &'p Program) -> Self {
        let functions = program
            .kernels
            .iter()
            .map(|kernel| (kernel.name.name.as_str(), kernel))
            .collect();
        Self {
            functions,
            env: Environment::new(),
            ir: IrBuilder::new(),
        }
    }

    pub(crate) fn function(&self, name: &str) -> Option<&'p KernelDef> {
        self.functions.get(name).copied()
    }

    pub fn trace_kernel(&mut self, name: &str, args: &[ArgSpec]) -> TraceResult<TraceValue> {
        let kernel = self
            .function(name)
            .ok_or_else(|| TraceError::UnknownFunction {
                name: name.to_string(),
                span: Span::new(0, 0),
            })?;
        if kernel.params.len() != args.len() {
            return Err(TraceError::ArityMismatch {
                expected: kernel.params.len(),
                received: args.len(),
                span: kernel.span,
            });
        }

        let mut next_param = 0usize;
        for (param, spec) in kernel.params.iter().zip(args) {
            let value = self.seed_argument(spec, &mut next_param);
            self.env.declare(&param.name, value);
        }

        match self.trace_block(&kernel.body)? {
            BlockFlow::Return(value) => Ok(value),
            BlockFlow::Normal => Ok(TraceValue::unit()),
        }
    }

    fn seed_argument(&mut self, spec: &ArgSpec, next_param: &mut usize) -> TraceValue {
        match spec {
            ArgSpec::Constexpr(value) => {
                let id = self.ir.emit_const_int(*value, DType::I32);
                TraceValue::Slot(ValueSlot::with_constant(
                    TypeTag::Scalar(DType::I32),
                    id,
                    *value,
                ))
            }
            ArgSpec::Scalar(dtype) => self.seed_param(TypeTag::Scalar(*dtype), next_param),
            ArgSpec::Pointer(dtype) => self.seed_param(TypeTag::Pointer(*dtype), next_param),
            ArgSpec::Tensor(dtype, shape) => {
                self.seed_param(TypeTag::Tensor(*dtype, shape.clone()), next_param)
            }
            ArgSpec::Tuple(specs) => {
                let elements = specs
                    .iter()
                    .map(|spec| self.seed_argument(spec, next_param))
                    .collect();
                TraceValue::Tuple(TupleBinding::new(elements))
            }
        }
    }

    fn seed_param(&mut self, tag: TypeTag, next_param: &mut usize) -> TraceValue {
        let index = *next_param;
        *next_param += 1;
        let id = self.ir.emit_param(index, tag.clone());
        TraceValue::Slot(ValueSlot::new(tag, id))
    }

    pub(crate) fn trace_block(&mut self, block: &Block) -> TraceResult<BlockFlow> {
        for statement in &block.statements {
            if let BlockFlow::Return(value) = self.trace_statement(statement)? {
                return Ok(BlockFlow::Return(value));
            }
        }
        Ok(BlockFlow::Normal)
    }

    fn trace_statement(&mut self, statement: &Statement) -> TraceResult<BlockFlow> {
        match statement {
            Statement::Let { name, value, .. } => {
                let value = self.trace_expr(value)?;
                self.env.declare(&name.name, value);
                Ok(BlockFlow::Normal)
            }
            Statement::Assign { name, value, .. } => {
                let value = self.trace_expr(value)?;
                self.env.assign(&name.name, value);
                Ok(BlockFlow::Normal)
            }
            Statement::SlotAssign {
                target,
                index,
                value,
                span,
            } => {
                let tuple = match self.env.get(&target.name) {
                    Some(TraceValue::Tuple(tuple)) => tuple.clone(),
                    Some(other) => {
                        return Err(TraceError::NotATuple {
                            found: other.describe(),
                            span: target.span,
                        });
                    }
                    None => {
                        return Err(TraceError::UnknownSymbol {
                            name: target.name.clone(),
                            span: target.span,
                        });
                    }
                };
                let index = self.trace_expr(index)?;
                let value = self.trace_expr(value)?;
                let updated = resolver::index_write(&tuple, &index, value, *span)?;
                self.env.assign(&target.name, TraceValue::Tuple(updated));
                Ok(BlockFlow::Normal)
            }
            Statement::Destructure {
                pattern,
                value,
                span,
            } => {
                let value = self.trace_expr(value)?;
                match pattern {
                    Pattern::Tuple(patterns, _) => match &value {
                        TraceValue::Tuple(tuple) => {
                            resolver::destructure(tuple, patterns, &mut self.env, *span)?;
                        }
                        other => {
                            return Err(TraceError::NotATuple {
                                found: other.describe(),
                                span: *span,
                            });
                        }
                    },
                    Pattern::Name(name) => {
                        self.env.assign(&name.name, value);
                    }
                }
                Ok(BlockFlow::Normal)
            }
            Statement::For(for_loop) => self.unroll_static_range(for_loop),
            Statement::Return { values, .. } => {
                let mut traced = Vec::with_capacity(values.len());
                for value in values {
                    traced.push(self.trace_expr(value)?);
                }
                Ok(BlockFlow::Return(super::flatten::assemble_return(traced)))
            }
            Statement::Expr(expr) => {
                self.trace_expr(expr)?;
                Ok(BlockFlow::Normal)
            }
        }
    }

    pub(crate) fn trace_expr(&mut self, expr: &Expr) -> TraceResult<TraceValue> {
        match expr {
            Expr::Literal(Literal::Int(value, _)) => {
                let id = self.ir.emit_const_int(*value, DType::I32);
                Ok(TraceValue::Slot(ValueSlot::with_constant(
                    TypeTag::Scalar(DType::I32),
                    id,
                    *value,
                )))
            }
            Expr::Literal(Literal::Float(value, _)) => {
                let id = self.ir.emit_const_float(*value, DType::F32);
                Ok(TraceValue::Slot(ValueSlot::new(
                    TypeTag::Scalar(DType::F32),
                    id,
                )))
            }
            Expr::Identifier(ident) => {
                self.env
                    .get(&ident.name)
                    .cloned()
                    .ok_or_else(|| TraceError::UnknownSymbol {
                        name: ident.name.clone(),
                        span: ident.span,
                    })
            }
            Expr::Tuple(elements, _) => {
                let mut traced = Vec::with_capacity(elements.len());
                for element in elements {
                    traced.push(self.trace_expr(element)?);
                }
                Ok(TraceValue::Tuple(resolver::construct(traced)))
            }
            Expr::Index {
                target,
                index,
                span,
            } => {
                let traced = self.trace_expr(target)?;
                let tuple = traced.as_tuple().ok_or_else(|| TraceError::NotATuple {
                    found: traced.describe(),
                    span: target.span(),
                })?;
                let index = self.trace_expr(index)?;
                resolver::index_read(tuple, &index, *span)
            }
            Expr::Binary {
                left,
                op: BinaryOp::Add,
                right,
                span,
            } => {
                let lhs = self.expect_scalar(left)?;
                let rhs = self.expect_scalar(right)?;
                let dtype = lhs.tag.dtype();
                if rhs.tag.dtype() != dtype {
                    return Err(TraceError::TypeIncompatible {
                        expected: lhs.tag.to_string(),
                        found: rhs.tag.to_string(),
                        span: *span,
                    });
                }
                let id = self.ir.emit_add(lhs.id, rhs.id, dtype);
                let constant = match (lhs.constant, rhs.constant) {
                    (Some(a), Some(b)) => Some(a + b),
                    _ => None,
                };
                Ok(TraceValue::Slot(ValueSlot {
                    tag: TypeTag::Scalar(dtype),
                    id,
                    constant,
                }))
            }
            Expr::Call { callee, args, span } => self.trace_call(callee, args, *span),
        }
    }

    fn trace_call(
        &mut self,
        callee: &crate::language::ast::Identifier,
        args: &[Expr],
        span: Span,
    ) -> TraceResult<TraceValue> {
        match callee.name.as_str() {
            "len" => {
                let [arg] = args else {
                    return Err(TraceError::ArityMismatch {
                        expected: 1,
                        received: args.len(),
                        span,
                    });
                };
                let value = self.trace_expr(arg)?;
                let tuple = value.as_tuple().ok_or_else(|| TraceError::NotATuple {
                    found: value.describe(),
                    span: arg.span(),
                })?;
                let arity = tuple.arity() as i64;
                let id = self.ir.emit_const_int(arity, DType::I32);
                Ok(TraceValue::Slot(ValueSlot::with_constant(
                    TypeTag::Scalar(DType::I32),
                    id,
                    arity,
                )))
            }
            "load" => {
                let [arg] = args else {
                    return Err(TraceError::ArityMismatch {
                        expected: 1,
                        received: args.len(),
                        span,
                    });
                };
                let value = self.trace_expr(arg)?;
                let pointer = self.expect_pointer(&value, arg.span())?;
                let dtype = pointer.tag.dtype();
                let id = self.ir.emit_load(pointer.id, dtype);
                Ok(TraceValue::Slot(ValueSlot::new(
                    TypeTag::Scalar(dtype),
                    id,
                )))
            }
            "store" => {
                let [ptr_arg, value_arg] = args else {
                    return Err(TraceError::ArityMismatch {
                        expected: 2,
                        received: args.len(),
                        span,
                    });
                };
                let ptr = self.trace_expr(ptr_arg)?;
                let pointer = self.expect_pointer(&ptr, ptr_arg.span())?;
                let value = self.expect_scalar(value_arg)?;
                self.ir.emit_store(pointer.id, value.id);
                Ok(TraceValue::unit())
            }
            "range" => Err(TraceError::Unsupported {
                message: "range(...) is only valid as a for-loop bound".into(),
                span,
            }),
            _ => {
                let mut traced = Vec::with_capacity(args.len());
                for arg in args {
                    traced.push(self.trace_expr(arg)?);
                }
                self.inline_call(callee, traced, span)
            }
        }
    }

    fn expect_scalar(&mut self, expr: &Expr) -> TraceResult<ValueSlot> {
        let value = self.trace_expr(expr)?;
        match value {
            TraceValue::Slot(
                slot @ ValueSlot {
                    tag: TypeTag::Scalar(_),
                    ..
                },
            ) => Ok(slot),
            other => Err(TraceError::TypeIncompatible {
                expected: "scalar".into(),
                found: other.describe(),
                span: expr.span(),
            }),
        }
    }

    fn expect_pointer(&self, value: &TraceValue, span: Span) -> TraceResult<ValueSlot> {
        match value {
            TraceValue::Slot(
                slot @ ValueSlot {
                    tag: TypeTag::Pointer(_),
                    ..
                },
            ) => Ok(slot.clone()),
            other => Err(TraceError::TypeIncompatible {
                expected: "pointer".into(),
                found: other.describe(),
                span,
            }),
        }
    }
}
