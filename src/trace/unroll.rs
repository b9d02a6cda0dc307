use crate::language::ast::ForLoop;
use crate::trace::error::{TraceError, TraceResult};
use crate::trace::tracer::{BlockFlow, Tracer};
use crate::trace::value::{DType, TraceValue, TypeTag, ValueSlot};

impl Tracer<'_> {
    /// Expands `for i in range(n)` into `n` consecutive trace steps. Each
    /// step binds the loop variable to a constant slot in a transient scope,
    /// so a body indexing a tuple with `i` touches a statically-known slot.
    /// Rebinds of enclosing names survive the transient scope; everything
    /// else is discarded between steps.
    pub(crate) fn unroll_static_range(&mut self, for_loop: &ForLoop) -> TraceResult<BlockFlow> {
        let bound = self.trace_expr(&for_loop.bound)?;
        let length = match bound.constant() {
            Some(length) => length.max(0),
            None => {
                return Err(TraceError::StaticIndex {
                    span: for_loop.bound.span(),
                });
            }
        };

        for index in 0..length {
            self.env.push_scope();
            let id = self.ir.emit_const_int(index, DType::I32);
            self.env.declare(
                &for_loop.binding.name,
                TraceValue::Slot(ValueSlot::with_constant(
                    TypeTag::Scalar(DType::I32),
                    id,
                    index,
                )),
            );
            let step = self.trace_block(&for_loop.body);
            self.env.pop_scope();

            match step {
                Ok(BlockFlow::Normal) => {}
                Ok(flow @ BlockFlow::Return(_)) => return Ok(flow),
                Err(source) => {
                    return Err(TraceError::InUnrolledIteration {
                        index: index as usize,
                        source: Box::new(source),
                    });
                }
            }
        }
        Ok(BlockFlow::Normal)
    }
}
