use crate::trace::value::{DType, TypeTag};
use std::fmt;

/// Opaque handle into the traced value table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Flattened trace ops. Every operand is a single value slot; tuples do not
/// exist at this level.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Param {
        dst: ValueId,
        index: usize,
        tag: TypeTag,
    },
    Const {
        dst: ValueId,
        value: ConstValue,
        dtype: DType,
    },
    Load {
        dst: ValueId,
        ptr: ValueId,
        dtype: DType,
    },
    Add {
        dst: ValueId,
        lhs: ValueId,
        rhs: ValueId,
        dtype: DType,
    },
    Store {
        ptr: ValueId,
        value: ValueId,
    },
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Param { dst, index, tag } => write!(f, "{dst} = param {index} : {tag}"),
            Op::Const { dst, value, dtype } => write!(f, "{dst} = const {value} : {dtype}"),
            Op::Load { dst, ptr, dtype } => write!(f, "{dst} = load {ptr} : {dtype}"),
            Op::Add {
                dst,
                lhs,
                rhs,
                dtype,
            } => write!(f, "{dst} = add {lhs}, {rhs} : {dtype}"),
            Op::Store { ptr, value } => write!(f, "store {value} -> {ptr}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct IrBuilder {
    ops: Vec<Op>,
    next_id: u32,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh(&mut self) -> ValueId {
        let id = ValueId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn emit_param(&mut self, index: usize, tag: TypeTag) -> ValueId {
        let dst = self.fresh();
        self.ops.push(Op::Param { dst, index, tag });
        dst
    }

    pub fn emit_const_int(&mut self, value: i64, dtype: DType) -> ValueId {
        let dst = self.fresh();
        self.ops.push(Op::Const {
            dst,
            value: ConstValue::Int(value),
            dtype,
        });
        dst
    }

    pub fn emit_const_float(&mut self, value: f64, dtype: DType) -> ValueId {
        let dst = self.fresh();
        self.ops.push(Op::Const {
            dst,
            value: ConstValue::Float(value),
            dtype,
        });
        dst
    }

    pub fn emit_load(&mut self, ptr: ValueId, dtype: DType) -> ValueId {
        let dst = self.fresh();
        self.ops.push(Op::Load { dst, ptr, dtype });
        dst
    }

    pub fn emit_add(&mut self, lhs: ValueId, rhs: ValueId, dtype: DType) -> ValueId {
        let dst = self.fresh();
        self.ops.push(Op::Add {
            dst,
            lhs,
            rhs,
            dtype,
        });
        dst
    }

    pub fn emit_store(&mut self, ptr: ValueId, value: ValueId) {
        self.ops.push(Op::Store { ptr, value });
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<Op> {
        self.ops
    }
}
