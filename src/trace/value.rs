use crate::trace::ir::ValueId;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DType {
    I32,
    I64,
    F32,
    F64,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::F32 => "f32",
            DType::F64 => "f64",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeTag {
    Scalar(DType),
    Pointer(DType),
    Tensor(DType, Vec<usize>),
}

impl TypeTag {
    pub fn dtype(&self) -> DType {
        match self {
            TypeTag::Scalar(dtype) | TypeTag::Pointer(dtype) | TypeTag::Tensor(dtype, _) => *dtype,
        }
    }

    /// Replacement compatibility for slot writes: same category, same dtype,
    /// and for tensors the same shape. No implicit numeric widening.
    pub fn accepts(&self, other: &TypeTag) -> bool {
        match (self, other) {
            (TypeTag::Scalar(a), TypeTag::Scalar(b)) => a == b,
            (TypeTag::Pointer(a), TypeTag::Pointer(b)) => a == b,
            (TypeTag::Tensor(a, ashape), TypeTag::Tensor(b, bshape)) => {
                a == b && ashape == bshape
            }
            _ => false,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Scalar(dtype) => write!(f, "{dtype}"),
            TypeTag::Pointer(dtype) => write!(f, "*{dtype}"),
            TypeTag::Tensor(dtype, shape) => {
                let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
                write!(f, "tensor<{}x{dtype}>", dims.join("x"))
            }
        }
    }
}

/// The atomic traced value: a typed handle, immutable once created.
/// `constant` carries the literal alongside the handle when the value is
/// known at trace time; static tuple indexing resolves against it.
#[derive(Clone, Debug)]
pub struct ValueSlot {
    pub tag: TypeTag,
    pub id: ValueId,
    pub constant: Option<i64>,
}

impl ValueSlot {
    pub fn new(tag: TypeTag, id: ValueId) -> Self {
        Self {
            tag,
            id,
            constant: None,
        }
    }

    pub fn with_constant(tag: TypeTag, id: ValueId, constant: i64) -> Self {
        Self {
            tag,
            id,
            constant: Some(constant),
        }
    }
}

/// Fixed-arity ordered aggregate. Arity is set at construction and never
/// changes; "writing" a slot builds a new binding with that slot replaced.
#[derive(Clone, Debug, Default)]
pub struct TupleBinding {
    elements: Vec<TraceValue>,
}

impl TupleBinding {
    pub fn new(elements: Vec<TraceValue>) -> Self {
        Self { elements }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn arity(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> &[TraceValue] {
        &self.elements
    }

    pub fn get(&self, index: usize) -> Option<&TraceValue> {
        self.elements.get(index)
    }

    pub fn with_element(&self, index: usize, value: TraceValue) -> TupleBinding {
        let mut elements = self.elements.clone();
        elements[index] = value;
        TupleBinding { elements }
    }
}

#[derive(Clone, Debug)]
pub enum TraceValue {
    Slot(ValueSlot),
    Tuple(TupleBinding),
}

impl TraceValue {
    pub fn describe(&self) -> String {
        match self {
            TraceValue::Slot(slot) => match &slot.tag {
                TypeTag::Scalar(_) => format!("scalar {}", slot.tag),
                TypeTag::Pointer(_) => format!("pointer {}", slot.tag),
                TypeTag::Tensor(..) => format!("{}", slot.tag),
            },
            TraceValue::Tuple(tuple) => format!("tuple of arity {}", tuple.arity()),
        }
    }

    pub fn as_tuple(&self) -> Option<&TupleBinding> {
        match self {
            TraceValue::Tuple(tuple) => Some(tuple),
            TraceValue::Slot(_) => None,
        }
    }

    pub fn as_slot(&self) -> Option<&ValueSlot> {
        match self {
            TraceValue::Slot(slot) => Some(slot),
            TraceValue::Tuple(_) => None,
        }
    }

    pub fn constant(&self) -> Option<i64> {
        match self {
            TraceValue::Slot(slot) => slot.constant,
            TraceValue::Tuple(_) => None,
        }
    }

    /// Leaf slots in left-to-right depth-first order.
    pub fn flattened(&self) -> Vec<ValueSlot> {
        let mut slots = Vec::new();
        self.flatten_into(&mut slots);
        slots
    }

    fn flatten_into(&self, slots: &mut Vec<ValueSlot>) {
        match self {
            TraceValue::Slot(slot) => slots.push(slot.clone()),
            TraceValue::Tuple(tuple) => {
                for element in tuple.elements() {
                    element.flatten_into(slots);
                }
            }
        }
    }

    pub fn shape_matches(&self, other: &TraceValue) -> bool {
        match (self, other) {
            (TraceValue::Slot(a), TraceValue::Slot(b)) => a.tag.accepts(&b.tag),
            (TraceValue::Tuple(a), TraceValue::Tuple(b)) => {
                a.arity() == b.arity()
                    && a.elements()
                        .iter()
                        .zip(b.elements())
                        .all(|(x, y)| x.shape_matches(y))
            }
            _ => false,
        }
    }

    /// The unit marker is the arity-0 tuple.
    pub fn unit() -> TraceValue {
        TraceValue::Tuple(TupleBinding::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(id: u32) -> TraceValue {
        TraceValue::Slot(ValueSlot::new(TypeTag::Scalar(DType::F32), ValueId(id)))
    }

    fn pointer(id: u32) -> TraceValue {
        TraceValue::Slot(ValueSlot::new(TypeTag::Pointer(DType::F32), ValueId(id)))
    }

    #[test]
    fn flattening_is_depth_first_left_to_right() {
        let nested = TraceValue::Tuple(TupleBinding::new(vec![
            scalar(0),
            TraceValue::Tuple(TupleBinding::new(vec![scalar(1), pointer(2)])),
            scalar(3),
        ]));
        let ids: Vec<u32> = nested.flattened().iter().map(|s| s.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn with_element_leaves_the_original_untouched() {
        let tuple = TupleBinding::new(vec![scalar(0), scalar(1)]);
        let updated = tuple.with_element(1, scalar(9));
        assert_eq!(tuple.get(1).unwrap().as_slot().unwrap().id, ValueId(1));
        assert_eq!(updated.get(1).unwrap().as_slot().unwrap().id, ValueId(9));
        assert_eq!(tuple.arity(), updated.arity());
    }

    #[test]
    fn shape_matching_requires_identical_structure() {
        let flat = TraceValue::Tuple(TupleBinding::new(vec![scalar(0), scalar(1)]));
        let same = TraceValue::Tuple(TupleBinding::new(vec![scalar(2), scalar(3)]));
        let nested = TraceValue::Tuple(TupleBinding::new(vec![
            scalar(0),
            TraceValue::Tuple(TupleBinding::new(vec![scalar(1)])),
        ]));
        assert!(flat.shape_matches(&same));
        assert!(!flat.shape_matches(&nested));
        assert!(!flat.shape_matches(&scalar(0)));
    }

    #[test]
    fn tags_reject_cross_category_and_cross_dtype_replacement() {
        let f32_scalar = TypeTag::Scalar(DType::F32);
        assert!(f32_scalar.accepts(&TypeTag::Scalar(DType::F32)));
        assert!(!f32_scalar.accepts(&TypeTag::Scalar(DType::F64)));
        assert!(!f32_scalar.accepts(&TypeTag::Pointer(DType::F32)));
        let t1 = TypeTag::Tensor(DType::F32, vec![4, 4]);
        assert!(!t1.accepts(&TypeTag::Tensor(DType::F32, vec![4, 2])));
    }

    #[test]
    fn unit_is_the_empty_tuple() {
        let unit = TraceValue::unit();
        assert_eq!(unit.as_tuple().unwrap().arity(), 0);
        assert!(unit.flattened().is_empty());
    }
}
