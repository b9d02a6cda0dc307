use crate::language::span::Span;
use thiserror::Error;

pub type TraceResult<T> = Result<T, TraceError>;

/// Trace-time compile errors. Every variant carries the offending source
/// span; the first error aborts the specialization being traced.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("tuple index must be a compile-time constant")]
    StaticIndex { span: Span },
    #[error("index {index} is out of range for a tuple of arity {arity}")]
    IndexOutOfRange { index: i64, arity: usize, span: Span },
    #[error("expected {expected} values but received {received}")]
    ArityMismatch {
        expected: usize,
        received: usize,
        span: Span,
    },
    #[error("tuple shapes do not match: {message}")]
    ShapeMismatch { message: String, span: Span },
    #[error("cannot use a {found} value where a {expected} is required")]
    TypeIncompatible {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("unknown symbol `{name}`")]
    UnknownSymbol { name: String, span: Span },
    #[error("unknown function `{name}`")]
    UnknownFunction { name: String, span: Span },
    #[error("expected a tuple but found a {found}")]
    NotATuple { found: String, span: Span },
    #[error("operation not supported: {message}")]
    Unsupported { message: String, span: Span },
    #[error("{source} (in unrolled iteration {index})")]
    InUnrolledIteration {
        index: usize,
        #[source]
        source: Box<TraceError>,
    },
}

impl TraceError {
    pub fn span(&self) -> Span {
        match self {
            TraceError::StaticIndex { span }
            | TraceError::IndexOutOfRange { span, .. }
            | TraceError::ArityMismatch { span, .. }
            | TraceError::ShapeMismatch { span, .. }
            | TraceError::TypeIncompatible { span, .. }
            | TraceError::UnknownSymbol { span, .. }
            | TraceError::UnknownFunction { span, .. }
            | TraceError::NotATuple { span, .. }
            | TraceError::Unsupported { span, .. } => *span,
            TraceError::InUnrolledIteration { source, .. } => source.span(),
        }
    }

    /// The innermost error, looking through unroll annotations.
    pub fn root(&self) -> &TraceError {
        match self {
            TraceError::InUnrolledIteration { source, .. } => source.root(),
            other => other,
        }
    }
}
