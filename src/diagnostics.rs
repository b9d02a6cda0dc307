use crate::language::errors::ParseErrors;
use crate::trace::error::TraceError;
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct SyntaxDiagnostic {
    #[source_code]
    src: NamedSource,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct TraceDiagnostic {
    #[source_code]
    src: NamedSource,
    #[label("trace aborted here")]
    span: SourceSpan,
    message: String,
}

impl TraceDiagnostic {
    pub fn from_error(src: NamedSource, err: &TraceError) -> Self {
        let span = err.span();
        Self {
            src,
            span: (span.start, span.len()).into(),
            message: err.to_string(),
        }
    }
}

pub fn emit_syntax_errors(path: &str, source: &str, errors: &ParseErrors) {
    for err in &errors.errors {
        let diagnostic = SyntaxDiagnostic {
            src: NamedSource::new(path, source.to_string()),
            span: err.to_source_span(),
            help: err.help.clone(),
            message: err.message.clone(),
            label: err.label.clone(),
        };
        eprintln!("{:?}", Report::new(diagnostic));
    }
}

pub fn report_trace_error(path: &str, source: &str, error: &TraceError) {
    let diagnostic =
        TraceDiagnostic::from_error(NamedSource::new(path, source.to_string()), error);
    eprintln!("{:?}", Report::new(diagnostic));
}
