//! The boundary toward the parser, compiler and assembler.
//! Those live outside the runtime; this module holds the shapes they
//! hand back, and the options they are given.
//!
//! Each step turns one datatype into another:
//! ~> Source (text)
//! -> Value          : parse, a `ParseResult`
//! -> Lambda         : compile or assemble, a `CompileResult` or `AssembleResult`
//! ~> Closure        : instantiated by the runtime, run on a fiber

pub mod compile;
pub mod parse;

use std::rc::Rc;

use thiserror::Error;

use crate::common::{
    source::Source,
    span::Span,
};
pub use crate::pipeline::{
    compile::{
        AssembleOptions,
        AssembleResult,
        AssembleStatus,
        CompileOptions,
        CompileResult,
        CompileStatus,
    },
    parse::{
        ParseResult,
        ParseStatus,
    },
};

/// A fault from a pipeline step, located in the source text
/// by the byte range `start..end`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (bytes {start}..{end})")]
pub struct PipelineError {
    pub message: String,
    pub start:   usize,
    pub end:     usize,
}

impl PipelineError {
    pub fn new(message: &str, start: usize, end: usize) -> PipelineError {
        PipelineError {
            message: message.to_string(),
            start,
            end,
        }
    }

    /// Where in `source` the fault happened.
    pub fn span(&self, source: &Rc<Source>) -> Span { Span::range(source, self.start, self.end) }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn located() {
        let source = Source::source("(def x (+ 1 \"a\"))");
        let error = PipelineError::new("bad operand", 12, 15);
        assert_eq!(error.span(&source).contents(), "\"a\"");
        assert_eq!(error.to_string(), "bad operand (bytes 12..15)");
    }
}
