use thiserror::Error;

use crate::{
    common::data::Kind,
    vm::fiber::FiberStatus,
};

/// A runtime or value fault, reported by the operation that detected it.
/// Faults never unwind: every fallible operation returns a `Result`,
/// and an operation that fails leaves its target unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: Kind, found: Kind },

    #[error("index {index} out of range for length {count}")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("expected {} arguments, got {got}", arity_text(.arity, .variadic))]
    Arity {
        arity:    usize,
        variadic: bool,
        got:      usize,
    },

    #[error("{pushed} values were pushed for a call taking {argc} arguments")]
    ArgumentCount { pushed: usize, argc: usize },

    #[error("can not pop from an empty {0}")]
    Empty(Kind),

    #[error("table keys can not be nil")]
    NilKey,

    #[error("fiber is {0}")]
    FiberNotAlive(FiberStatus),

    #[error("fiber can not go from {from} to {to}")]
    InvalidTransition { from: FiberStatus, to: FiberStatus },

    #[error("fiber is borrowed elsewhere")]
    FiberBusy,

    #[error("cell {0} holds a frame header")]
    FrameHeader(usize),

    #[error("no frame on the fiber")]
    NoFrame,

    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("environment outlived its fiber")]
    Detached,

    #[error("{0} does not support {1}")]
    Unsupported(String, &'static str),

    #[error("out of memory")]
    OutOfMemory,
}

fn arity_text(arity: &usize, variadic: &bool) -> String {
    if *variadic {
        format!("at least {}", arity)
    } else {
        arity.to_string()
    }
}

impl From<std::collections::TryReserveError> for Fault {
    fn from(_: std::collections::TryReserveError) -> Fault { Fault::OutOfMemory }
}
