//! # dst
//! The value and stack core of a small bytecode-driven lisp runtime.
//! Everything a running program touches is built from one cell type,
//! [`Value`], and every call lives on the stack of a [`Fiber`].
//!
//! The parser, compiler, and interpreter loop live outside this crate;
//! [`pipeline`] holds the shapes they exchange with it.
//!
//! ## Values
//! A `Value` is nil, a boolean, a 32-bit integer, a double, or a
//! reference to a heap object: strings, symbols, arrays, tuples,
//! tables, structs, buffers, functions, native functions, userdata,
//! and fibers.
//! With the default `nanbox` feature on x86-64 and non-Android aarch64 every value is
//! a single NaN-tagged word; otherwise it is a plain tagged union.
//! Both behave the same, see [`value::ENCODING`].
//!
//! ```
//! use dst::{Kind, Value};
//!
//! let answer = Value::integer(42);
//! assert_eq!(answer.kind(), Kind::Int32);
//! assert_eq!(answer.as_integer(), Ok(42));
//! assert!(!Value::nil().truthy());
//! ```
//!
//! ## Fibers
//! A fiber is a green thread: a growable stack of values holding its
//! call frames. Closures capture frame locals in place, and the
//! captured environments are copied off the stack when the frame
//! that owns them is popped.
//!
//! ```
//! use std::rc::Rc;
//! use dst::{Closure, FiberConfig, FiberHandle, LambdaBuilder, Value};
//!
//! let fiber = FiberHandle::new(FiberConfig::default());
//! let mut running = fiber.try_borrow_mut().unwrap();
//! let square = Rc::new(Closure::wrap(LambdaBuilder::new().arity(1).build()));
//!
//! running.push(Value::integer(7)).unwrap();
//! running.push_frame(square, 1).unwrap();
//! assert_eq!(running.local(0), Ok(Value::integer(7)));
//! ```

pub mod common;
pub mod pipeline;
pub mod vm;

pub use crate::{
    common::{
        array::Array,
        buffer::Buffer,
        captured::Captured,
        closure::Closure,
        data::{
            Data,
            Kind,
        },
        fault::Fault,
        lambda::{
            Flags,
            Lambda,
            LambdaBuilder,
        },
        native::{
            Native,
            NativeFunction,
            Reg,
        },
        source::Source,
        span::Span,
        string::Str,
        table::Table,
        tuple::{
            Struct,
            Tuple,
        },
        userdata::{
            UserType,
            Userdata,
        },
        value::{
            Value,
            ENCODING,
        },
    },
    pipeline::PipelineError,
    vm::{
        config::FiberConfig,
        fiber::{
            Fiber,
            FiberHandle,
            FiberStatus,
            Signal,
            Transfer,
        },
        stack::{
            StackFrame,
            FRAME_SIZE,
        },
        trace::Trace,
    },
};
