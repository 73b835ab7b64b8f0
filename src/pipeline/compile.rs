use std::rc::Rc;

use crate::{
    common::{
        closure::Closure,
        lambda::Lambda,
        value::Value,
    },
    pipeline::PipelineError,
};

/// Options handed to the compiler.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub flags:     u32,
    /// The sourcemap the parser produced for `source`.
    pub sourcemap: Value,
    pub source:    Value,
    /// The table of bindings the compiled code sees.
    pub env:       Value,
}

/// Options handed to the assembler.
#[derive(Debug, Clone, Default)]
pub struct AssembleOptions {
    pub sourcemap: Value,
    pub source:    Value,
    pub flags:     u32,
}

/// Defines the result of a step producing a `Lambda`.
/// Compiling and assembling report the same shape.
macro_rules! lambda_result {
    ($(#[$doc:meta])* $result:ident, $status:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $status {
            Ok,
            Error,
        }

        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $result {
            pub status:       $status,
            pub function_def: Option<Rc<Lambda>>,
            pub error:        Option<String>,
            /// Byte range of the fault in the source.
            pub error_range:  (usize, usize),
        }

        impl $result {
            pub fn ok(lambda: Lambda) -> $result {
                $result {
                    status:       $status::Ok,
                    function_def: Some(Rc::new(lambda)),
                    error:        None,
                    error_range:  (0, 0),
                }
            }

            pub fn error(message: &str, start: usize, end: usize) -> $result {
                $result {
                    status:       $status::Error,
                    function_def: None,
                    error:        Some(message.to_string()),
                    error_range:  (start, end),
                }
            }

            fn fault(&self) -> PipelineError {
                let (start, end) = self.error_range;
                PipelineError {
                    message: self.error.clone().unwrap_or_else(|| "no function produced".to_string()),
                    start,
                    end,
                }
            }

            /// The compiled function; checks the status first.
            pub fn function_def(&self) -> Result<&Rc<Lambda>, PipelineError> {
                match (&self.status, &self.function_def) {
                    ($status::Ok, Some(lambda)) => Ok(lambda),
                    _ => Err(self.fault()),
                }
            }

            /// Instantiates the compiled function as a top-level closure.
            /// Top-level code has no enclosing frame to capture from.
            pub fn closure(&self) -> Result<Rc<Closure>, PipelineError> {
                let lambda = self.function_def()?;
                if !lambda.environments.is_empty() {
                    return Err(PipelineError::new(
                        "top-level function can not capture environments",
                        self.error_range.0,
                        self.error_range.1,
                    ));
                }
                Ok(Rc::new(Closure::new(Rc::clone(lambda), vec![])))
            }
        }
    };
}

lambda_result!(
    /// What the compiler hands back.
    CompileResult,
    CompileStatus
);

lambda_result!(
    /// What the assembler hands back.
    AssembleResult,
    AssembleStatus
);
