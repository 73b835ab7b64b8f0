use crate::{
    common::value::Value,
    pipeline::PipelineError,
};

/// How a parse ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    Ok,
    Error,
    /// The input stopped in the middle of a form; more may follow.
    UnexpectedEndOfInput,
    /// The input held nothing but whitespace and comments.
    NoData,
}

/// What the parser hands back for one form.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub value:      Value,
    pub error:      Option<String>,
    /// Source ranges of `value` and its children, as built by the parser.
    pub sourcemap:  Value,
    pub bytes_read: usize,
    pub status:     ParseStatus,
}

impl ParseResult {
    pub fn ok(value: Value, sourcemap: Value, bytes_read: usize) -> ParseResult {
        ParseResult {
            value,
            error: None,
            sourcemap,
            bytes_read,
            status: ParseStatus::Ok,
        }
    }

    pub fn error(message: &str, bytes_read: usize) -> ParseResult {
        ParseResult {
            value: Value::nil(),
            error: Some(message.to_string()),
            sourcemap: Value::nil(),
            bytes_read,
            status: ParseStatus::Error,
        }
    }

    pub fn unexpected_end(bytes_read: usize) -> ParseResult {
        ParseResult {
            status: ParseStatus::UnexpectedEndOfInput,
            ..ParseResult::error("unexpected end of input", bytes_read)
        }
    }

    pub fn no_data(bytes_read: usize) -> ParseResult {
        ParseResult {
            value: Value::nil(),
            error: None,
            sourcemap: Value::nil(),
            bytes_read,
            status: ParseStatus::NoData,
        }
    }

    pub fn is_ok(&self) -> bool { self.status == ParseStatus::Ok }

    /// The parsed value, if there is one.
    /// `NoData` is not a fault, so it comes back as `Ok(None)`.
    pub fn into_value(self) -> Result<Option<Value>, PipelineError> {
        match self.status {
            ParseStatus::Ok => Ok(Some(self.value)),
            ParseStatus::NoData => Ok(None),
            ParseStatus::Error | ParseStatus::UnexpectedEndOfInput => Err(PipelineError {
                message: self.error.unwrap_or_else(|| "parse error".to_string()),
                start:   self.bytes_read,
                end:     self.bytes_read,
            }),
        }
    }
}
