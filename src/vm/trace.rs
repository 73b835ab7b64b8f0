use std::fmt;

use crate::common::span::Span;

/// Represents a runtime error, i.e. a traceback
#[derive(Debug, PartialEq, Eq)]
pub struct Trace {
    kind:    String,
    message: String,
    spans:   Vec<Span>,
}

impl Trace {
    /// Spans are ordered outermost call first.
    pub fn error(kind: &str, message: &str, spans: Vec<Span>) -> Trace {
        Trace {
            kind: kind.to_string(),
            message: message.to_string(),
            spans,
        }
    }

    pub fn kind(&self) -> &str { &self.kind }

    pub fn message(&self) -> &str { &self.message }

    pub fn spans(&self) -> &[Span] { &self.spans }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Traceback, most recent call last:")?;

        for span in self.spans.iter() {
            fmt::Display::fmt(span, f)?;
        }

        writeln!(f, "Runtime {}: {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::source::Source;

    #[test]
    fn traceback() {
        let source = Source::source("(defn incr [x] (+ x 1))\n(incr :nope)\n");
        let target = "\
            Traceback, most recent call last:\n\
            In ./source:2:1\n  \
              |\n\
            2 | (incr :nope)\n  \
              | ^^^^^^^^^^^^\n\
            In ./source:1:16\n  \
              |\n\
            1 | (defn incr [x] (+ x 1))\n  \
              |                ^^^^^^^\n\
            Runtime Error: can not add keyword to integer\n\
        ";

        let traceback = Trace::error(
            "Error",
            "can not add keyword to integer",
            vec![Span::new(&source, 24, 12), Span::new(&source, 15, 7)],
        );

        assert_eq!(traceback.to_string(), target);
        assert_eq!(traceback.spans().len(), 2);
    }
}
