use std::{
    fmt::{
        self,
        Debug,
        Display,
        Formatter,
    },
    rc::Rc,
};

use crate::common::source::Source;

/// A `Span` refers to a byte range of a [`Source`],
/// much like a `&str`, but holding on to the `Source` itself.
/// Spans come out of a function's sourcemap and end up in tracebacks.
#[derive(Clone, Eq, PartialEq)]
pub struct Span {
    source: Rc<Source>,
    offset: usize,
    length: usize,
}

impl Span {
    /// Create a new `Span` from an offset with a length.
    /// Ranges reaching past the end of the source are clamped to it,
    /// since sourcemaps come from outside the runtime.
    pub fn new(source: &Rc<Source>, offset: usize, length: usize) -> Span {
        let offset = offset.min(source.len());
        let length = length.min(source.len() - offset);
        Span {
            source: Rc::clone(source),
            offset,
            length,
        }
    }

    /// A `Span` covering the byte range `start..end`.
    pub fn range(source: &Rc<Source>, start: usize, end: usize) -> Span {
        Span::new(source, start, end.saturating_sub(start))
    }

    /// A `Span` that points at a specific point in the source.
    pub fn point(source: &Rc<Source>, offset: usize) -> Span { Span::new(source, offset, 0) }

    pub fn start(&self) -> usize { self.offset }

    /// Return the index of the end of the `Span`.
    pub fn end(&self) -> usize { self.offset + self.length }

    pub fn len(&self) -> usize { self.length }

    pub fn is_empty(&self) -> bool { self.length == 0 }

    fn bytes(&self) -> &[u8] { self.source.contents.as_bytes() }

    /// Returns the text of a `Span`.
    /// Ranges that split a character are decoded lossily.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes()[self.offset..self.end()]).into_owned()
    }

    /// Zero-indexed line the byte at `index` is on.
    pub fn line(&self, index: usize) -> usize {
        self.bytes()[..index].iter().filter(|b| **b == b'\n').count()
    }

    /// Zero-indexed column of the byte at `index`.
    pub fn col(&self, index: usize) -> usize {
        let before = &self.bytes()[..index];
        let start = before.iter().rposition(|b| *b == b'\n').map_or(0, |p| p + 1);
        String::from_utf8_lossy(&before[start..]).chars().count()
    }

    /// Every full line the `Span` touches.
    pub fn lines(&self) -> Vec<String> {
        let lines: Vec<_> = self.source.contents.split('\n').collect();
        lines[self.line(self.offset)..=self.line(self.end())]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn path(&self) -> String { self.source.path.to_string_lossy().to_string() }

    pub fn format(&self) -> FormattedSpan {
        FormattedSpan {
            path:      self.path(),
            start:     self.line(self.offset),
            lines:     self.lines(),
            start_col: self.col(self.offset),
            end_col:   self.col(self.end()),
        }
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("contents", &self.contents())
            .field("start", &self.offset)
            .field("end", &self.end())
            .finish()
    }
}

impl Display for Span {
    /// Given a `Span`, `fmt` will print out where the `Span` occurs in its source.
    /// Single-line `Span`s:
    /// ```plain
    /// 12 | x = blatant { error }
    ///    |     ^^^^^^^^^^^^^^^^^
    /// ```
    /// Multi-line `Span`s:
    /// ```plain
    /// 12 > (defn f [x]
    /// 13 >   (another error))
    /// ```
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { write!(f, "{}", self.format()) }
}

/// A span broken into lines, ready to be displayed.
pub struct FormattedSpan {
    pub path:      String,
    pub start:     usize,
    pub lines:     Vec<String>,
    pub start_col: usize,
    pub end_col:   usize,
}

impl FormattedSpan {
    pub fn is_multiline(&self) -> bool { self.lines.len() != 1 }

    /// Width of the widest line number printed.
    pub fn gutter_padding(&self) -> usize { (self.start + self.lines.len()).to_string().len() }

    /// If a single line span, returns the number of carets between cols.
    pub fn carets(&self) -> Option<usize> {
        if self.is_multiline() {
            None
        } else {
            Some(self.end_col.saturating_sub(self.start_col))
        }
    }
}

impl Display for FormattedSpan {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let gutter = " ".repeat(self.gutter_padding());
        writeln!(f, "In {}:{}:{}", self.path, self.start + 1, self.start_col + 1)?;
        writeln!(f, "{} |", gutter)?;

        match self.carets() {
            Some(carets) => {
                let line_no = (self.start + 1).to_string();
                let padding = " ".repeat(self.gutter_padding() - line_no.len());
                writeln!(f, "{}{} | {}", line_no, padding, self.lines[0])?;
                writeln!(
                    f,
                    "{} | {}{}",
                    gutter,
                    " ".repeat(self.start_col),
                    "^".repeat(carets.max(1)),
                )?;
            },
            None => {
                for (index, line) in self.lines.iter().enumerate() {
                    let line_no = (self.start + index + 1).to_string();
                    let padding = " ".repeat(self.gutter_padding() - line_no.len());
                    writeln!(f, "{}{} > {}", line_no, padding, line)?;
                }
            },
        }

        Ok(())
    }
}
