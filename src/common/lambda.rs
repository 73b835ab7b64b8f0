use std::{
    fmt,
    ops::BitOr,
    rc::Rc,
};

use crate::common::{
    fault::Fault,
    source::Source,
    span::Span,
    value::Value,
};

/// Flags describing how a [`Lambda`] expects to be called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags(u32);

impl Flags {
    pub const NONE: Flags = Flags(0);
    /// Extra arguments are collected into a tuple.
    pub const VARARG: Flags = Flags(1);
    /// Inner functions capture this function's locals.
    pub const NEEDS_ENV: Flags = Flags(4);

    pub fn bits(self) -> u32 { self.0 }

    pub fn from_bits(bits: u32) -> Flags { Flags(bits) }

    pub fn contains(self, other: Flags) -> bool { self.0 & other.0 == other.0 }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, other: Flags) -> Flags { Flags(self.0 | other.0) }
}

/// Represents a single compiled function: its bytecode, the constants
/// the bytecode loads, and enough debug information to point at the
/// source a fault came from.
/// A `Lambda` is built once, then shared read-only by every closure
/// made from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lambda {
    /// Which environments a closure of this function captures, in order.
    /// A negative entry captures the defining frame's own locals;
    /// entry `i >= 0` shares the defining closure's `i`th environment.
    pub environments: Vec<i32>,
    pub constants:    Vec<Value>,
    pub bytecode:     Vec<u32>,
    /// One `(start, end)` byte range per bytecode word.
    pub sourcemap:    Vec<(usize, usize)>,
    pub source:       Option<Rc<Source>>,
    pub flags:        Flags,
    pub arity:        usize,
    /// Number of local slots a frame of this function reserves.
    pub slotcount:    usize,
}

impl Lambda {
    pub fn is_variadic(&self) -> bool { self.flags.contains(Flags::VARARG) }

    pub fn needs_env(&self) -> bool { self.flags.contains(Flags::NEEDS_ENV) }

    pub fn constant(&self, index: usize) -> Result<Value, Fault> {
        self.constants.get(index).cloned().ok_or(Fault::IndexOutOfRange {
            index,
            count: self.constants.len(),
        })
    }

    pub fn instruction(&self, pc: usize) -> Result<u32, Fault> {
        self.bytecode.get(pc).copied().ok_or(Fault::IndexOutOfRange {
            index: pc,
            count: self.bytecode.len(),
        })
    }

    /// The source range the instruction at `pc` was compiled from,
    /// if this function kept its source and sourcemap.
    pub fn span_at(&self, pc: usize) -> Option<Span> {
        let source = self.source.as_ref()?;
        let (start, end) = *self.sourcemap.get(pc)?;
        Some(Span::range(source, start, end))
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<lambda arity {}{} slots {} words {}>",
            self.arity,
            if self.is_variadic() { "+" } else { "" },
            self.slotcount,
            self.bytecode.len(),
        )
    }
}

/// Assembles a [`Lambda`] piece by piece.
#[derive(Debug, Default)]
pub struct LambdaBuilder {
    lambda: Lambda,
}

impl LambdaBuilder {
    pub fn new() -> LambdaBuilder { LambdaBuilder::default() }

    pub fn arity(mut self, arity: usize) -> Self {
        self.lambda.arity = arity;
        self
    }

    pub fn slotcount(mut self, slotcount: usize) -> Self {
        self.lambda.slotcount = slotcount;
        self
    }

    pub fn flags(mut self, flags: Flags) -> Self {
        self.lambda.flags = self.lambda.flags | flags;
        self
    }

    pub fn variadic(self) -> Self { self.flags(Flags::VARARG) }

    pub fn environment(mut self, index: i32) -> Self {
        self.lambda.environments.push(index);
        self
    }

    pub fn constant(mut self, value: Value) -> Self {
        self.lambda.constants.push(value);
        self
    }

    /// Appends one bytecode word, mapped to the source range `start..end`.
    pub fn instruction(mut self, word: u32, range: (usize, usize)) -> Self {
        self.lambda.bytecode.push(word);
        self.lambda.sourcemap.push(range);
        self
    }

    /// Appends bytecode without debug information.
    pub fn bytecode(mut self, words: &[u32]) -> Self {
        self.lambda.bytecode.extend_from_slice(words);
        self
    }

    pub fn source(mut self, source: &Rc<Source>) -> Self {
        self.lambda.source = Some(Rc::clone(source));
        self
    }

    /// Finishes the `Lambda`.
    /// A frame always has room for every parameter,
    /// plus the tuple of extra arguments if variadic.
    pub fn build(mut self) -> Lambda {
        let needed = self.lambda.arity + self.lambda.is_variadic() as usize;
        self.lambda.slotcount = self.lambda.slotcount.max(needed);
        self.lambda
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slots_cover_parameters() {
        let lambda = LambdaBuilder::new().arity(3).slotcount(1).build();
        assert_eq!(lambda.slotcount, 3);

        let lambda = LambdaBuilder::new().arity(2).variadic().build();
        assert!(lambda.is_variadic());
        assert_eq!(lambda.slotcount, 3);

        let lambda = LambdaBuilder::new().arity(1).slotcount(8).build();
        assert_eq!(lambda.slotcount, 8);
    }

    #[test]
    fn flags() {
        let flags = Flags::VARARG | Flags::NEEDS_ENV;
        assert_eq!(flags.bits(), 5);
        assert!(flags.contains(Flags::NEEDS_ENV));
        assert!(!Flags::VARARG.contains(Flags::NEEDS_ENV));
    }

    #[test]
    fn sourcemap() {
        let source = Source::source("(+ 1 2)");
        let lambda = LambdaBuilder::new()
            .source(&source)
            .instruction(0x01, (0, 7))
            .instruction(0x02, (3, 4))
            .constant(Value::integer(1))
            .build();

        assert_eq!(lambda.span_at(1).map(|s| s.contents()), Some("1".to_string()));
        assert_eq!(lambda.span_at(2), None);
        assert_eq!(lambda.instruction(0), Ok(0x01));
        assert_eq!(lambda.constant(0), Ok(Value::integer(1)));
        assert!(lambda.constant(1).is_err());
    }

    #[test]
    fn no_source_no_span() {
        let lambda = LambdaBuilder::new().bytecode(&[1, 2, 3]).build();
        assert_eq!(lambda.span_at(0), None);
        assert_eq!(lambda.to_string(), "<lambda arity 0 slots 0 words 3>");
    }
}
