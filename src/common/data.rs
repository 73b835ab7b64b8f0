use std::{
    cell::RefCell,
    fmt::{
        Debug,
        Display,
        Formatter,
        Result,
    },
    hash::{
        Hash,
        Hasher,
    },
    rc::Rc,
};

use crate::{
    common::{
        array::Array,
        buffer::Buffer,
        closure::Closure,
        native::Native,
        string::Str,
        table::Table,
        tuple::{
            Struct,
            Tuple,
        },
        userdata::Userdata,
    },
    vm::fiber::FiberHandle,
};

/// The bit pattern every NaN is folded into before it is stored.
/// This is the packed encoding's `real` tag with an empty payload,
/// so it is still a quiet NaN when read back as an `f64`.
pub const CANONICAL_NAN: u64 = 0x7FFD_0000_0000_0000;

/// Folds every NaN into [`CANONICAL_NAN`], leaving all other doubles
/// (signed zeros and infinities included) untouched.
#[inline]
pub fn canonical(real: f64) -> f64 {
    if real.is_nan() {
        f64::from_bits(CANONICAL_NAN)
    } else {
        real
    }
}

/// The type of a value. `Bool` covers both `true` and `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum Kind {
    Nil,
    Bool,
    Fiber,
    Int32,
    Float64,
    String,
    Symbol,
    Array,
    Tuple,
    Table,
    Struct,
    Buffer,
    Function,
    NativeFunction,
    Userdata,
}

impl Kind {
    pub const ALL: [Kind; 15] = [
        Kind::Nil,
        Kind::Bool,
        Kind::Fiber,
        Kind::Int32,
        Kind::Float64,
        Kind::String,
        Kind::Symbol,
        Kind::Array,
        Kind::Tuple,
        Kind::Table,
        Kind::Struct,
        Kind::Buffer,
        Kind::Function,
        Kind::NativeFunction,
        Kind::Userdata,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Kind::Nil => "nil",
            Kind::Bool => "boolean",
            Kind::Fiber => "fiber",
            Kind::Int32 => "integer",
            Kind::Float64 => "real",
            Kind::String => "string",
            Kind::Symbol => "symbol",
            Kind::Array => "array",
            Kind::Tuple => "tuple",
            Kind::Table => "table",
            Kind::Struct => "struct",
            Kind::Buffer => "buffer",
            Kind::Function => "function",
            Kind::NativeFunction => "native function",
            Kind::Userdata => "userdata",
        }
    }

    /// Whether values of this kind are shared mutable objects,
    /// compared and hashed by identity rather than by content.
    pub fn is_reference(self) -> bool {
        matches!(
            self,
            Kind::Fiber
                | Kind::Array
                | Kind::Table
                | Kind::Buffer
                | Kind::Function
                | Kind::NativeFunction
                | Kind::Userdata
        )
    }
}

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.name())
    }
}

/// The unpacked payload of a value.
/// A `Value` is built from `Data` and can always be turned back into it;
/// cloning `Data` only bumps reference counts.
#[derive(Clone)]
pub enum Data {
    Nil,
    Bool(bool),
    Fiber(FiberHandle),
    Int32(i32),
    Float64(f64),
    String(Rc<Str>),
    Symbol(Rc<Str>),
    Array(Rc<RefCell<Array>>),
    Tuple(Rc<Tuple>),
    Table(Rc<RefCell<Table>>),
    Struct(Rc<Struct>),
    Buffer(Rc<RefCell<Buffer>>),
    Function(Rc<Closure>),
    NativeFunction(Rc<Native>),
    Userdata(Rc<RefCell<Userdata>>),
}

impl Data {
    pub fn kind(&self) -> Kind {
        match self {
            Data::Nil => Kind::Nil,
            Data::Bool(_) => Kind::Bool,
            Data::Fiber(_) => Kind::Fiber,
            Data::Int32(_) => Kind::Int32,
            Data::Float64(_) => Kind::Float64,
            Data::String(_) => Kind::String,
            Data::Symbol(_) => Kind::Symbol,
            Data::Array(_) => Kind::Array,
            Data::Tuple(_) => Kind::Tuple,
            Data::Table(_) => Kind::Table,
            Data::Struct(_) => Kind::Struct,
            Data::Buffer(_) => Kind::Buffer,
            Data::Function(_) => Kind::Function,
            Data::NativeFunction(_) => Kind::NativeFunction,
            Data::Userdata(_) => Kind::Userdata,
        }
    }

    /// Address of the heap object behind a reference kind, used for
    /// identity comparison, hashing and display.
    fn address(&self) -> Option<usize> {
        let address = match self {
            Data::Fiber(f) => f.as_ptr() as usize,
            Data::Array(a) => Rc::as_ptr(a) as usize,
            Data::Table(t) => Rc::as_ptr(t) as usize,
            Data::Buffer(b) => Rc::as_ptr(b) as usize,
            Data::Function(c) => Rc::as_ptr(c) as usize,
            Data::NativeFunction(n) => Rc::as_ptr(n) as usize,
            Data::Userdata(u) => Rc::as_ptr(u) as usize,
            _ => return None,
        };
        Some(address)
    }
}

// NOTE: equality here is runtime equality, not rust equality.
// Reals compare by bits, so -0.0 and 0.0 differ and the canonical NaN
// equals itself; this keeps every value usable as a table key.
impl PartialEq for Data {
    fn eq(&self, other: &Data) -> bool {
        match (self, other) {
            (Data::Nil, Data::Nil) => true,
            (Data::Bool(a), Data::Bool(b)) => a == b,
            (Data::Int32(a), Data::Int32(b)) => a == b,
            (Data::Float64(a), Data::Float64(b)) => a.to_bits() == b.to_bits(),
            (Data::String(a), Data::String(b)) => a == b,
            (Data::Symbol(a), Data::Symbol(b)) => a == b,
            (Data::Tuple(a), Data::Tuple(b)) => a == b,
            (Data::Struct(a), Data::Struct(b)) => a == b,
            (a, b) if a.kind() == b.kind() => a.address() == b.address(),
            _ => false,
        }
    }
}

impl Eq for Data {}

impl Hash for Data {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            Data::Nil => (),
            Data::Bool(b) => b.hash(state),
            Data::Int32(i) => i.hash(state),
            Data::Float64(f) => f.to_bits().hash(state),
            Data::String(s) | Data::Symbol(s) => s.hash_code().hash(state),
            Data::Tuple(t) => t.hash_code().hash(state),
            Data::Struct(s) => s.hash_code().hash(state),
            other => other.address().hash(state),
        }
    }
}

impl Display for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Data::Nil => write!(f, "nil"),
            Data::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Data::Int32(i) => write!(f, "{}", i),
            Data::Float64(n) => write!(f, "{:?}", n),
            Data::String(s) => write!(f, "{:?}", s.to_string_lossy()),
            Data::Symbol(s) => write!(f, "{}", s),
            Data::Array(a) => match a.try_borrow() {
                Ok(a) => {
                    write!(f, "@[")?;
                    write_spaced(f, a.as_slice().iter())?;
                    write!(f, "]")
                },
                Err(_) => write!(f, "@[...]"),
            },
            Data::Tuple(t) => {
                write!(f, "(")?;
                write_spaced(f, t.iter())?;
                write!(f, ")")
            },
            Data::Table(t) => match t.try_borrow() {
                Ok(t) => {
                    write!(f, "@{{")?;
                    write_pairs(f, t.iter())?;
                    write!(f, "}}")
                },
                Err(_) => write!(f, "@{{...}}"),
            },
            Data::Struct(s) => {
                write!(f, "{{")?;
                write_pairs(f, s.iter().map(|(k, v)| (k.clone(), v.clone())))?;
                write!(f, "}}")
            },
            Data::Buffer(b) => match b.try_borrow() {
                Ok(b) => write!(f, "@{:?}", String::from_utf8_lossy(b.as_bytes())),
                Err(_) => write!(f, "@\"...\""),
            },
            Data::NativeFunction(n) => write!(f, "<native {}>", n.name()),
            Data::Userdata(u) => match u.try_borrow() {
                Ok(u) => write!(f, "<{} {:#x}>", u.ty().name(), self.address().unwrap_or(0)),
                Err(_) => write!(f, "<userdata {:#x}>", self.address().unwrap_or(0)),
            },
            other => write!(f, "<{} {:#x}>", other.kind(), other.address().unwrap_or(0)),
        }
    }
}

impl Debug for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Data::Nil => write!(f, "Nil"),
            Data::Bool(b) => write!(f, "Bool({:?})", b),
            Data::Int32(i) => write!(f, "Int32({:?})", i),
            Data::Float64(n) => write!(f, "Float64({:?})", n),
            Data::String(s) => write!(f, "String({:?})", s.to_string_lossy()),
            Data::Symbol(s) => write!(f, "Symbol({})", s),
            other => write!(f, "{:?}({})", other.kind(), other),
        }
    }
}

fn write_spaced<'a>(f: &mut Formatter<'_>, items: impl Iterator<Item = &'a crate::common::value::Value>) -> Result {
    for (index, item) in items.enumerate() {
        if index > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

fn write_pairs(
    f: &mut Formatter<'_>,
    pairs: impl Iterator<Item = (crate::common::value::Value, crate::common::value::Value)>,
) -> Result {
    for (index, (key, value)) in pairs.enumerate() {
        if index > 0 {
            write!(f, " ")?;
        }
        write!(f, "{} {}", key, value)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nan_is_folded() {
        let weird = f64::from_bits(0xFFF8_0000_0000_1234);
        assert!(weird.is_nan());
        assert_eq!(canonical(weird).to_bits(), CANONICAL_NAN);
        assert_eq!(canonical(f64::NAN).to_bits(), CANONICAL_NAN);
        assert!(canonical(weird).is_nan());
    }

    #[test]
    fn signed_zero_survives() {
        assert_eq!(canonical(-0.0).to_bits(), (-0.0f64).to_bits());
        assert_eq!(canonical(f64::NEG_INFINITY), f64::NEG_INFINITY);
    }

    #[test]
    fn reals_compare_by_bits() {
        assert_ne!(Data::Float64(0.0), Data::Float64(-0.0));
        assert_eq!(Data::Float64(canonical(f64::NAN)), Data::Float64(canonical(f64::NAN)));
        assert_ne!(Data::Int32(1), Data::Float64(1.0));
    }

    #[test]
    fn reference_kinds() {
        assert!(Kind::Table.is_reference());
        assert!(!Kind::Tuple.is_reference());
        assert!(!Kind::String.is_reference());
    }
}
