use std::{
    cell::RefCell,
    fmt::{
        Debug,
        Display,
        Formatter,
    },
    hash::{
        Hash,
        Hasher,
    },
    rc::Rc,
};

use rustc_hash::FxHasher;

use crate::{
    common::{
        array::Array,
        buffer::Buffer,
        closure::Closure,
        data::{
            Data,
            Kind,
        },
        fault::Fault,
        native::Native,
        string::Str,
        table::Table,
        tuple::{
            Struct,
            Tuple,
        },
        userdata::Userdata,
    },
    vm::{
        fiber::FiberHandle,
        Repr,
    },
};

// Tagged pointers must fit in 48 bits, which these targets guarantee
// for user space (Android tags the top byte of heap pointers).
#[cfg(all(
    feature = "nanbox",
    target_pointer_width = "64",
    any(
        target_arch = "x86_64",
        all(target_arch = "aarch64", not(target_os = "android"))
    )
))]
type Cell = crate::vm::tag::Tagged;
#[cfg(not(all(
    feature = "nanbox",
    target_pointer_width = "64",
    any(
        target_arch = "x86_64",
        all(target_arch = "aarch64", not(target_os = "android"))
    )
)))]
type Cell = crate::vm::union::Union;

/// Name of the encoding backing [`Value`] in this build.
#[cfg(all(
    feature = "nanbox",
    target_pointer_width = "64",
    any(
        target_arch = "x86_64",
        all(target_arch = "aarch64", not(target_os = "android"))
    )
))]
pub const ENCODING: &str = "nanbox";
#[cfg(not(all(
    feature = "nanbox",
    target_pointer_width = "64",
    any(
        target_arch = "x86_64",
        all(target_arch = "aarch64", not(target_os = "android"))
    )
)))]
pub const ENCODING: &str = "tagged-union";

/// A single dynamic value: the cell every stack slot,
/// array element and table entry is made of.
///
/// Values are cheap to clone; heap kinds are reference counted
/// and a clone shares the same object.
#[derive(Clone)]
pub struct Value(Cell);

macro_rules! accessor {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $out:ty) => {
        $(#[$doc])*
        pub fn $name(&self) -> Result<$out, Fault> {
            match self.0.decode() {
                Data::$variant(inner) => Ok(inner),
                other => Err(Fault::TypeMismatch {
                    expected: Kind::$variant,
                    found:    other.kind(),
                }),
            }
        }
    };
}

impl Value {
    /// Wraps any payload. Reals are canonicalized on the way in.
    pub fn wrap(data: Data) -> Value { Value(Cell::encode(data)) }

    pub fn nil() -> Value { Value::wrap(Data::Nil) }

    pub fn boolean(b: bool) -> Value { Value::wrap(Data::Bool(b)) }

    pub fn integer(i: i32) -> Value { Value::wrap(Data::Int32(i)) }

    pub fn real(f: f64) -> Value { Value::wrap(Data::Float64(f)) }

    pub fn string(bytes: impl AsRef<[u8]>) -> Value {
        Value::wrap(Data::String(Rc::new(Str::new(bytes.as_ref()))))
    }

    pub fn symbol(bytes: impl AsRef<[u8]>) -> Value {
        Value::wrap(Data::Symbol(Rc::new(Str::new(bytes.as_ref()))))
    }

    pub fn array(array: Array) -> Value {
        Value::wrap(Data::Array(Rc::new(RefCell::new(array))))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::wrap(Data::Tuple(Rc::new(Tuple::new(items))))
    }

    pub fn table(table: Table) -> Value {
        Value::wrap(Data::Table(Rc::new(RefCell::new(table))))
    }

    pub fn structure(pairs: impl IntoIterator<Item = (Value, Value)>) -> Value {
        Value::wrap(Data::Struct(Rc::new(Struct::from_pairs(pairs))))
    }

    pub fn buffer(buffer: Buffer) -> Value {
        Value::wrap(Data::Buffer(Rc::new(RefCell::new(buffer))))
    }

    pub fn function(closure: Rc<Closure>) -> Value { Value::wrap(Data::Function(closure)) }

    pub fn native(native: Native) -> Value {
        Value::wrap(Data::NativeFunction(Rc::new(native)))
    }

    pub fn userdata(userdata: Userdata) -> Value {
        Value::wrap(Data::Userdata(Rc::new(RefCell::new(userdata))))
    }

    pub fn fiber(fiber: FiberHandle) -> Value { Value::wrap(Data::Fiber(fiber)) }

    #[inline]
    pub fn kind(&self) -> Kind { self.0.kind() }

    #[inline]
    pub fn check(&self, kind: Kind) -> bool { self.0.kind() == kind }

    /// Everything is truthy except `nil` and `false`.
    #[inline]
    pub fn truthy(&self) -> bool { self.0.truthy() }

    /// Copies the payload out, whatever the kind.
    pub fn data(&self) -> Data { self.0.decode() }

    /// Copies the payload out, failing if the value is not of `kind`.
    pub fn unwrap(&self, kind: Kind) -> Result<Data, Fault> {
        let found = self.kind();
        if found == kind {
            Ok(self.0.decode())
        } else {
            Err(Fault::TypeMismatch { expected: kind, found })
        }
    }

    pub fn as_bool(&self) -> Result<bool, Fault> {
        match self.0.decode() {
            Data::Bool(b) => Ok(b),
            other => Err(Fault::TypeMismatch {
                expected: Kind::Bool,
                found:    other.kind(),
            }),
        }
    }

    pub fn as_integer(&self) -> Result<i32, Fault> {
        self.0.integer().ok_or(Fault::TypeMismatch {
            expected: Kind::Int32,
            found:    self.kind(),
        })
    }

    pub fn as_real(&self) -> Result<f64, Fault> {
        self.0.real().ok_or(Fault::TypeMismatch {
            expected: Kind::Float64,
            found:    self.kind(),
        })
    }

    accessor!(as_string, String, Rc<Str>);
    accessor!(as_symbol, Symbol, Rc<Str>);
    accessor!(as_array, Array, Rc<RefCell<Array>>);
    accessor!(as_tuple, Tuple, Rc<Tuple>);
    accessor!(as_table, Table, Rc<RefCell<Table>>);
    accessor!(as_struct, Struct, Rc<Struct>);
    accessor!(as_buffer, Buffer, Rc<RefCell<Buffer>>);
    accessor!(as_function, Function, Rc<Closure>);
    accessor!(as_native, NativeFunction, Rc<Native>);
    accessor!(as_userdata, Userdata, Rc<RefCell<Userdata>>);
    accessor!(as_fiber, Fiber, FiberHandle);

    /// A deterministic hash, consistent with `==`.
    pub fn hash_code(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl Default for Value {
    fn default() -> Value { Value::nil() }
}

impl From<Data> for Value {
    fn from(data: Data) -> Value { Value::wrap(data) }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value { Value::boolean(b) }
}

impl From<i32> for Value {
    fn from(i: i32) -> Value { Value::integer(i) }
}

impl From<f64> for Value {
    fn from(f: f64) -> Value { Value::real(f) }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.0.identical(&other.0) || self.0.decode() == other.0.decode()
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) { self.0.decode().hash(state) }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0.decode(), f)
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0.decode(), f)
    }
}
