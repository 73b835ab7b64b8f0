use std::{
    cell::RefCell,
    fmt::{
        Debug,
        Error,
        Formatter,
    },
    rc::Rc,
};

use crate::{
    common::{
        array::Array,
        buffer::Buffer,
        closure::Closure,
        data::{
            canonical,
            Data,
            Kind,
        },
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
        fiber::{
            Fiber,
            FiberHandle,
        },
        Repr,
    },
};

/// `Tagged` implements NaN-tagging around the `Data` enum.
/// In essence, it's possible to exploit the representation of `f64` NaNs
/// to store pointers and small values of every other kind.
///
/// When laid out, this is what the bit-level representation looks like:
/// ```plain
///                 |.......Tag.......|.......................Payload..................|
/// Non-double:     t|11111111111|1ttt|xxxxxxxxxxxxxxxx xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx
/// Double:         x xxxxxxxxxxx xxxx xxxxxxxxxxxxxxxx xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx
/// ```
/// The three low tag bits plus the sign bit give sixteen internal tags.
/// Every double that isn't a NaN is stored as-is;
/// NaNs are folded into the `real` tag with an empty payload
/// before they are stored, so no NaN can be mistaken for another kind.
///
/// The payload is 48 bits wide: integers use the low 32,
/// heap kinds store an `Rc` pointer. Cloning and dropping a `Tagged`
/// adjusts the reference count of whatever it points to.
pub struct Tagged(u64);

const TYPE_BITS: u64 = 0x0007_0000_0000_0000;
const TAG_BITS: u64 = 0xFFFF_0000_0000_0000;
const PAYLOAD_BITS: u64 = 0x0000_FFFF_FFFF_FFFF;

const NIL: u64 = 0;
const FALSE: u64 = 1;
const TRUE: u64 = 2;
const FIBER: u64 = 3;
const INTEGER: u64 = 4;
const REAL: u64 = 5;
const STRING: u64 = 6;
const SYMBOL: u64 = 7;
const ARRAY: u64 = 8;
const TUPLE: u64 = 9;
const TABLE: u64 = 10;
const STRUCT: u64 = 11;
const BUFFER: u64 = 12;
const FUNCTION: u64 = 13;
const NATIVE: u64 = 14;
const USERDATA: u64 = 15;

const fn low_tag(t: u64) -> u64 { ((t & 0x8) << 12) | 0x7FF8 | t }

const fn tag(t: u64) -> u64 { low_tag(t) << 48 }

// Immediates carry a payload of 1, so none of them is the host's default NaN.
const NIL_BITS: u64 = tag(NIL) | 1;
const FALSE_BITS: u64 = tag(FALSE) | 1;
const TRUE_BITS: u64 = tag(TRUE) | 1;

/// Runs `$op` (`increment_strong_count` or `decrement_strong_count`)
/// on the `Rc` stored under a heap tag. Does nothing for immediates.
macro_rules! rc_op {
    ($t:expr, $p:expr, $op:ident) => {
        match $t {
            FIBER => Rc::$op($p as *const RefCell<Fiber>),
            STRING | SYMBOL => Rc::$op($p as *const Str),
            ARRAY => Rc::$op($p as *const RefCell<Array>),
            TUPLE => Rc::$op($p as *const Tuple),
            TABLE => Rc::$op($p as *const RefCell<Table>),
            STRUCT => Rc::$op($p as *const Struct),
            BUFFER => Rc::$op($p as *const RefCell<Buffer>),
            FUNCTION => Rc::$op($p as *const Closure),
            NATIVE => Rc::$op($p as *const Native),
            USERDATA => Rc::$op($p as *const RefCell<Userdata>),
            _ => (),
        }
    };
}

impl Tagged {
    fn immediate(t: u64, payload: u64) -> Tagged { Tagged(tag(t) | payload) }

    fn pointer<T>(t: u64, rc: Rc<T>) -> Tagged {
        let address = Rc::into_raw(rc) as usize as u64;
        // truncating would hand a wrong address to `Rc::from_raw`
        assert_eq!(address & !PAYLOAD_BITS, 0, "pointer does not fit in 48 bits");
        Tagged(tag(t) | (address & PAYLOAD_BITS))
    }

    /// The internal tag: one of sixteen, `false` and `true` are distinct.
    #[inline]
    fn type_bits(&self) -> u64 {
        if f64::from_bits(self.0).is_nan() {
            ((self.0 & TYPE_BITS) >> 48) | ((self.0 >> 60) & 0x8)
        } else {
            REAL
        }
    }

    #[inline]
    fn address(&self) -> usize { (self.0 & PAYLOAD_BITS) as usize }

    /// Clones the `Rc` behind a heap tag.
    ///
    /// # Safety
    /// `T` must be the type stored under this tag.
    unsafe fn rc<T>(&self) -> Rc<T> {
        let pointer = self.address() as *const T;
        Rc::increment_strong_count(pointer);
        Rc::from_raw(pointer)
    }

    /// Returns the literal 64-bit representation, for debugging.
    pub fn bits(&self) -> u64 { self.0 }
}

impl Repr for Tagged {
    fn encode(data: Data) -> Tagged {
        match data {
            Data::Nil => Tagged(NIL_BITS),
            Data::Bool(false) => Tagged(FALSE_BITS),
            Data::Bool(true) => Tagged(TRUE_BITS),
            Data::Int32(i) => Tagged::immediate(INTEGER, i as u32 as u64),
            // a canonical NaN already carries the real tag
            Data::Float64(f) => Tagged(canonical(f).to_bits()),

            // on the heap
            Data::Fiber(f) => Tagged::pointer(FIBER, f.into_rc()),
            Data::String(s) => Tagged::pointer(STRING, s),
            Data::Symbol(s) => Tagged::pointer(SYMBOL, s),
            Data::Array(a) => Tagged::pointer(ARRAY, a),
            Data::Tuple(t) => Tagged::pointer(TUPLE, t),
            Data::Table(t) => Tagged::pointer(TABLE, t),
            Data::Struct(s) => Tagged::pointer(STRUCT, s),
            Data::Buffer(b) => Tagged::pointer(BUFFER, b),
            Data::Function(c) => Tagged::pointer(FUNCTION, c),
            Data::NativeFunction(n) => Tagged::pointer(NATIVE, n),
            Data::Userdata(u) => Tagged::pointer(USERDATA, u),
        }
    }

    fn kind(&self) -> Kind {
        match self.type_bits() {
            NIL => Kind::Nil,
            FALSE | TRUE => Kind::Bool,
            FIBER => Kind::Fiber,
            INTEGER => Kind::Int32,
            REAL => Kind::Float64,
            STRING => Kind::String,
            SYMBOL => Kind::Symbol,
            ARRAY => Kind::Array,
            TUPLE => Kind::Tuple,
            TABLE => Kind::Table,
            STRUCT => Kind::Struct,
            BUFFER => Kind::Buffer,
            FUNCTION => Kind::Function,
            NATIVE => Kind::NativeFunction,
            _ => Kind::Userdata,
        }
    }

    fn decode(&self) -> Data {
        // Safety: every heap tag was written by `Tagged::pointer`
        // with the matching `Rc` type, and `self` still owns one count.
        unsafe {
            match self.type_bits() {
                NIL => Data::Nil,
                FALSE => Data::Bool(false),
                TRUE => Data::Bool(true),
                INTEGER => Data::Int32((self.0 & 0xFFFF_FFFF) as u32 as i32),
                REAL => Data::Float64(f64::from_bits(self.0)),
                FIBER => Data::Fiber(FiberHandle::from_rc(self.rc::<RefCell<Fiber>>())),
                STRING => Data::String(self.rc()),
                SYMBOL => Data::Symbol(self.rc()),
                ARRAY => Data::Array(self.rc()),
                TUPLE => Data::Tuple(self.rc()),
                TABLE => Data::Table(self.rc()),
                STRUCT => Data::Struct(self.rc()),
                BUFFER => Data::Buffer(self.rc()),
                FUNCTION => Data::Function(self.rc()),
                NATIVE => Data::NativeFunction(self.rc()),
                _ => Data::Userdata(self.rc()),
            }
        }
    }

    #[inline]
    fn truthy(&self) -> bool { self.0 != NIL_BITS && self.0 != FALSE_BITS }

    #[inline]
    fn integer(&self) -> Option<i32> {
        if self.0 & TAG_BITS == tag(INTEGER) {
            Some((self.0 & 0xFFFF_FFFF) as u32 as i32)
        } else {
            None
        }
    }

    #[inline]
    fn real(&self) -> Option<f64> {
        if self.type_bits() == REAL {
            Some(f64::from_bits(self.0))
        } else {
            None
        }
    }

    #[inline]
    fn identical(&self, other: &Tagged) -> bool { self.0 == other.0 }
}

impl Clone for Tagged {
    fn clone(&self) -> Tagged {
        // Safety: the pointer is live, `self` holds a count on it.
        unsafe { rc_op!(self.type_bits(), self.address(), increment_strong_count) }
        Tagged(self.0)
    }
}

impl Drop for Tagged {
    fn drop(&mut self) {
        // Safety: `self` will not be used again, so its count can be released.
        unsafe { rc_op!(self.type_bits(), self.address(), decrement_strong_count) }
    }
}

impl Debug for Tagged {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "Tagged({:?})", self.decode())
    }
}

#[cfg(test)]
mod test {
    use std::{
        f64,
        mem,
    };

    use proptest::prelude::*;

    use super::*;
    use crate::common::value::Value;

    fn round(data: Data) -> Data { Tagged::encode(data).decode() }

    #[test]
    fn floats_eq() {
        let positive = 478_329.0;
        let negative = -231.0;
        let neg_inf = f64::NEG_INFINITY;

        for n in &[positive, negative, neg_inf, f64::INFINITY, f64::MAX, f64::MIN] {
            match round(Data::Float64(*n)) {
                Data::Float64(f) => assert_eq!(n.to_bits(), f.to_bits()),
                _ => panic!("Didn't unwrap to a real"),
            }
        }
    }

    #[test]
    fn negative_zero() {
        let tagged = Tagged::encode(Data::Float64(-0.0));
        assert_eq!(tagged.kind(), Kind::Float64);
        let zero = tagged.real().unwrap();
        assert_eq!(1.0 / zero, f64::NEG_INFINITY);
    }

    #[test]
    fn nans_are_canonical() {
        let patterns = [
            f64::NAN.to_bits(),
            0x7FF8_0000_0000_0000,
            0xFFF8_0000_0000_0000,
            0x7FF0_0000_0000_0001,
            0x7FFC_0000_0000_0001, // looks like a tagged nil
            0xFFFF_FFFF_FFFF_FFFF,
        ];

        for bits in patterns.iter() {
            let tagged = Tagged::encode(Data::Float64(f64::from_bits(*bits)));
            assert_eq!(tagged.kind(), Kind::Float64);
            assert_eq!(tagged.bits(), crate::common::data::CANONICAL_NAN);
            assert!(tagged.real().unwrap().is_nan());
        }
    }

    #[test]
    fn bool_and_back() {
        assert_eq!(Data::Bool(true), round(Data::Bool(true)));
        assert_eq!(Data::Bool(false), round(Data::Bool(false)));
        assert_eq!(Tagged::encode(Data::Bool(false)).kind(), Kind::Bool);
    }

    #[test]
    fn nil() {
        assert_eq!(Data::Nil, round(Data::Nil));
        assert!(!Tagged::encode(Data::Nil).truthy());
        assert!(!Tagged::encode(Data::Bool(false)).truthy());
        assert!(Tagged::encode(Data::Int32(0)).truthy());
    }

    #[test]
    fn integers() {
        for i in &[0, 42, -1, i32::MIN, i32::MAX] {
            let tagged = Tagged::encode(Data::Int32(*i));
            assert_eq!(tagged.kind(), Kind::Int32);
            assert_eq!(tagged.integer(), Some(*i));
            assert_eq!(tagged.real(), None);
        }
    }

    #[test]
    fn size() {
        let data_size = mem::size_of::<Data>();
        let tag_size = mem::size_of::<Tagged>();

        // Tag == u64 == f64 == 64
        // If the tag is larger than the data, we're doing something wrong
        assert_eq!(tag_size, mem::size_of::<f64>());
        assert!(tag_size < data_size);
    }

    #[test]
    fn string_pointer() {
        let s = "I just lost the game";
        let three = "Elongated Muskrat";
        let x = "It's kind of a dead giveaway, isn't it?";

        for item in &[s, three, x, "", "Whoop 😋"] {
            let data = Data::String(Rc::new(Str::from(*item)));
            match round(data) {
                Data::String(s) => assert_eq!(item.as_bytes(), s.as_bytes()),
                other => panic!("Didn't unwrap to a string: {:?}", other),
            }
        }
    }

    #[test]
    fn pointers_keep_their_address() {
        let strings = (0..64)
            .map(|i| Rc::new(Str::from(i.to_string().repeat(i).as_str())))
            .collect::<Vec<_>>();

        for string in strings.iter() {
            let tagged = Tagged::encode(Data::String(Rc::clone(string)));
            assert_eq!(tagged.address(), Rc::as_ptr(string) as usize);
            assert_eq!(tagged.bits() & !PAYLOAD_BITS, tag(STRING));
        }
    }

    #[test]
    fn strings_and_symbols_differ() {
        let text = Rc::new(Str::from("boop"));
        let string = Tagged::encode(Data::String(text.clone()));
        let symbol = Tagged::encode(Data::Symbol(text));
        assert_eq!(string.kind(), Kind::String);
        assert_eq!(symbol.kind(), Kind::Symbol);
        assert_ne!(string.bits() & TAG_BITS, symbol.bits() & TAG_BITS);
    }

    #[test]
    fn every_heap_kind() {
        let samples = vec![
            Data::Array(Rc::new(RefCell::new(Array::new()))),
            Data::Tuple(Rc::new(Tuple::new(vec![]))),
            Data::Table(Rc::new(RefCell::new(Table::new()))),
            Data::Struct(Rc::new(Struct::from_pairs(vec![]))),
            Data::Buffer(Rc::new(RefCell::new(Buffer::new()))),
            Data::NativeFunction(Rc::new(Native::new("noop", |_: &[Value]| Ok(Value::nil())))),
            Data::Fiber(FiberHandle::new(Default::default())),
        ];

        for data in samples {
            let kind = data.kind();
            let back = round(data.clone());
            assert_eq!(back.kind(), kind);
            assert_eq!(back, data);
        }
    }

    #[test]
    fn counts_are_balanced() {
        let table = Rc::new(RefCell::new(Table::new()));
        assert_eq!(Rc::strong_count(&table), 1);

        let tagged = Tagged::encode(Data::Table(table.clone()));
        assert_eq!(Rc::strong_count(&table), 2);

        let copy = tagged.clone();
        let decoded = copy.decode();
        assert_eq!(Rc::strong_count(&table), 4);

        mem::drop(decoded);
        mem::drop(copy);
        mem::drop(tagged);
        assert_eq!(Rc::strong_count(&table), 1);
    }

    proptest! {
        #[test]
        fn any_integer(i in any::<i32>()) {
            prop_assert_eq!(round(Data::Int32(i)), Data::Int32(i));
        }

        #[test]
        fn any_float_bits(bits in any::<u64>()) {
            let f = f64::from_bits(bits);
            let tagged = Tagged::encode(Data::Float64(f));
            prop_assert_eq!(tagged.kind(), Kind::Float64);
            let back = tagged.real().unwrap();
            if f.is_nan() {
                prop_assert!(back.is_nan());
            } else {
                prop_assert_eq!(back.to_bits(), bits);
            }
        }
    }
}
