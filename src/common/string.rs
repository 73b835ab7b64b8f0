use std::{
    borrow::Cow,
    fmt::{
        Debug,
        Display,
        Formatter,
        Result,
    },
    hash::Hasher,
};

use rustc_hash::FxHasher;

/// An immutable byte string, used for both strings and symbols.
/// The hash is computed once, when the string is built,
/// so strings are cheap to use as table keys.
#[derive(Clone)]
pub struct Str {
    bytes: Box<[u8]>,
    hash:  u64,
}

impl Str {
    pub fn new(bytes: &[u8]) -> Str {
        let mut hasher = FxHasher::default();
        hasher.write(bytes);
        hasher.write_usize(bytes.len());

        Str {
            bytes: bytes.into(),
            hash:  hasher.finish(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] { &self.bytes }

    pub fn len(&self) -> usize { self.bytes.len() }

    pub fn is_empty(&self) -> bool { self.bytes.is_empty() }

    pub fn hash_code(&self) -> u64 { self.hash }

    /// Strings are not required to be valid UTF-8;
    /// invalid sequences are replaced when displayed.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

impl From<&str> for Str {
    fn from(text: &str) -> Str { Str::new(text.as_bytes()) }
}

impl PartialEq for Str {
    fn eq(&self, other: &Str) -> bool {
        self.hash == other.hash && self.bytes == other.bytes
    }
}

impl Eq for Str {}

impl Display for Str {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.to_string_lossy())
    }
}

impl Debug for Str {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "Str({:?})", self.to_string_lossy())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn equal_contents_equal_hash() {
        let a = Str::from("Elongated Muskrat");
        let b = Str::new(b"Elongated Muskrat");
        assert_eq!(a, b);
        assert_eq!(a.hash_code(), b.hash_code());
        assert_ne!(a, Str::from("Elongated Muskra"));
    }

    #[test]
    fn lossy() {
        let s = Str::new(&[0x68, 0x69, 0xFF]);
        assert_eq!(s.len(), 3);
        assert_eq!(s.to_string_lossy(), "hi\u{FFFD}");
    }
}
