use std::{
    fmt,
    rc::Rc,
};

use crate::common::{
    buffer::Buffer,
    fault::Fault,
    value::Value,
};

/// Describes a foreign type stored in [`Userdata`].
/// The hooks are called by whatever collects or persists values,
/// never by the runtime core itself.
pub trait UserType {
    fn name(&self) -> &str;

    /// Writes the payload out so it can be restored later.
    fn serialize(&self, _data: &[u8], _out: &mut Buffer) -> Result<(), Fault> {
        Err(Fault::Unsupported(self.name().to_string(), "serialize"))
    }

    /// Rebuilds a value from what `serialize` wrote.
    fn deserialize(&self, _input: &[u8]) -> Result<Value, Fault> {
        Err(Fault::Unsupported(self.name().to_string(), "deserialize"))
    }

    /// Releases whatever the payload owns outside the runtime.
    fn finalize(&self, _data: &mut [u8]) {}
}

/// An opaque payload owned by the runtime, tagged with its type.
pub struct Userdata {
    ty:   Rc<dyn UserType>,
    data: Box<[u8]>,
}

impl Userdata {
    pub fn new(ty: Rc<dyn UserType>, data: Vec<u8>) -> Userdata {
        Userdata {
            ty,
            data: data.into_boxed_slice(),
        }
    }

    pub fn ty(&self) -> &Rc<dyn UserType> { &self.ty }

    /// Size of the payload in bytes.
    pub fn size(&self) -> usize { self.data.len() }

    pub fn data(&self) -> &[u8] { &self.data }

    pub fn data_mut(&mut self) -> &mut [u8] { &mut self.data }

    pub fn serialize(&self, out: &mut Buffer) -> Result<(), Fault> { self.ty.serialize(&self.data, out) }

    pub fn finalize(&mut self) { self.ty.finalize(&mut self.data) }
}

impl fmt::Debug for Userdata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Userdata({}, {} bytes)", self.ty.name(), self.data.len())
    }
}

/// A type with a name and no hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opaque(pub String);

impl UserType for Opaque {
    fn name(&self) -> &str { &self.0 }
}
