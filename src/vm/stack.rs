use std::rc::Rc;

use crate::common::{
    closure::Closure,
    fault::Fault,
    value::Value,
};

/// Number of cells a frame header takes on the stack:
/// the closure, the program counter, and the previous frame's offset.
pub const FRAME_SIZE: usize = 3;

/// A call record, stored in the `FRAME_SIZE` cells directly below
/// the locals of the frame it describes.
/// `prevframe` is an offset into the stack, never an address,
/// so frames stay linked when the stack is reallocated.
/// An offset of zero means there is no previous frame.
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub closure:   Rc<Closure>,
    pub pc:        usize,
    pub prevframe: usize,
}

/// Offsets are stored as `Int32` cells.
pub(crate) fn cell(offset: usize) -> Result<Value, Fault> {
    i32::try_from(offset)
        .map(Value::integer)
        .map_err(|_| Fault::IndexOutOfRange {
            index: offset,
            count: i32::MAX as usize,
        })
}

fn offset(value: &Value) -> Result<usize, Fault> {
    let raw = value.as_integer()?;
    usize::try_from(raw).map_err(|_| Fault::StackUnderflow)
}

impl StackFrame {
    /// Fails if `pc` or `prevframe` does not fit in an `Int32` cell.
    pub fn encode(&self) -> Result<[Value; FRAME_SIZE], Fault> {
        Ok([
            Value::function(Rc::clone(&self.closure)),
            cell(self.pc)?,
            cell(self.prevframe)?,
        ])
    }

    /// Reads a header back from the cells `encode` wrote.
    pub fn decode(cells: &[Value]) -> Result<StackFrame, Fault> {
        match cells {
            [closure, pc, prevframe] => Ok(StackFrame {
                closure:   closure.as_function()?,
                pc:        offset(pc)?,
                prevframe: offset(prevframe)?,
            }),
            _ => Err(Fault::IndexOutOfRange {
                index: FRAME_SIZE,
                count: cells.len(),
            }),
        }
    }
}
