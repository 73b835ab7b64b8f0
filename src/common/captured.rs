use std::{
    cell::RefCell,
    fmt,
};

use tracing::debug;

use crate::{
    common::{
        fault::Fault,
        value::Value,
    },
    vm::fiber::WeakFiber,
};

enum State {
    /// The values still live on `fiber`'s stack, starting at `offset`.
    Open { fiber: WeakFiber, offset: usize },
    /// The values were copied out and are owned here.
    Closed(Box<[Value]>),
}

/// A lexical scope captured by a closure.
///
/// While open, a `Captured` is only a view into the stack of the fiber
/// that created it, and reads and writes go to that stack.
/// Closing copies the values out, after which the environment owns them
/// and no longer refers to the fiber at all.
/// A fiber closes every environment anchored in a frame before popping it.
pub struct Captured {
    length: usize,
    state:  RefCell<State>,
}

impl Captured {
    /// An open environment over `length` cells at `offset` on `fiber`.
    pub(crate) fn open(fiber: WeakFiber, offset: usize, length: usize) -> Captured {
        debug!(offset, length, "capturing environment");
        Captured {
            length,
            state: RefCell::new(State::Open { fiber, offset }),
        }
    }

    /// An environment that was never on a stack.
    pub fn closed(values: Vec<Value>) -> Captured {
        Captured {
            length: values.len(),
            state:  RefCell::new(State::Closed(values.into_boxed_slice())),
        }
    }

    pub fn len(&self) -> usize { self.length }

    pub fn is_empty(&self) -> bool { self.length == 0 }

    /// Stack offset of an open environment; zero once closed.
    pub fn offset(&self) -> isize {
        match &*self.state.borrow() {
            State::Open { offset, .. } => *offset as isize,
            State::Closed(_) => 0,
        }
    }

    pub fn is_open(&self) -> bool { matches!(&*self.state.borrow(), State::Open { .. }) }

    /// Whether this environment is open on `fiber`.
    /// Returns the offset of its first cell if so.
    pub(crate) fn anchored_on(&self, fiber: &WeakFiber) -> Option<usize> {
        match &*self.state.borrow() {
            State::Open { fiber: on, offset } if on.ptr_eq(fiber) => Some(*offset),
            _ => None,
        }
    }

    /// Closes the environment by reading its fiber's stack.
    /// Does nothing if already closed.
    /// Fails if the fiber is gone or currently borrowed;
    /// a running fiber closes its own environments as frames are popped.
    pub fn close(&self) -> Result<(), Fault> {
        let fiber = match &*self.state.borrow() {
            State::Closed(_) => return Ok(()),
            State::Open { fiber, .. } => fiber.upgrade().ok_or(Fault::Detached)?,
        };
        let fiber = fiber.try_borrow()?;
        self.close_from(fiber.stack());
        Ok(())
    }

    /// Closes the environment by copying its cells out of `stack`,
    /// which must be the stack of the fiber it is open on.
    pub(crate) fn close_from(&self, stack: &[Value]) {
        let Ok(mut state) = self.state.try_borrow_mut() else {
            return;
        };
        if let State::Open { offset, .. } = &*state {
            let offset = *offset;
            debug!(offset, length = self.length, "closing environment");
            // always `length` cells, nil past the end of `stack`
            let values = (0..self.length)
                .map(|i| {
                    offset
                        .checked_add(i)
                        .and_then(|at| stack.get(at))
                        .cloned()
                        .unwrap_or_default()
                })
                .collect::<Vec<_>>();
            *state = State::Closed(values.into_boxed_slice());
        }
    }

    fn check(&self, index: usize) -> Result<(), Fault> {
        if index < self.length {
            Ok(())
        } else {
            Err(Fault::IndexOutOfRange {
                index,
                count: self.length,
            })
        }
    }

    /// Reads a captured cell, wherever it currently lives.
    pub fn get(&self, index: usize) -> Result<Value, Fault> {
        self.check(index)?;
        match &*self.state.borrow() {
            State::Closed(values) => Ok(values[index].clone()),
            State::Open { fiber, offset } => {
                let fiber = fiber.upgrade().ok_or(Fault::Detached)?;
                let fiber = fiber.try_borrow()?;
                fiber.get(offset + index)
            },
        }
    }

    /// Writes a captured cell, wherever it currently lives.
    pub fn set(&self, index: usize, value: Value) -> Result<(), Fault> {
        self.check(index)?;
        match &mut *self.state.borrow_mut() {
            State::Closed(values) => {
                values[index] = value;
                Ok(())
            },
            State::Open { fiber, offset } => {
                let fiber = fiber.upgrade().ok_or(Fault::Detached)?;
                let mut fiber = fiber.try_borrow_mut()?;
                fiber.set(*offset + index, value)
            },
        }
    }

    /// A snapshot of every captured cell.
    pub fn values(&self) -> Result<Vec<Value>, Fault> {
        (0..self.length).map(|i| self.get(i)).collect()
    }
}

impl fmt::Debug for Captured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.state.borrow() {
            State::Open { offset, .. } => write!(f, "Captured(open @ {}, {})", offset, self.length),
            State::Closed(values) => f.debug_tuple("Captured").field(values).finish(),
        }
    }
}
