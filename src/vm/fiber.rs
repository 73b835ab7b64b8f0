use std::{
    cell::{
        Ref,
        RefCell,
        RefMut,
    },
    fmt,
    mem,
    rc::{
        Rc,
        Weak,
    },
};

use tracing::{
    debug,
    trace,
};

use crate::{
    common::{
        captured::Captured,
        closure::Closure,
        fault::Fault,
        lambda::Lambda,
        value::Value,
    },
    vm::{
        config::FiberConfig,
        stack::{
            self,
            StackFrame,
            FRAME_SIZE,
        },
        trace::Trace,
    },
};

/// Where a fiber is in its life.
/// `Dead` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FiberStatus {
    /// Created, never resumed.
    Pending,
    Alive,
    /// The bottom frame returned.
    Dead,
    /// Stopped by an unrecovered fault or cancelled.
    Error,
}

impl FiberStatus {
    pub fn is_terminal(self) -> bool { matches!(self, FiberStatus::Dead | FiberStatus::Error) }

    fn can_become(self, to: FiberStatus) -> bool {
        use FiberStatus::*;
        matches!(
            (self, to),
            (Pending, Alive) | (Pending, Error) | (Alive, Dead) | (Alive, Error)
        )
    }
}

impl fmt::Display for FiberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FiberStatus::Pending => "pending",
            FiberStatus::Alive => "alive",
            FiberStatus::Dead => "dead",
            FiberStatus::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// What a fiber hands to its parent when it gives up control.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Suspended; the fiber may be resumed later.
    Yield(Value),
    /// The bottom frame returned this value.
    Return(Value),
    /// The fiber failed with this error value.
    Error(Value),
}

/// A control transfer up the resumption chain.
#[derive(Debug)]
pub struct Transfer {
    /// The fiber that resumed this one, if it is still around.
    pub parent: Option<FiberHandle>,
    pub signal: Signal,
}

/// A green thread: one growable stack of values holding every frame.
///
/// The stack is laid out as
/// ```plain
/// [header][locals of frame 1][header][locals of frame 2][header][scratch...]
///  ^0      ^frame                                        ^frametop         ^stacktop
/// ```
/// where `frame..frametop` are the current frame's locals, and the
/// `FRAME_SIZE` cells at `frametop` are kept free for the header of the
/// next call, whose arguments are pushed right above them.
/// A `frame` of zero means no frame has been pushed.
/// Every cell at or above `stacktop` is nil.
pub struct Fiber {
    data:     Vec<Value>,
    frame:    usize,
    frametop: usize,
    stacktop: usize,
    parent:   Option<WeakFiber>,
    status:   FiberStatus,
    /// Environments still open on this stack.
    envs:     Vec<Rc<Captured>>,
    this:     WeakFiber,
    config:   FiberConfig,
}

impl Fiber {
    fn new(config: FiberConfig, this: WeakFiber) -> Fiber {
        let mut data = vec![];
        data.resize(config.initial(), Value::nil());
        Fiber {
            data,
            frame: 0,
            frametop: 0,
            stacktop: FRAME_SIZE,
            parent: None,
            status: FiberStatus::Pending,
            envs: vec![],
            this,
            config,
        }
    }

    pub fn status(&self) -> FiberStatus { self.status }

    pub fn config(&self) -> &FiberConfig { &self.config }

    pub fn capacity(&self) -> usize { self.data.len() }

    pub fn frame(&self) -> usize { self.frame }

    pub fn frametop(&self) -> usize { self.frametop }

    pub fn stacktop(&self) -> usize { self.stacktop }

    /// Every live cell, headers included.
    pub fn stack(&self) -> &[Value] { &self.data[..self.stacktop] }

    pub fn parent(&self) -> Option<FiberHandle> { self.parent.as_ref().and_then(WeakFiber::upgrade) }

    /// Number of values pushed above the current frame.
    pub fn scratch(&self) -> usize { self.stacktop - (self.frametop + FRAME_SIZE) }

    /// Number of environments still open on this stack.
    pub fn open_envs(&self) -> usize { self.envs.len() }

    fn transition(&mut self, to: FiberStatus) -> Result<(), Fault> {
        if !self.status.can_become(to) {
            return Err(Fault::InvalidTransition {
                from: self.status,
                to,
            });
        }
        debug!(from = %self.status, %to, "fiber status");
        self.status = to;
        Ok(())
    }

    /// Grows the stack until it holds `needed` cells,
    /// doubling the capacity each time.
    fn ensure(&mut self, needed: usize) -> Result<(), Fault> {
        let capacity = self.data.len();
        if needed <= capacity {
            return Ok(());
        }

        let limit = self.config.limit();
        if needed > limit {
            return Err(Fault::StackOverflow);
        }

        let mut grown = capacity.max(1);
        while grown < needed {
            grown *= 2;
        }
        let grown = grown.min(limit);

        trace!(from = capacity, to = grown, "growing fiber stack");
        self.data.try_reserve_exact(grown - capacity)?;
        self.data.resize(grown, Value::nil());
        Ok(())
    }

    /// Reads any live cell by absolute offset.
    pub fn get(&self, offset: usize) -> Result<Value, Fault> {
        if offset < self.stacktop {
            Ok(self.data[offset].clone())
        } else {
            Err(Fault::IndexOutOfRange {
                index: offset,
                count: self.stacktop,
            })
        }
    }

    /// Writes any live cell by absolute offset,
    /// except the current frame's header.
    pub fn set(&mut self, offset: usize, value: Value) -> Result<(), Fault> {
        if self.frame != 0 && (self.frame - FRAME_SIZE..self.frame).contains(&offset) {
            return Err(Fault::FrameHeader(offset));
        }
        if offset < self.stacktop {
            self.data[offset] = value;
            Ok(())
        } else {
            Err(Fault::IndexOutOfRange {
                index: offset,
                count: self.stacktop,
            })
        }
    }

    pub fn push(&mut self, value: Value) -> Result<(), Fault> {
        self.ensure(self.stacktop + 1)?;
        self.data[self.stacktop] = value;
        self.stacktop += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Value, Fault> {
        if self.scratch() == 0 {
            return Err(Fault::StackUnderflow);
        }
        self.stacktop -= 1;
        Ok(mem::take(&mut self.data[self.stacktop]))
    }

    pub fn peek(&self) -> Result<Value, Fault> {
        if self.scratch() == 0 {
            return Err(Fault::StackUnderflow);
        }
        Ok(self.data[self.stacktop - 1].clone())
    }

    fn locals(&self, index: usize) -> Result<usize, Fault> {
        if self.frame == 0 {
            return Err(Fault::NoFrame);
        }
        let count = self.frametop - self.frame;
        if index < count {
            Ok(self.frame + index)
        } else {
            Err(Fault::IndexOutOfRange { index, count })
        }
    }

    /// Reads a local slot of the current frame.
    pub fn local(&self, index: usize) -> Result<Value, Fault> {
        let offset = self.locals(index)?;
        Ok(self.data[offset].clone())
    }

    pub fn set_local(&mut self, index: usize, value: Value) -> Result<(), Fault> {
        let offset = self.locals(index)?;
        self.data[offset] = value;
        Ok(())
    }

    fn header(&self, frame: usize) -> Result<StackFrame, Fault> {
        if frame < FRAME_SIZE || frame > self.stacktop {
            return Err(Fault::StackUnderflow);
        }
        let header = StackFrame::decode(&self.data[frame - FRAME_SIZE..frame])?;
        // zero, or a frame below this one with room for its header
        let prevframe = header.prevframe;
        if prevframe >= frame || (prevframe != 0 && prevframe < FRAME_SIZE) {
            return Err(Fault::StackUnderflow);
        }
        Ok(header)
    }

    pub fn current_frame(&self) -> Result<StackFrame, Fault> {
        if self.frame == 0 {
            return Err(Fault::NoFrame);
        }
        self.header(self.frame)
    }

    /// Every frame on the stack, innermost first.
    pub fn frames(&self) -> Result<Vec<StackFrame>, Fault> {
        let mut frames = vec![];
        let mut frame = self.frame;
        while frame != 0 {
            let header = self.header(frame)?;
            frame = header.prevframe;
            frames.push(header);
        }
        Ok(frames)
    }

    /// Records the program counter of the current frame.
    pub fn set_pc(&mut self, pc: usize) -> Result<(), Fault> {
        if self.frame == 0 {
            return Err(Fault::NoFrame);
        }
        self.data[self.frame - FRAME_SIZE + 1] = stack::cell(pc)?;
        Ok(())
    }

    /// Calls `closure` with the `argc` values on top of the stack.
    ///
    /// The arguments become the first locals of the new frame;
    /// a variadic function gets the extra ones as a tuple in local `arity`.
    /// The stack grows if the frame does not fit.
    /// On failure nothing about the fiber changes.
    pub fn push_frame(&mut self, closure: Rc<Closure>, argc: usize) -> Result<(), Fault> {
        if self.status.is_terminal() {
            return Err(Fault::FiberNotAlive(self.status));
        }

        let pushed = self.scratch();
        if pushed != argc {
            return Err(Fault::ArgumentCount { pushed, argc });
        }

        let arity = closure.lambda.arity;
        let variadic = closure.lambda.is_variadic();
        if argc < arity || (!variadic && argc > arity) {
            return Err(Fault::Arity {
                arity,
                variadic,
                got: argc,
            });
        }

        let slots = closure.lambda.slotcount.max(arity + variadic as usize);
        let newframe = self.frametop + FRAME_SIZE;
        let newframetop = newframe + slots;
        let newstacktop = newframetop + FRAME_SIZE;
        let header = StackFrame {
            closure,
            pc: 0,
            prevframe: self.frame,
        }
        .encode()?;
        self.ensure(newstacktop)?;

        let filled = if variadic {
            let extra = self.data[newframe + arity..newframe + argc]
                .iter_mut()
                .map(mem::take)
                .collect::<Vec<_>>();
            self.data[newframe + arity] = Value::tuple(extra);
            arity + 1
        } else {
            argc
        };
        for cell in &mut self.data[newframe + filled..newframetop] {
            *cell = Value::nil();
        }

        for (cell, value) in self.data[self.frametop..newframe].iter_mut().zip(header) {
            *cell = value;
        }

        self.frame = newframe;
        self.frametop = newframetop;
        self.stacktop = newstacktop;
        debug!(frame = newframe, slots, argc, "pushed frame");
        Ok(())
    }

    /// Closes every open environment at or above `from`.
    fn close_envs(&mut self, from: usize) {
        let Fiber { envs, data, this, .. } = self;
        envs.retain(|env| match env.anchored_on(this) {
            Some(offset) if offset >= from => {
                env.close_from(&data[..]);
                false
            },
            Some(_) => true,
            // closed by someone else
            None => false,
        });
    }

    /// Pops the current frame, closing any environment anchored in it.
    /// Arguments and locals are discarded and `stacktop` drops to the
    /// popped frame's start.
    pub fn pop_frame(&mut self) -> Result<StackFrame, Fault> {
        if self.frame == 0 {
            return Err(Fault::NoFrame);
        }

        let header = self.header(self.frame)?;
        self.close_envs(self.frame);

        let base = self.frame - FRAME_SIZE;
        for cell in &mut self.data[base..self.stacktop] {
            *cell = Value::nil();
        }

        self.stacktop = self.frame;
        self.frametop = base;
        self.frame = header.prevframe;
        debug!(frame = self.frame, "popped frame");
        Ok(header)
    }

    /// Returns `value` from the current frame.
    /// The value is pushed for the caller, or, if the bottom frame
    /// returned, the fiber dies and the value goes to the parent.
    pub fn return_frame(&mut self, value: Value) -> Result<Option<Transfer>, Fault> {
        let bottom = self.current_frame()?.prevframe == 0;
        if bottom && !self.status.can_become(FiberStatus::Dead) {
            return Err(Fault::InvalidTransition {
                from: self.status,
                to:   FiberStatus::Dead,
            });
        }

        self.pop_frame()?;
        if !bottom {
            self.push(value)?;
            return Ok(None);
        }

        self.transition(FiberStatus::Dead)?;
        Ok(Some(Transfer {
            parent: self.parent(),
            signal: Signal::Return(value),
        }))
    }

    /// Gives control back to the parent. The status stays `Alive`,
    /// and resuming picks up at the same frame.
    pub fn suspend(&mut self, value: Value) -> Result<Transfer, Fault> {
        if self.status != FiberStatus::Alive {
            return Err(Fault::FiberNotAlive(self.status));
        }
        debug!("suspending fiber");
        Ok(Transfer {
            parent: self.parent(),
            signal: Signal::Yield(value),
        })
    }

    /// Stops the fiber with an unrecovered fault.
    /// Frames stay on the stack so they can still be traced.
    pub fn fail(&mut self, error: Value) -> Result<Transfer, Fault> {
        self.transition(FiberStatus::Error)?;
        Ok(Transfer {
            parent: self.parent(),
            signal: Signal::Error(error),
        })
    }

    /// Fails the fiber and pops every frame.
    pub fn cancel(&mut self, error: Value) -> Result<Transfer, Fault> {
        debug!(frames = self.frames().map(|f| f.len()).unwrap_or(0), "cancelling fiber");
        let transfer = self.fail(error)?;
        self.unwind();
        Ok(transfer)
    }

    /// Pops every frame, closing their environments,
    /// and clears the stack.
    pub fn unwind(&mut self) {
        while self.frame != 0 {
            if self.pop_frame().is_err() {
                break;
            }
        }

        self.close_envs(0);
        for cell in &mut self.data[..self.stacktop] {
            *cell = Value::nil();
        }
        self.frame = 0;
        self.frametop = 0;
        self.stacktop = FRAME_SIZE;
    }

    /// An open environment over `length` cells starting at `offset`.
    pub fn capture(&mut self, offset: usize, length: usize) -> Result<Rc<Captured>, Fault> {
        let end = offset.checked_add(length).unwrap_or(usize::MAX);
        if offset < FRAME_SIZE || end > self.stacktop {
            return Err(Fault::IndexOutOfRange {
                index: end,
                count: self.stacktop,
            });
        }

        let env = Rc::new(Captured::open(self.this.clone(), offset, length));
        self.envs.try_reserve(1)?;
        self.envs.push(Rc::clone(&env));
        Ok(env)
    }

    /// The environment over the current frame's locals,
    /// shared by every closure that captures them.
    fn frame_env(&mut self) -> Result<Rc<Captured>, Fault> {
        if self.frame == 0 {
            return Err(Fault::NoFrame);
        }

        let offset = self.frame;
        let length = self.frametop - self.frame;
        let existing = self
            .envs
            .iter()
            .find(|env| env.anchored_on(&self.this) == Some(offset) && env.len() == length);

        match existing {
            Some(env) => Ok(Rc::clone(env)),
            None => self.capture(offset, length),
        }
    }

    /// Instantiates `lambda` as a closure inside the current frame.
    pub fn closure(&mut self, lambda: Rc<Lambda>) -> Result<Rc<Closure>, Fault> {
        let mut envs = Vec::with_capacity(lambda.environments.len());
        for &index in lambda.environments.iter() {
            let env = if index < 0 {
                self.frame_env()?
            } else {
                let current = self.current_frame()?.closure;
                Rc::clone(current.env(index as usize)?)
            };
            envs.push(env);
        }

        trace!(envs = envs.len(), "made closure");
        Ok(Rc::new(Closure::new(lambda, envs)))
    }

    /// Reads cell `index` of the current closure's `env`th environment.
    pub fn load_upvalue(&self, env: usize, index: usize) -> Result<Value, Fault> {
        let closure = self.current_frame()?.closure;
        let captured = closure.env(env)?;
        match captured.anchored_on(&self.this) {
            Some(offset) if index < captured.len() => self.get(offset + index),
            _ => captured.get(index),
        }
    }

    /// Writes cell `index` of the current closure's `env`th environment.
    pub fn store_upvalue(&mut self, env: usize, index: usize, value: Value) -> Result<(), Fault> {
        let closure = self.current_frame()?.closure;
        let captured = closure.env(env)?;
        match captured.anchored_on(&self.this) {
            Some(offset) if index < captured.len() => self.set(offset + index, value),
            _ => captured.set(index, value),
        }
    }

    /// A traceback through every frame that has source information.
    pub fn trace(&self, message: &str) -> Trace {
        let mut spans = self
            .frames()
            .unwrap_or_default()
            .iter()
            .filter_map(|frame| frame.closure.lambda.span_at(frame.pc))
            .collect::<Vec<_>>();
        spans.reverse();
        Trace::error("Error", message, spans)
    }
}

impl Drop for Fiber {
    fn drop(&mut self) {
        if !self.envs.is_empty() {
            self.close_envs(0);
        }
    }
}

/// A shared reference to a fiber, as held by values.
#[derive(Clone)]
pub struct FiberHandle(Rc<RefCell<Fiber>>);

/// A non-owning reference to a fiber.
#[derive(Clone)]
pub struct WeakFiber(Weak<RefCell<Fiber>>);

impl FiberHandle {
    pub fn new(config: FiberConfig) -> FiberHandle {
        FiberHandle(Rc::new_cyclic(|this| {
            RefCell::new(Fiber::new(config, WeakFiber(this.clone())))
        }))
    }

    pub fn into_rc(self) -> Rc<RefCell<Fiber>> { self.0 }

    pub fn from_rc(rc: Rc<RefCell<Fiber>>) -> FiberHandle { FiberHandle(rc) }

    pub fn as_ptr(&self) -> *const RefCell<Fiber> { Rc::as_ptr(&self.0) }

    pub fn downgrade(&self) -> WeakFiber { WeakFiber(Rc::downgrade(&self.0)) }

    pub fn ptr_eq(&self, other: &FiberHandle) -> bool { Rc::ptr_eq(&self.0, &other.0) }

    pub fn try_borrow(&self) -> Result<Ref<'_, Fiber>, Fault> {
        self.0.try_borrow().map_err(|_| Fault::FiberBusy)
    }

    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, Fiber>, Fault> {
        self.0.try_borrow_mut().map_err(|_| Fault::FiberBusy)
    }

    pub fn status(&self) -> Result<FiberStatus, Fault> { Ok(self.try_borrow()?.status) }

    /// Hands control to this fiber, recording who resumed it.
    /// The first resume makes a pending fiber alive;
    /// dead and errored fibers can not be resumed.
    pub fn resume(&self, parent: Option<&FiberHandle>) -> Result<(), Fault> {
        let mut fiber = self.try_borrow_mut()?;
        match fiber.status {
            FiberStatus::Pending => fiber.transition(FiberStatus::Alive)?,
            FiberStatus::Alive => (),
            status => return Err(Fault::FiberNotAlive(status)),
        }
        fiber.parent = parent.map(FiberHandle::downgrade);
        debug!(frame = fiber.frame, "resuming fiber");
        Ok(())
    }
}

impl fmt::Debug for FiberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(fiber) => write!(f, "Fiber({:p}, {})", self.as_ptr(), fiber.status),
            Err(_) => write!(f, "Fiber({:p}, running)", self.as_ptr()),
        }
    }
}

impl WeakFiber {
    pub fn upgrade(&self) -> Option<FiberHandle> { self.0.upgrade().map(FiberHandle) }

    pub fn ptr_eq(&self, other: &WeakFiber) -> bool { Weak::ptr_eq(&self.0, &other.0) }
}
