use crate::vm::stack::FRAME_SIZE;

/// Sizing limits for a fiber's stack, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiberConfig {
    /// Cells allocated when the fiber is created.
    pub initial_capacity: usize,
    /// Growth past this many cells fails with a stack overflow.
    pub max_capacity:     usize,
}

impl Default for FiberConfig {
    fn default() -> FiberConfig {
        FiberConfig {
            initial_capacity: 32,
            max_capacity:     1 << 24,
        }
    }
}

impl FiberConfig {
    pub fn new(initial_capacity: usize, max_capacity: usize) -> FiberConfig {
        FiberConfig {
            initial_capacity,
            max_capacity,
        }
    }

    pub fn with_initial_capacity(self, initial_capacity: usize) -> FiberConfig {
        FiberConfig {
            initial_capacity,
            ..self
        }
    }

    pub fn with_max_capacity(self, max_capacity: usize) -> FiberConfig {
        FiberConfig {
            max_capacity,
            ..self
        }
    }

    /// The capacity limit actually enforced.
    /// Offsets are stored in frame headers as 32-bit integers,
    /// and a fiber always has room for its first frame header.
    pub fn limit(&self) -> usize { self.max_capacity.clamp(FRAME_SIZE, i32::MAX as usize) }

    /// The capacity a new fiber starts with.
    pub fn initial(&self) -> usize { self.initial_capacity.clamp(FRAME_SIZE, self.limit()) }
}
