use std::{
    fmt,
    rc::Rc,
};

use crate::common::{
    captured::Captured,
    fault::Fault,
    lambda::Lambda,
};

/// Wraps a `Lambda` with the environments it closed over.
/// The `Lambda` is shared with every other closure made from it;
/// each environment is shared with the fiber it lives on while open.
pub struct Closure {
    pub lambda: Rc<Lambda>,
    pub envs:   Vec<Rc<Captured>>,
}

impl Closure {
    pub fn new(lambda: Rc<Lambda>, envs: Vec<Rc<Captured>>) -> Closure { Closure { lambda, envs } }

    /// Constructs a `Closure` that captures nothing.
    pub fn wrap(lambda: Lambda) -> Closure { Closure::new(Rc::new(lambda), vec![]) }

    pub fn env(&self, index: usize) -> Result<&Rc<Captured>, Fault> {
        self.envs.get(index).ok_or(Fault::IndexOutOfRange {
            index,
            count: self.envs.len(),
        })
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("lambda", &format_args!("{}", self.lambda))
            .field("envs", &self.envs)
            .finish()
    }
}
