//! This module contains the execution-side machinery:
//! the two value encodings, the fiber and its stack frames,
//! runtime configuration, and tracebacks.
//! Everything here is driven by an external interpreter loop.

pub mod config;
pub mod fiber;
pub mod stack;
pub mod tag;
pub mod trace;
pub mod union;

use crate::common::data::{
    Data,
    Kind,
};

/// The seam between `Value` and its encoding.
/// [`tag::Tagged`] packs a value into one NaN-tagged word,
/// [`union::Union`] keeps an explicit tagged union.
/// Both must behave identically through this interface;
/// which one backs `Value` is chosen at build time.
pub trait Repr: Clone {
    /// Wraps a payload. NaNs must be canonicalized here.
    fn encode(data: Data) -> Self;
    fn kind(&self) -> Kind;
    /// Copies the payload back out. Heap payloads are shared, not cloned.
    fn decode(&self) -> Data;
    fn truthy(&self) -> bool;
    fn integer(&self) -> Option<i32>;
    fn real(&self) -> Option<f64>;
    /// A cheap check that two cells are the same value,
    /// used to skip a full comparison. May return false negatives.
    fn identical(&self, other: &Self) -> bool;
}
