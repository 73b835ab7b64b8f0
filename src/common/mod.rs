//! Contains the datastructures shared by the whole runtime.
//!
//! - Values, their payloads, and faults.
//! - Strings, tuples, structs, and the mutable containers.
//! - Compiled functions, closures, and captured environments.
//! - Source code representation and span annotations.

pub mod array;
pub mod buffer;
pub mod captured;
pub mod closure;
pub mod data;
pub mod fault;
pub mod lambda;
pub mod native;
pub mod source;
pub mod span;
pub mod string;
pub mod table;
pub mod tuple;
pub mod userdata;
pub mod value;
