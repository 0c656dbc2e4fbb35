//! Concrete operators over the filesystem and the python interpreter.
//!
//! The engine only ever sees these through the `Operator` trait; they live
//! here so the crate can be exercised end-to-end.

pub mod exec_ops;
pub mod file_ops;
pub mod materialize;

pub use exec_ops::RunCode;
pub use file_ops::{ApplyFix, ListDirectory, ReadFile, WriteFile};
pub use materialize::materialize;
