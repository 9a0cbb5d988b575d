//! Transaction manager capability and its in-memory, lock based implementation.

pub mod domain;
pub mod error;
pub mod lock;
#[cfg(feature = "memory")]
pub mod memory;
pub mod service;
