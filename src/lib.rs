#[macro_use]
extern crate tracing;
#[macro_use]
extern crate serde;

pub mod config;
pub mod procedure;
pub mod tracer;
pub mod transaction;
pub mod value;

mod macros;
