//! Process-wide logging setup shared by the binaries.

mod tracing;

pub use self::tracing::{LogFormat, init, init_with};
