//! Process spawning and output draining

pub mod buffer;
pub mod drain;
pub mod handle;

pub use buffer::OutputBuffer;
pub use drain::{DrainStatus, DrainTask};
pub use handle::ProcessHandle;
