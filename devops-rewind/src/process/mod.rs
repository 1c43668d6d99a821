//! Child process spawning for recorded commands.

mod spawn;

pub use spawn::{spawn_process, ProcessOptions, ProcessResult};
