//! Data models for recorded sessions.

mod breakpoint;
mod session;
mod step;

pub use breakpoint::Breakpoint;
pub use session::Session;
pub use step::Step;
