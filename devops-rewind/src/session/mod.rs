//! Looking up sessions from user-supplied references.

mod resolve;

pub use resolve::{resolve_session, MIN_PREFIX_LEN};
