//! Callback relay
//!
//! Intercepts every event a connection's event source emits and routes it:
//! - First to the owning registry's application hook
//! - Then to the connection's own default handling, unless the hook vetoed
//!   a data channel

mod callbacks;

pub use callbacks::CallbackRelay;
