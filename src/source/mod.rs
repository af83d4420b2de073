//! Event sources
//!
//! An event source is the object doing the real signaling/media work for one
//! connection. The core only needs it to:
//! - Deliver typed peer events to an attached sink
//! - Open bridged data channels on request
//! - Close its transport at teardown

mod loopback;
mod traits;

pub use loopback::{LoopbackSource, LoopbackSourceFactory};
pub use traits::{
    BridgeHandle, BridgeOptions, EventSink, EventSource, LaunchSpec, SourceFactory, SourceOptions,
};
