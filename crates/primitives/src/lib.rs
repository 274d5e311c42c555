//! Shared types for the edgemesh node: application records, the gossip
//! status message, and the chain glue consumed by the data-fetch RPC.

pub mod application;
pub mod chain;
pub mod hash;
pub mod status;

pub use application::{AppPeer, Application};
pub use hash::Hash;
pub use status::{AppStatus, StatusError};
