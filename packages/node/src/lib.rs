//! Public surface for the `keyhost-node` crate.
//!
//! Exposes the router builder, storage and config types so that external
//! crates (e.g. the testnet harness) can spin up an in-process host without
//! spawning a subprocess.

pub mod announce;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod router;
pub mod storage;

pub use announce::Announcer;
pub use config::NodeConfig;
pub use identity::HostIdentity;
pub use router::build_router;
pub use storage::{memory::MemoryStorage, Storage};
