// Link layer modules
pub mod data_link; // Frame layout and checksum
pub mod physical; // Transport trait, signals, self-test and mock transports
pub mod server; // Link server, state machine, arbiter and dispatcher

// Request plumbing
mod queue;
pub mod request;

// Re-exports for convenience
pub use physical::HardwareTransport;
pub use queue::QueueDepths;
pub use request::{Command, Request};
pub use server::{LinkDevice, LinkHandle, LinkState};

// Common types and traits
pub mod config;
pub mod error;
pub mod stats;
pub mod types;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
