//! Reliable, ordered, unidirectional file transfer over UDP.
//!
//! The interesting state lives in [`transport`]: the sender's transmit
//! window, its two interchangeable congestion controllers, and the
//! receiver's out-of-order reassembly buffer. Everything else here is the
//! ambient plumbing those pieces run on top of: the wire codec, the RTT/RTO
//! estimator, the socket abstraction the core is generic over, the tunable
//! [`config::Config`], and the crate's [`err::Error`] type.
pub mod config;
pub mod err;
pub mod rtt;
pub mod socket;
pub mod transport;
pub mod wire;

pub use config::Config;
pub use err::Error;
pub use transport::{Receiver, Sender};
