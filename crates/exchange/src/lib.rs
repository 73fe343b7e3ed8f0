//! Message passing for kvtree
//!
//! Moves trees between the members of a process group:
//! - comm: `Communicator` trait with byte messaging and built-in collectives
//! - local: thread-backed in-process group
//! - transfer: send/recv/sendrecv/bcast of whole trees
//! - topology: ring distances and hop planning
//! - sparse: Bruck-style sparse all-to-all exchange

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod comm;
pub mod error;
pub mod local;
pub mod sparse;
pub mod topology;
pub mod transfer;

pub use comm::{Communicator, ReduceOp};
pub use error::{ExchangeError, Result};
pub use local::{LocalComm, LocalGroup, DEFAULT_RECV_TIMEOUT};
pub use sparse::{exchange, exchange_direction, exchange_direction_hops, send_queue_insert};
pub use topology::{hop_plan, Direction, HopPlan};
pub use transfer::{bcast, recv, send, sendrecv, MAX_MESSAGE_SIZE};
