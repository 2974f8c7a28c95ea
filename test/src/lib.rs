//! Harness for driving a [`Server`](statecast_server::Server) from scripted
//! peers over the in-memory channel transport.

pub mod helpers;

pub use helpers::*;
