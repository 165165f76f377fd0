//! A small, cross-platform completion-driven networking toolkit.
//!
//! The core is a completion-based runtime: a fixed pool of worker threads
//! multiplexes I/O completions for many sockets at once, dispatching user
//! callbacks and recycling per-operation and per-socket state through
//! bounded pools. [`net::TcpServer`], [`net::TcpClient`], and
//! [`net::UdpPeer`] are the public entry points; everything else in this
//! crate (threads, events, mutexes, work queues, timers, the byte-stream
//! codec, the logger) is the supporting substrate they're built from.
//!
//! See [`features`] for what each Cargo feature flag turns on.

pub mod error;
pub mod features;

pub mod byteorder;
pub mod bytestream;
pub mod sync;
pub mod thread;
pub mod timefmt;
pub mod timer;
pub mod workqueue;

#[cfg(feature = "logger")]
pub mod logger;

#[cfg(feature = "os-poll")]
pub mod io;
#[cfg(feature = "os-poll")]
pub mod reactor;
#[cfg(feature = "os-poll")]
pub mod sockaddr;
#[cfg(feature = "os-poll")]
pub mod sys;

#[cfg(feature = "os-poll")]
mod worker;

#[cfg(feature = "net")]
pub mod net;

pub use error::{Error, Result};

#[cfg(feature = "os-poll")]
pub use sockaddr::SockAddr;

#[cfg(feature = "net")]
pub use net::{Config, TcpClient, TcpHandler, TcpServer, UdpHandler, UdpPeer};
