//! Per-operation and per-socket lifecycle state, pooled so steady-state
//! traffic allocates nothing once the pools have warmed up.

mod iocontext;
mod sockcontext;

pub use iocontext::{IoContext, IoContextPool, OpTag};
pub use sockcontext::{SocketContext, SocketContextPool};

/// Fixed size of every `IoContext`'s I/O buffer.
pub const MAX_IO_BUFFER_SIZE: usize = 4096;
