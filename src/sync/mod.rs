//! The concurrency substrate the rest of the crate is built from: a
//! signaling [`Event`] and a recursive [`Mutex`].

mod event;
mod mutex;

pub use event::Event;
pub use mutex::{Mutex, MutexGuard};
