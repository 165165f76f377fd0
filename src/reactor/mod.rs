//! The readiness/completion multiplexer. One instance per façade, shared
//! read-only by every worker thread for the duration of its run.
//!
//! On Unix this wraps `epoll` in level-of-abstraction terms identical to
//! the completion port described by the component design: a socket is
//! registered once, keyed by its `sock_id`, and `poll` returns a batch of
//! readiness events carrying that same key. The worker then performs the
//! actual `recv`/`send`/`accept` syscall itself and treats the outcome as
//! the "completion" — this is the documented readiness-backend scheme,
//! not a deviation from it.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as sys;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as sys;

use std::io;
use std::time::Duration;

/// The key a registration is recovered by on completion; equal to the
/// owning `SocketContext`'s `sock_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(pub u32);

/// Which directions a registration cares about. Hand-rolled rather than
/// pulled in from a bitflags crate since there are only ever two bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest(u8);

impl Interest {
    pub const READABLE: Interest = Interest(0b01);
    pub const WRITABLE: Interest = Interest(0b10);
    pub const READABLE_WRITABLE: Interest = Interest(0b11);

    pub fn is_readable(self) -> bool {
        self.0 & Self::READABLE.0 != 0
    }

    pub fn is_writable(self) -> bool {
        self.0 & Self::WRITABLE.0 != 0
    }
}

impl std::ops::BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

/// One readiness notification recovered from a single `poll` call.
#[derive(Debug, Clone, Copy)]
pub struct Readiness {
    pub token: Token,
    pub readable: bool,
    pub writable: bool,
    pub error: bool,
    pub read_closed: bool,
}

/// The multiplexer itself. Cheaply cloneable handles are not provided —
/// the façade owns one and hands out `&Reactor` borrows to its workers,
/// mirroring the "one completion port per façade" ownership rule.
pub struct Reactor {
    selector: sys::Selector,
}

impl Reactor {
    pub fn new() -> io::Result<Reactor> {
        Ok(Reactor {
            selector: sys::Selector::new()?,
        })
    }

    pub fn register(&self, raw: crate::sys::RawSocket, token: Token, interest: Interest) -> io::Result<()> {
        self.selector.register(raw, token, interest)
    }

    pub fn reregister(&self, raw: crate::sys::RawSocket, token: Token, interest: Interest) -> io::Result<()> {
        self.selector.reregister(raw, token, interest)
    }

    pub fn deregister(&self, raw: crate::sys::RawSocket) -> io::Result<()> {
        self.selector.deregister(raw)
    }

    /// Blocks up to `timeout` for readiness, appending results to `out`
    /// (which is cleared first). Returns the number of events.
    pub fn poll(&self, out: &mut Vec<Readiness>, timeout: Duration) -> io::Result<usize> {
        self.selector.poll(out, timeout)
    }
}
