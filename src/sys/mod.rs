//! Platform socket glue: the thin layer of raw syscalls every backend
//! (reactor, worker, façade) is built on top of. Kept separate from the
//! reactor so the reactor only ever deals in readiness/completions, never
//! raw `libc`/`windows-sys` calls directly.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::*;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::*;

/// `somaxconn`-equivalent backlog used for every listener, matching the
/// platform's maximum rather than an arbitrary constant.
#[cfg(unix)]
pub const LISTEN_BACKLOG: i32 = libc::SOMAXCONN;
#[cfg(windows)]
pub const LISTEN_BACKLOG: i32 = windows_sys::Win32::Networking::WinSock::SOMAXCONN as i32;
