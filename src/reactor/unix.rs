use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

use super::{Interest, Readiness, Token};

macro_rules! syscall {
    ($fn:ident ( $($arg:expr),* $(,)* ) ) => {{
        #[allow(unused_unsafe)]
        let res = unsafe { libc::$fn($($arg, )*) };
        if res == -1 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }};
}

pub struct Selector {
    ep: OwnedFd,
}

impl Selector {
    pub fn new() -> io::Result<Selector> {
        let ep = unsafe { OwnedFd::from_raw_fd(syscall!(epoll_create1(libc::EPOLL_CLOEXEC))?) };
        Ok(Selector { ep })
    }

    fn epoll_events_for(interest: Interest) -> u32 {
        let mut kind = libc::EPOLLRDHUP;
        if interest.is_readable() {
            kind |= libc::EPOLLIN;
        }
        if interest.is_writable() {
            kind |= libc::EPOLLOUT;
        }
        kind as u32
    }

    pub fn register(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: Self::epoll_events_for(interest),
            u64: u64::from(token.0),
        };
        syscall!(epoll_ctl(self.ep.as_raw_fd(), libc::EPOLL_CTL_ADD, fd, &mut event)).map(|_| ())
    }

    pub fn reregister(&self, fd: RawFd, token: Token, interest: Interest) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: Self::epoll_events_for(interest),
            u64: u64::from(token.0),
        };
        syscall!(epoll_ctl(self.ep.as_raw_fd(), libc::EPOLL_CTL_MOD, fd, &mut event)).map(|_| ())
    }

    pub fn deregister(&self, fd: RawFd) -> io::Result<()> {
        syscall!(epoll_ctl(
            self.ep.as_raw_fd(),
            libc::EPOLL_CTL_DEL,
            fd,
            std::ptr::null_mut(),
        ))
        .map(|_| ())
    }

    pub fn poll(&self, out: &mut Vec<Readiness>, timeout: Duration) -> io::Result<usize> {
        out.clear();
        let timeout_ms = timeout
            .checked_add(Duration::from_nanos(999_999))
            .unwrap_or(timeout)
            .as_millis()
            .min(i32::MAX as u128) as libc::c_int;

        let mut buf: [libc::epoll_event; 256] = unsafe { std::mem::zeroed() };
        let n = syscall!(epoll_wait(
            self.ep.as_raw_fd(),
            buf.as_mut_ptr(),
            buf.len() as i32,
            timeout_ms,
        ))?;

        for event in &buf[..n as usize] {
            let events = event.events as libc::c_int;
            out.push(Readiness {
                token: Token(event.u64 as u32),
                readable: events & (libc::EPOLLIN | libc::EPOLLPRI) != 0,
                writable: events & libc::EPOLLOUT != 0,
                error: events & libc::EPOLLERR != 0,
                read_closed: events & (libc::EPOLLHUP | libc::EPOLLRDHUP) != 0,
            });
        }
        Ok(n as usize)
    }
}
