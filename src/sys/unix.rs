use std::io;
use std::mem;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::{Duration, Instant};

/// A raw, owned socket handle.
pub type RawSocket = RawFd;

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

fn new_raw_socket(ty: libc::c_int) -> io::Result<OwnedFd> {
    let domain = libc::AF_INET;
    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    let ty = ty | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC;
    let fd = syscall!(socket(domain, ty, 0))?;
    let fd = unsafe { OwnedFd::from_raw_fd(fd) };

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    {
        set_nonblocking_fd(fd.as_raw_fd(), true)?;
        set_cloexec_fd(fd.as_raw_fd())?;
    }
    Ok(fd)
}

/// Creates a new non-blocking, close-on-exec TCP (streaming) socket.
pub fn new_stream_socket() -> io::Result<RawSocket> {
    Ok(new_raw_socket(libc::SOCK_STREAM)?.into_raw_fd_detached())
}

/// Creates a new non-blocking, close-on-exec UDP (datagram) socket.
pub fn new_dgram_socket() -> io::Result<RawSocket> {
    Ok(new_raw_socket(libc::SOCK_DGRAM)?.into_raw_fd_detached())
}

trait IntoRawFdDetached {
    fn into_raw_fd_detached(self) -> RawFd;
}

impl IntoRawFdDetached for OwnedFd {
    fn into_raw_fd_detached(self) -> RawFd {
        std::os::fd::IntoRawFd::into_raw_fd(self)
    }
}

fn set_nonblocking_fd(fd: RawFd, nonblocking: bool) -> io::Result<()> {
    let flags = syscall!(fcntl(fd, libc::F_GETFL))?;
    let flags = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    syscall!(fcntl(fd, libc::F_SETFL, flags))?;
    Ok(())
}

fn set_cloexec_fd(fd: RawFd) -> io::Result<()> {
    let flags = syscall!(fcntl(fd, libc::F_GETFD))?;
    syscall!(fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC))?;
    Ok(())
}

pub fn set_reuseaddr(sock: RawSocket, on: bool) -> io::Result<()> {
    let val: libc::c_int = on as libc::c_int;
    syscall!(setsockopt(
        sock,
        libc::SOL_SOCKET,
        libc::SO_REUSEADDR,
        &val as *const _ as *const libc::c_void,
        mem::size_of::<libc::c_int>() as libc::socklen_t,
    ))?;
    Ok(())
}

fn to_sockaddr_in(addr: SocketAddr) -> (libc::sockaddr_in, libc::socklen_t) {
    let addr = match addr {
        SocketAddr::V4(v4) => v4,
        SocketAddr::V6(_) => panic!("completio only supports IPv4 (see Non-goals)"),
    };
    let mut sa: libc::sockaddr_in = unsafe { mem::zeroed() };
    sa.sin_family = libc::AF_INET as libc::sa_family_t;
    sa.sin_port = addr.port().to_be();
    sa.sin_addr = libc::in_addr {
        s_addr: u32::from_ne_bytes(addr.ip().octets()),
    };
    (sa, mem::size_of::<libc::sockaddr_in>() as libc::socklen_t)
}

fn from_sockaddr_in(sa: &libc::sockaddr_in) -> SocketAddr {
    let ip = Ipv4Addr::from(u32::from_ne_bytes(sa.sin_addr.s_addr.to_ne_bytes()));
    SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sa.sin_port)))
}

pub fn bind(sock: RawSocket, addr: SocketAddr) -> io::Result<()> {
    let (sa, len) = to_sockaddr_in(addr);
    syscall!(bind(sock, &sa as *const _ as *const libc::sockaddr, len))?;
    Ok(())
}

pub fn listen(sock: RawSocket, backlog: i32) -> io::Result<()> {
    syscall!(listen(sock, backlog))?;
    Ok(())
}

/// A blocking connect with a bounded wait for the non-blocking socket to
/// become writable, per the design note keeping `TcpClient::connect`
/// synchronous from the caller's perspective.
pub fn connect_blocking(sock: RawSocket, addr: SocketAddr, timeout: Duration) -> io::Result<()> {
    let (sa, len) = to_sockaddr_in(addr);
    let res = unsafe { libc::connect(sock, &sa as *const _ as *const libc::sockaddr, len) };
    if res == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.kind() != io::ErrorKind::WouldBlock
        && err.raw_os_error() != Some(libc::EINPROGRESS)
    {
        return Err(err);
    }

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"));
        }
        let mut pfd = libc::pollfd {
            fd: sock,
            events: libc::POLLOUT,
            revents: 0,
        };
        let ms = remaining.as_millis().min(i32::MAX as u128) as libc::c_int;
        let n = syscall!(poll(&mut pfd, 1, ms))?;
        if n == 0 {
            continue;
        }
        let mut sockerr: libc::c_int = 0;
        let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
        syscall!(getsockopt(
            sock,
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            &mut sockerr as *mut _ as *mut libc::c_void,
            &mut len,
        ))?;
        return if sockerr == 0 {
            Ok(())
        } else {
            Err(io::Error::from_raw_os_error(sockerr))
        };
    }
}

pub fn accept(sock: RawSocket) -> io::Result<(RawSocket, SocketAddr)> {
    let mut sa: libc::sockaddr_in = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let fd = syscall!(accept4(
        sock,
        &mut sa as *mut _ as *mut libc::sockaddr,
        &mut len,
        libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
    ))?;
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let fd = {
        let fd = syscall!(accept(sock, &mut sa as *mut _ as *mut libc::sockaddr, &mut len))?;
        set_nonblocking_fd(fd, true)?;
        set_cloexec_fd(fd)?;
        fd
    };
    Ok((fd, from_sockaddr_in(&sa)))
}

pub fn recv(sock: RawSocket, buf: &mut [u8]) -> io::Result<usize> {
    let n = syscall!(recv(
        sock,
        buf.as_mut_ptr() as *mut libc::c_void,
        buf.len(),
        0,
    ))?;
    Ok(n as usize)
}

pub fn send(sock: RawSocket, buf: &[u8]) -> io::Result<usize> {
    let n = syscall!(send(
        sock,
        buf.as_ptr() as *const libc::c_void,
        buf.len(),
        libc::MSG_NOSIGNAL,
    ))?;
    Ok(n as usize)
}

pub fn recvfrom(sock: RawSocket, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
    let mut sa: libc::sockaddr_in = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
    let n = syscall!(recvfrom(
        sock,
        buf.as_mut_ptr() as *mut libc::c_void,
        buf.len(),
        0,
        &mut sa as *mut _ as *mut libc::sockaddr,
        &mut len,
    ))?;
    Ok((n as usize, from_sockaddr_in(&sa)))
}

pub fn sendto(sock: RawSocket, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
    let (sa, len) = to_sockaddr_in(addr);
    let n = syscall!(sendto(
        sock,
        buf.as_ptr() as *const libc::c_void,
        buf.len(),
        libc::MSG_NOSIGNAL,
        &sa as *const _ as *const libc::sockaddr,
        len,
    ))?;
    Ok(n as usize)
}

pub fn getsockname(sock: RawSocket) -> io::Result<SocketAddr> {
    let mut sa: libc::sockaddr_in = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
    syscall!(getsockname(
        sock,
        &mut sa as *mut _ as *mut libc::sockaddr,
        &mut len,
    ))?;
    Ok(from_sockaddr_in(&sa))
}

pub fn shutdown(sock: RawSocket) {
    unsafe {
        libc::shutdown(sock, libc::SHUT_RDWR);
    }
}

pub fn close(sock: RawSocket) {
    unsafe {
        libc::close(sock);
    }
}

pub fn as_raw_fd_of(sock: RawSocket) -> RawFd {
    sock
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_listen_accept_loop_via_std() {
        let sock = new_stream_socket().unwrap();
        bind(sock, "127.0.0.1:0".parse().unwrap()).unwrap();
        listen(sock, LISTEN_BACKLOG_TEST).unwrap();
        let local = getsockname(sock).unwrap();
        assert_ne!(local.port(), 0);
        close(sock);
    }

    const LISTEN_BACKLOG_TEST: i32 = 16;
}
