use std::io;
use std::mem;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::{Duration, Instant};

use windows_sys::Win32::Networking::WinSock::{
    self, AF_INET, FIONBIO, INVALID_SOCKET, IPPROTO_TCP, SOCKADDR_IN, SOCKET, SOCKET_ERROR,
    SOCK_DGRAM, SOCK_STREAM, SOL_SOCKET, SO_REUSEADDR, WSADATA,
};

/// A raw, owned socket handle.
pub type RawSocket = SOCKET;

fn wsa_init() {
    use std::sync::Once;
    static ONCE: Once = Once::new();
    ONCE.call_once(|| unsafe {
        let mut data: WSADATA = mem::zeroed();
        WinSock::WSAStartup(0x0202, &mut data);
    });
}

fn last_error() -> io::Error {
    io::Error::from_raw_os_error(unsafe { WinSock::WSAGetLastError() })
}

fn new_socket(ty: i32, proto: i32) -> io::Result<RawSocket> {
    wsa_init();
    let sock = unsafe { WinSock::socket(AF_INET as i32, ty, proto) };
    if sock == INVALID_SOCKET {
        return Err(last_error());
    }
    set_nonblocking(sock, true)?;
    Ok(sock)
}

pub fn new_stream_socket() -> io::Result<RawSocket> {
    new_socket(SOCK_STREAM as i32, IPPROTO_TCP as i32)
}

pub fn new_dgram_socket() -> io::Result<RawSocket> {
    new_socket(SOCK_DGRAM as i32, 0)
}

pub fn set_nonblocking(sock: RawSocket, on: bool) -> io::Result<()> {
    let mut mode: u32 = on as u32;
    let res = unsafe { WinSock::ioctlsocket(sock, FIONBIO, &mut mode) };
    if res == SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(())
}

pub fn set_reuseaddr(sock: RawSocket, on: bool) -> io::Result<()> {
    let val: i32 = on as i32;
    let res = unsafe {
        WinSock::setsockopt(
            sock,
            SOL_SOCKET as i32,
            SO_REUSEADDR as i32,
            &val as *const _ as *const u8,
            mem::size_of::<i32>() as i32,
        )
    };
    if res == SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(())
}

fn to_sockaddr_in(addr: SocketAddr) -> SOCKADDR_IN {
    let addr = match addr {
        SocketAddr::V4(v4) => v4,
        SocketAddr::V6(_) => panic!("completio only supports IPv4 (see Non-goals)"),
    };
    let mut sa: SOCKADDR_IN = unsafe { mem::zeroed() };
    sa.sin_family = AF_INET;
    sa.sin_port = addr.port().to_be();
    sa.sin_addr.S_un.S_addr = u32::from_ne_bytes(addr.ip().octets());
    sa
}

fn from_sockaddr_in(sa: &SOCKADDR_IN) -> SocketAddr {
    let ip = Ipv4Addr::from(unsafe { u32::from_ne_bytes(sa.sin_addr.S_un.S_addr.to_ne_bytes()) });
    SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sa.sin_port)))
}

pub fn bind(sock: RawSocket, addr: SocketAddr) -> io::Result<()> {
    let sa = to_sockaddr_in(addr);
    let res = unsafe {
        WinSock::bind(
            sock,
            &sa as *const _ as *const WinSock::SOCKADDR,
            mem::size_of::<SOCKADDR_IN>() as i32,
        )
    };
    if res == SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(())
}

pub fn listen(sock: RawSocket, backlog: i32) -> io::Result<()> {
    let res = unsafe { WinSock::listen(sock, backlog) };
    if res == SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(())
}

/// Mirrors the Unix synchronous-connect helper: issues a non-blocking
/// connect and polls via `select` until writable or erred, bounded by
/// `timeout`.
pub fn connect_blocking(sock: RawSocket, addr: SocketAddr, timeout: Duration) -> io::Result<()> {
    let sa = to_sockaddr_in(addr);
    let res = unsafe {
        WinSock::connect(
            sock,
            &sa as *const _ as *const WinSock::SOCKADDR,
            mem::size_of::<SOCKADDR_IN>() as i32,
        )
    };
    if res == 0 {
        return Ok(());
    }
    let err = unsafe { WinSock::WSAGetLastError() };
    if err != WinSock::WSAEWOULDBLOCK {
        return Err(io::Error::from_raw_os_error(err));
    }

    let deadline = Instant::now() + timeout;
    loop {
        if Instant::now() >= deadline {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"));
        }
        let mut write_set: WinSock::FD_SET = unsafe { mem::zeroed() };
        write_set.fd_count = 1;
        write_set.fd_array[0] = sock;
        let mut timeval = WinSock::TIMEVAL {
            tv_sec: 0,
            tv_usec: 100_000,
        };
        let n = unsafe {
            WinSock::select(0, std::ptr::null_mut(), &mut write_set, std::ptr::null_mut(), &mut timeval)
        };
        if n > 0 {
            let mut sockerr: i32 = 0;
            let mut len = mem::size_of::<i32>() as i32;
            unsafe {
                WinSock::getsockopt(
                    sock,
                    SOL_SOCKET as i32,
                    WinSock::SO_ERROR as i32,
                    &mut sockerr as *mut _ as *mut u8,
                    &mut len,
                );
            }
            return if sockerr == 0 {
                Ok(())
            } else {
                Err(io::Error::from_raw_os_error(sockerr))
            };
        }
    }
}

pub fn accept(sock: RawSocket) -> io::Result<(RawSocket, SocketAddr)> {
    let mut sa: SOCKADDR_IN = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<SOCKADDR_IN>() as i32;
    let accepted = unsafe { WinSock::accept(sock, &mut sa as *mut _ as *mut WinSock::SOCKADDR, &mut len) };
    if accepted == INVALID_SOCKET {
        return Err(last_error());
    }
    set_nonblocking(accepted, true)?;
    Ok((accepted, from_sockaddr_in(&sa)))
}

pub fn recv(sock: RawSocket, buf: &mut [u8]) -> io::Result<usize> {
    let n = unsafe { WinSock::recv(sock, buf.as_mut_ptr(), buf.len() as i32, 0) };
    if n == SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(n as usize)
}

pub fn send(sock: RawSocket, buf: &[u8]) -> io::Result<usize> {
    let n = unsafe { WinSock::send(sock, buf.as_ptr(), buf.len() as i32, 0) };
    if n == SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(n as usize)
}

pub fn recvfrom(sock: RawSocket, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
    let mut sa: SOCKADDR_IN = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<SOCKADDR_IN>() as i32;
    let n = unsafe {
        WinSock::recvfrom(
            sock,
            buf.as_mut_ptr(),
            buf.len() as i32,
            0,
            &mut sa as *mut _ as *mut WinSock::SOCKADDR,
            &mut len,
        )
    };
    if n == SOCKET_ERROR {
        return Err(last_error());
    }
    Ok((n as usize, from_sockaddr_in(&sa)))
}

pub fn sendto(sock: RawSocket, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
    let sa = to_sockaddr_in(addr);
    let n = unsafe {
        WinSock::sendto(
            sock,
            buf.as_ptr(),
            buf.len() as i32,
            0,
            &sa as *const _ as *const WinSock::SOCKADDR,
            mem::size_of::<SOCKADDR_IN>() as i32,
        )
    };
    if n == SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(n as usize)
}

pub fn getsockname(sock: RawSocket) -> io::Result<SocketAddr> {
    let mut sa: SOCKADDR_IN = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<SOCKADDR_IN>() as i32;
    let res = unsafe { WinSock::getsockname(sock, &mut sa as *mut _ as *mut WinSock::SOCKADDR, &mut len) };
    if res == SOCKET_ERROR {
        return Err(last_error());
    }
    Ok(from_sockaddr_in(&sa))
}

pub fn shutdown(sock: RawSocket) {
    unsafe {
        WinSock::shutdown(sock, WinSock::SD_BOTH as i32);
    }
}

pub fn close(sock: RawSocket) {
    unsafe {
        WinSock::closesocket(sock);
    }
}
