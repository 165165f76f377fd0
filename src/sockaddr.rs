//! Address parsing for the dotted-quad / `"*"` / null-hostname syntax used
//! by the TCP/UDP façades, kept in one place instead of repeated across
//! `net::tcp_server`, `net::tcp_client`, and `net::udp_peer`.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

use crate::error::{Error, Result};

/// An IPv4 socket address accepting the toolkit's host-string conventions:
/// a dotted quad, the literal `"*"` for `INADDR_ANY`, or `None` for "the
/// local hostname's first resolved address, or `127.0.0.1` on failure".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SockAddr(SocketAddrV4);

impl SockAddr {
    /// Resolves `host` (per the conventions above) and `port` into a
    /// [`SockAddr`].
    pub fn resolve(host: Option<&str>, port: u16) -> Result<SockAddr> {
        let ip = match host {
            None => local_ipv4().unwrap_or(Ipv4Addr::LOCALHOST),
            Some("*") => Ipv4Addr::UNSPECIFIED,
            Some(other) => Ipv4Addr::from_str(other)
                .map_err(|_| Error::InvalidParameter("host is not a dotted-quad IPv4 address"))?,
        };
        Ok(SockAddr(SocketAddrV4::new(ip, port)))
    }

    pub fn into_socket_addr(self) -> SocketAddr {
        SocketAddr::V4(self.0)
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }

    pub fn ip(&self) -> Ipv4Addr {
        *self.0.ip()
    }
}

impl From<SocketAddrV4> for SockAddr {
    fn from(addr: SocketAddrV4) -> Self {
        SockAddr(addr)
    }
}

impl From<SockAddr> for SocketAddr {
    fn from(addr: SockAddr) -> Self {
        addr.into_socket_addr()
    }
}

impl TryFrom<SocketAddr> for SockAddr {
    type Error = Error;

    fn try_from(addr: SocketAddr) -> Result<Self> {
        match addr {
            SocketAddr::V4(v4) => Ok(SockAddr(v4)),
            SocketAddr::V6(_) => Err(Error::InvalidParameter("completio only supports IPv4")),
        }
    }
}

impl fmt::Display for SockAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.ip() == &Ipv4Addr::UNSPECIFIED {
            write!(f, "*:{}", self.0.port())
        } else {
            write!(f, "{}:{}", self.0.ip(), self.0.port())
        }
    }
}

impl FromStr for SockAddr {
    type Err = Error;

    /// Parses `host:port`, where `host` follows the conventions documented
    /// on [`SockAddr::resolve`] (`"*"` for any-interface; the hostname
    /// segment may not be empty — use `SockAddr::resolve(None, port)` for
    /// the "local hostname" fallback).
    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or(Error::InvalidParameter("address missing ':port'"))?;
        let port: u16 = port
            .parse()
            .map_err(|_| Error::InvalidParameter("address port is not a valid u16"))?;
        Self::resolve(Some(host), port)
    }
}

fn local_ipv4() -> Option<Ipv4Addr> {
    let hostname = hostname()?;
    use std::net::ToSocketAddrs;
    (hostname.as_str(), 0u16)
        .to_socket_addrs()
        .ok()?
        .find_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(*v4.ip()),
            SocketAddr::V6(_) => None,
        })
}

#[cfg(unix)]
fn hostname() -> Option<String> {
    let mut buf = vec![0u8; 256];
    let res = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if res != 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8(buf[..end].to_vec()).ok()
}

#[cfg(windows)]
fn hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_resolves_to_any_interface() {
        let addr = SockAddr::resolve(Some("*"), 17011).unwrap();
        assert_eq!(addr.ip(), Ipv4Addr::UNSPECIFIED);
        assert_eq!(addr.port(), 17011);
    }

    #[test]
    fn dotted_quad_round_trips() {
        let addr = SockAddr::resolve(Some("127.0.0.1"), 9000).unwrap();
        assert_eq!(addr.ip(), Ipv4Addr::LOCALHOST);
        assert_eq!(addr.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn invalid_host_is_rejected() {
        assert!(SockAddr::resolve(Some("not-an-ip"), 1).is_err());
    }

    #[test]
    fn from_str_parses_host_and_port() {
        let addr: SockAddr = "*:17012".parse().unwrap();
        assert_eq!(addr.port(), 17012);
    }

    #[test]
    fn display_renders_star_for_unspecified() {
        let addr = SockAddr::resolve(Some("*"), 80).unwrap();
        assert_eq!(addr.to_string(), "*:80");
    }
}
