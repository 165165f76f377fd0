//! Documentation of the crate's Cargo features. This module carries no
//! code of its own; it exists only so `cargo doc` has somewhere to
//! describe what each feature flag turns on, mirroring the
//! `mio::features` convention this crate's `Cargo.toml` already points at.
//!
//! # `net`
//!
//! Enables [`crate::net`]: `TcpServer`, `TcpClient`, `UdpPeer`, their
//! shared `Config`, and the `TcpHandler`/`UdpHandler` callback traits.
//! Pulls in `os-poll` since the façades need a working reactor.
//!
//! # `os-poll`
//!
//! Enables [`crate::reactor`] (the completion/readiness multiplexer) and
//! [`crate::io`] (the `IoContext`/`SocketContext` pools it schedules
//! through), along with [`crate::sys`]'s platform socket calls. Useful to
//! disable on its own when only the non-I/O utilities — byte stream,
//! event, mutex, timer, work queue — are wanted, e.g. embedding this
//! crate's primitives in a context that brings its own socket layer.
//!
//! # `logger`
//!
//! Enables [`crate::logger`], the leveled file+console sink applications
//! use for their own output. Independent of the `log`-crate diagnostic
//! instrumentation this crate emits internally, which has no feature
//! gate and is always present.
