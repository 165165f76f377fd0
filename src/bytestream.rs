//! A growable binary buffer with independent read/write cursors and a
//! configurable byte order, used as the wire-format codec for this crate's
//! sockets (and available standalone for anything else that wants it).

use crate::byteorder::ByteOrder;
use crate::error::{Error, Result};

/// Buffer capacity is grown in increments of at least 1024 bytes, or 1/16th
/// of the current capacity, whichever is larger -- matching the configured
/// growth policy.
const MIN_GROWTH: usize = 1024;

/// A growable, cursor-addressed binary buffer.
///
/// `ByteStream` tracks two cursors into the same backing `Vec<u8>`: a write
/// cursor (`wpos`, the high-water mark of bytes actually written) and a read
/// cursor (`rpos`, which must never pass `wpos`). Typed `put_*`/`get_*`
/// methods honor `order()` and swap on every access when it is
/// [`ByteOrder::Network`].
#[derive(Debug, Clone)]
pub struct ByteStream {
    buf: Vec<u8>,
    rpos: usize,
    wpos: usize,
    order: ByteOrder,
}

impl Default for ByteStream {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteStream {
    /// Creates an empty stream in host byte order.
    pub fn new() -> Self {
        ByteStream {
            buf: Vec::new(),
            rpos: 0,
            wpos: 0,
            order: ByteOrder::Host,
        }
    }

    /// Creates an empty stream with `capacity` bytes pre-reserved.
    pub fn with_capacity(capacity: usize) -> Self {
        ByteStream {
            buf: Vec::with_capacity(capacity),
            rpos: 0,
            wpos: 0,
            order: ByteOrder::Host,
        }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn set_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    /// Number of unread bytes (`wpos - rpos`).
    pub fn remaining(&self) -> usize {
        self.wpos - self.rpos
    }

    /// Current read cursor.
    pub fn rpos(&self) -> usize {
        self.rpos
    }

    /// Current write cursor -- also the logical length of the stream.
    pub fn wpos(&self) -> usize {
        self.wpos
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// The written bytes, `[0, wpos)`.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.wpos]
    }

    /// The unread bytes, `[rpos, wpos)`.
    pub fn unread_slice(&self) -> &[u8] {
        &self.buf[self.rpos..self.wpos]
    }

    /// Ensures capacity for at least `n` total bytes, growing by the
    /// documented policy: `max(n, old + 1024, old + old / 16)`.
    pub fn reserve(&mut self, n: usize) {
        let old = self.buf.capacity();
        if n <= old {
            return;
        }
        let grown = old.max(n).max(old + MIN_GROWTH).max(old + old / 16);
        self.buf.reserve(grown - self.buf.len());
        debug_assert!(self.buf.capacity() >= grown || self.buf.capacity() >= n);
    }

    /// Moves the read cursor to an absolute position. Fails with
    /// [`Error::AccessViolation`] if `pos` would pass the write cursor.
    pub fn set_rpos(&mut self, pos: usize) -> Result<()> {
        if pos > self.wpos {
            return Err(Error::AccessViolation);
        }
        self.rpos = pos;
        Ok(())
    }

    /// Compacts the buffer by dropping already-read bytes: shifts
    /// `[rpos, wpos)` down to `[0, wpos - rpos)`, resets `rpos` to zero and
    /// `wpos` to the prior unread length.
    pub fn truncate_left(&mut self) {
        if self.rpos == 0 {
            return;
        }
        self.buf.copy_within(self.rpos..self.wpos, 0);
        self.wpos -= self.rpos;
        self.buf.truncate(self.wpos);
        self.rpos = 0;
    }

    /// Appends raw bytes, growing as needed.
    pub fn append_bytes(&mut self, data: &[u8]) {
        self.reserve(self.wpos + data.len());
        if self.buf.len() < self.wpos + data.len() {
            self.buf.resize(self.wpos + data.len(), 0);
        }
        self.buf[self.wpos..self.wpos + data.len()].copy_from_slice(data);
        self.wpos += data.len();
    }

    /// Appends a UTF-8 string's raw bytes (no terminator). Fails with
    /// [`Error::NullPointer`] if `s` is `None`, for interface parity with
    /// the original `operator<<(const char*)` overload.
    pub fn append_str(&mut self, s: Option<&str>) -> Result<()> {
        match s {
            None => Err(Error::NullPointer),
            Some(s) => {
                self.append_bytes(s.as_bytes());
                Ok(())
            }
        }
    }

    /// Appends another stream's unread bytes.
    pub fn append_stream(&mut self, other: &ByteStream) {
        let bytes = other.unread_slice().to_vec();
        self.append_bytes(&bytes);
    }

    /// Writes a zero-terminated string: raw bytes followed by a `0u8`.
    pub fn put_cstr(&mut self, s: Option<&str>) -> Result<()> {
        self.append_str(s)?;
        self.append_bytes(&[0u8]);
        Ok(())
    }

    /// Reads a zero-terminated string starting at the read cursor, advancing
    /// past the terminator. Fails with [`Error::AccessViolation`] if no
    /// terminator is found before `wpos`.
    pub fn get_cstr(&mut self) -> Result<String> {
        let start = self.rpos;
        let slice = &self.buf[start..self.wpos];
        let nul = slice
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::AccessViolation)?;
        let s = String::from_utf8_lossy(&slice[..nul]).into_owned();
        self.rpos = start + nul + 1;
        Ok(s)
    }

    fn ensure_readable(&self, n: usize) -> Result<()> {
        if self.rpos + n > self.wpos {
            return Err(Error::AccessViolation);
        }
        Ok(())
    }
}

macro_rules! typed_put_get {
    ($put:ident, $get:ident, $ty:ty) => {
        impl ByteStream {
            #[doc = concat!("Writes a `", stringify!($ty), "` honoring `order()`.")]
            pub fn $put(&mut self, v: $ty) {
                let bytes = match self.order {
                    ByteOrder::Host => v.to_ne_bytes(),
                    ByteOrder::Network => v.to_be_bytes(),
                };
                self.append_bytes(&bytes);
            }

            #[doc = concat!("Reads a `", stringify!($ty), "` honoring `order()`.")]
            pub fn $get(&mut self) -> Result<$ty> {
                const N: usize = std::mem::size_of::<$ty>();
                self.ensure_readable(N)?;
                let mut raw = [0u8; N];
                raw.copy_from_slice(&self.buf[self.rpos..self.rpos + N]);
                self.rpos += N;
                Ok(match self.order {
                    ByteOrder::Host => <$ty>::from_ne_bytes(raw),
                    ByteOrder::Network => <$ty>::from_be_bytes(raw),
                })
            }
        }
    };
}

typed_put_get!(put_i8, get_i8, i8);
typed_put_get!(put_u8, get_u8, u8);
typed_put_get!(put_i16, get_i16, i16);
typed_put_get!(put_u16, get_u16, u16);
typed_put_get!(put_i32, get_i32, i32);
typed_put_get!(put_u32, get_u32, u32);
typed_put_get!(put_i64, get_i64, i64);
typed_put_get!(put_u64, get_u64, u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_all_widths_both_orders() {
        for order in [ByteOrder::Host, ByteOrder::Network] {
            let mut s = ByteStream::new();
            s.set_order(order);
            s.put_i8(-12);
            s.put_u8(200);
            s.put_i16(-1234);
            s.put_u16(54321);
            s.put_i32(-123_456_789);
            s.put_u32(0xDEAD_BEEF);
            s.put_i64(-1);
            s.put_u64(u64::MAX);

            assert_eq!(s.get_i8().unwrap(), -12);
            assert_eq!(s.get_u8().unwrap(), 200);
            assert_eq!(s.get_i16().unwrap(), -1234);
            assert_eq!(s.get_u16().unwrap(), 54321);
            assert_eq!(s.get_i32().unwrap(), -123_456_789);
            assert_eq!(s.get_u32().unwrap(), 0xDEAD_BEEF);
            assert_eq!(s.get_i64().unwrap(), -1);
            assert_eq!(s.get_u64().unwrap(), u64::MAX);
        }
    }

    #[test]
    fn network_order_is_big_endian_on_wire() {
        let mut s = ByteStream::new();
        s.set_order(ByteOrder::Network);
        s.put_u32(0x0102_0304);
        assert_eq!(s.as_slice(), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn host_order_is_native_on_wire() {
        let mut s = ByteStream::new();
        s.set_order(ByteOrder::Host);
        s.put_u32(0x0102_0304);
        assert_eq!(s.as_slice(), &0x0102_0304u32.to_ne_bytes());
    }

    #[test]
    fn over_read_is_access_violation() {
        let mut s = ByteStream::new();
        s.put_u8(1);
        assert!(s.get_u8().is_ok());
        assert!(matches!(s.get_u8(), Err(Error::AccessViolation)));
    }

    #[test]
    fn set_rpos_past_wpos_fails() {
        let mut s = ByteStream::new();
        s.put_u8(1);
        assert!(matches!(s.set_rpos(5), Err(Error::AccessViolation)));
        assert!(s.set_rpos(1).is_ok());
    }

    #[test]
    fn truncate_left_compacts() {
        let mut s = ByteStream::new();
        s.append_bytes(b"hello world");
        s.set_rpos(6).unwrap();
        s.truncate_left();
        assert_eq!(s.rpos(), 0);
        assert_eq!(s.as_slice(), b"world");
    }

    #[test]
    fn cstr_round_trip() {
        let mut s = ByteStream::new();
        s.put_cstr(Some("hi")).unwrap();
        s.put_u8(42);
        assert_eq!(s.get_cstr().unwrap(), "hi");
        assert_eq!(s.get_u8().unwrap(), 42);
    }

    #[test]
    fn null_str_is_null_pointer_error() {
        let mut s = ByteStream::new();
        assert!(matches!(s.append_str(None), Err(Error::NullPointer)));
    }

    #[test]
    fn reserve_growth_policy() {
        let mut s = ByteStream::new();
        s.reserve(10);
        let after_small = s.capacity();
        assert!(after_small >= 10);
        let old = s.capacity();
        s.reserve(old + 1);
        assert!(s.capacity() >= old + MIN_GROWTH || s.capacity() >= old + old / 16);
    }
}
