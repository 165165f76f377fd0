//! Local-time formatting, used only to name rolled-over log files
//! (`<module><yyyymmddhhmmss>.log`). Kept to the one format the logger
//! needs rather than pulling in a general calendar crate, matching this
//! crate's otherwise libc/windows-sys-only dependency footprint.

/// Formats the current local time as `yyyymmddhhmmss`.
pub fn now_yyyymmddhhmmss() -> String {
    let (y, mo, d, h, mi, s) = local_now_fields();
    format!("{y:04}{mo:02}{d:02}{h:02}{mi:02}{s:02}")
}

#[cfg(unix)]
fn local_now_fields() -> (i32, u32, u32, u32, u32, u32) {
    use std::mem::MaybeUninit;
    unsafe {
        let mut t: libc::time_t = 0;
        libc::time(&mut t);
        let mut tm = MaybeUninit::<libc::tm>::zeroed();
        libc::localtime_r(&t, tm.as_mut_ptr());
        let tm = tm.assume_init();
        (
            tm.tm_year + 1900,
            (tm.tm_mon + 1) as u32,
            tm.tm_mday as u32,
            tm.tm_hour as u32,
            tm.tm_min as u32,
            tm.tm_sec as u32,
        )
    }
}

#[cfg(windows)]
fn local_now_fields() -> (i32, u32, u32, u32, u32, u32) {
    use windows_sys::Win32::System::SystemInformation::GetLocalTime;
    use windows_sys::Win32::System::SystemInformation::SYSTEMTIME;
    unsafe {
        let mut st: SYSTEMTIME = std::mem::zeroed();
        GetLocalTime(&mut st);
        (
            st.wYear as i32,
            st.wMonth as u32,
            st.wDay as u32,
            st.wHour as u32,
            st.wMinute as u32,
            st.wSecond as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_fourteen_digits() {
        let s = now_yyyymmddhhmmss();
        assert_eq!(s.len(), 14);
        assert!(s.chars().all(|c| c.is_ascii_digit()));
    }
}
