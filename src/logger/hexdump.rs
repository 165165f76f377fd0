use std::fmt::Write as _;

/// Maximum number of bytes a single `hex_dump` call will render, regardless
/// of how much data is passed in.
pub const MAX_LOG_INFO_SIZE: usize = 8192;

/// Formats `data` (truncated to [`MAX_LOG_INFO_SIZE`] bytes) as a sequence
/// of hex-dump lines, `bytes_per_line` bytes per line, with an extra space
/// between byte pairs when `spaced` is set.
pub(super) fn format(data: &[u8], bytes_per_line: usize, spaced: bool) -> Vec<String> {
    let bytes_per_line = bytes_per_line.max(1);
    let data = &data[..data.len().min(MAX_LOG_INFO_SIZE)];

    data.chunks(bytes_per_line)
        .enumerate()
        .map(|(i, chunk)| {
            let offset = i * bytes_per_line;
            let mut line = format!("{offset:08x}  ");
            for (j, byte) in chunk.iter().enumerate() {
                let _ = write!(line, "{byte:02x}");
                if spaced && j + 1 != chunk.len() {
                    line.push(' ');
                }
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_into_requested_line_width() {
        let data = [0u8, 1, 2, 3, 4, 5, 6, 7];
        let lines = format(&data, 4, false);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("00010203"));
        assert!(lines[1].ends_with("04050607"));
    }

    #[test]
    fn truncates_to_max_log_info_size() {
        let data = vec![0xAB; MAX_LOG_INFO_SIZE + 100];
        let lines = format(&data, 16, false);
        let total_hex_chars: usize = lines.iter().map(|l| l.len() - 10).sum();
        assert_eq!(total_hex_chars / 2, MAX_LOG_INFO_SIZE);
    }

    #[test]
    fn spacing_inserts_separators() {
        let data = [1u8, 2, 3];
        let lines = format(&data, 3, true);
        assert_eq!(lines[0], "00000000  01 02 03");
    }
}
