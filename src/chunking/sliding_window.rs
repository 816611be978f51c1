// Sliding-window fallback chunking: covers source regions no symbol spans
// over, and Markdown files outright. Boundary detection belongs to
// symbols.rs, which runs first and hands this module only the gaps.

#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub start_line: u32,
    pub end_line: u32,
}

/// Splits `[start_line, end_line)` (zero-based, half-open) into windows of
/// up to `size` lines with stride `size`, defaulting to 40.
pub fn windows(start_line: u32, end_line: u32, size: u32) -> Vec<Window> {
    if end_line <= start_line || size == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut cursor = start_line;
    while cursor < end_line {
        let window_end = (cursor + size).min(end_line);
        out.push(Window {
            start_line: cursor,
            end_line: window_end,
        });
        cursor = window_end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_into_fixed_size_windows() {
        let w = windows(0, 100, 40);
        assert_eq!(w.len(), 3);
        assert_eq!(w[0], Window { start_line: 0, end_line: 40 });
        assert_eq!(w[2], Window { start_line: 80, end_line: 100 });
    }

    #[test]
    fn empty_range_yields_no_windows() {
        assert!(windows(10, 10, 40).is_empty());
    }
}
