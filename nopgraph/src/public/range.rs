// This file is part of the product NoPressure.
// SPDX-FileCopyrightText: 2025-2026 Zivatar Limited
// SPDX-License-Identifier: AGPL-3.0-or-later
// The code and documentation in this repository is licensed under the GNU Affero General Public License v3.0 or later (AGPL-3.0-or-later). See LICENSE.

//! Single byte-range delivery for file resources.
//!
//! Only `bytes=<start>-<end>` with a required start is understood. Anything
//! else, including ranges that cannot be satisfied, is answered with the full
//! file rather than `416 Range Not Satisfiable`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeStatus {
    Full,
    Partial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
    pub status: RangeStatus,
}

impl ByteRange {
    pub fn full(total: u64) -> Self {
        Self {
            start: 0,
            end: total.saturating_sub(1),
            total,
            status: RangeStatus::Full,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.status == RangeStatus::Partial
    }

    /// Number of bytes the response body carries.
    pub fn len(&self) -> u64 {
        match self.status {
            RangeStatus::Full => self.total,
            RangeStatus::Partial => self.end - self.start + 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn content_range(&self) -> String {
        format_content_range_header(self.start, self.end, self.total)
    }
}

/// Computes the byte window for a `Range` header value against a file of
/// `total` bytes.
pub fn parse_range(range_header: Option<&str>, total: u64) -> ByteRange {
    let Some(header) = range_header else {
        return ByteRange::full(total);
    };
    let bounds = parse_range_header(header)
        .and_then(|(start, end)| calculate_range_bounds(start, end, total));
    match bounds {
        Some((start, end)) => ByteRange {
            start,
            end,
            total,
            status: RangeStatus::Partial,
        },
        None => {
            log::debug!("Ignoring range '{}' for {} bytes", header, total);
            ByteRange::full(total)
        }
    }
}

/// Splits `bytes=<start>-<end>` into its bounds. The end may be omitted.
fn parse_range_header(range_header: &str) -> Option<(u64, Option<u64>)> {
    let ranges = range_header.trim().strip_prefix("bytes=")?;
    let (start_str, end_str) = ranges.split_once('-')?;
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    if start_str.is_empty() || !start_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let start = start_str.parse::<u64>().ok()?;

    if end_str.is_empty() {
        return Some((start, None));
    }
    if !end_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((start, Some(end_str.parse::<u64>().ok()?)))
}

fn calculate_range_bounds(start: u64, end: Option<u64>, total: u64) -> Option<(u64, u64)> {
    if total == 0 {
        return None;
    }
    let last_pos = total - 1;
    let end = end.unwrap_or(last_pos).min(last_pos);
    if start > end {
        return None;
    }
    Some((start, end))
}

pub fn format_content_range_header(start: u64, end: u64, total_size: u64) -> String {
    format!("bytes {}-{}/{}", start, end, total_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_range_is_partial() {
        let range = parse_range(Some("bytes=100-199"), 1000);
        assert_eq!(range.status, RangeStatus::Partial);
        assert_eq!((range.start, range.end), (100, 199));
        assert_eq!(range.len(), 100);
        assert_eq!(range.content_range(), "bytes 100-199/1000");
    }

    #[test]
    fn open_end_runs_to_last_byte() {
        let range = parse_range(Some("bytes=900-"), 1000);
        assert_eq!((range.start, range.end), (900, 999));
        assert_eq!(range.len(), 100);
    }

    #[test]
    fn end_is_clamped_to_file_size() {
        let range = parse_range(Some("bytes=990-5000"), 1000);
        assert_eq!((range.start, range.end), (990, 999));
        assert!(range.is_partial());
    }

    #[test]
    fn suffix_and_malformed_ranges_fall_back_to_full() {
        for header in [
            "bytes=-50",
            "bytes=abc-10",
            "items=0-10",
            "bytes=200-100",
            "bytes=1000-",
            "bytes=0-1,5-6",
            "",
        ] {
            let range = parse_range(Some(header), 1000);
            assert_eq!(range.status, RangeStatus::Full, "header {:?}", header);
            assert_eq!(range.len(), 1000);
        }
    }

    #[test]
    fn missing_header_and_empty_file_are_full() {
        assert_eq!(parse_range(None, 10), ByteRange::full(10));
        let empty = parse_range(Some("bytes=0-"), 0);
        assert_eq!(empty.status, RangeStatus::Full);
        assert!(empty.is_empty());
    }
}
