//! Locates the exported API region inside the host header.

use crate::error::{Error, Result};

/// The part of the header following the sentinel marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRegion<'a> {
    /// Header text starting at the sentinel.
    pub text: &'a str,
    /// Header line (1-based) on which [`Self::text`] starts.
    pub first_line: usize,
}

impl ScanRegion<'_> {
    /// Converts a byte offset into [`Self::text`] to a header line number.
    #[must_use]
    pub fn line_at(&self, offset: usize) -> usize {
        self.first_line + self.text[..offset].matches('\n').count()
    }
}

/// Returns the slice of `header` starting at the first occurrence of
/// `sentinel`.
///
/// # Errors
///
/// Returns [`Error::SentinelNotFound`] if the sentinel does not occur.
pub fn scan<'a>(header: &'a str, sentinel: &str) -> Result<ScanRegion<'a>> {
    let start = header
        .find(sentinel)
        .ok_or_else(|| Error::SentinelNotFound {
            sentinel: sentinel.to_string(),
        })?;
    Ok(ScanRegion {
        text: &header[start..],
        first_line: 1 + header[..start].matches('\n').count(),
    })
}
