//! Binary scanning module for locating marker-delimited resources.
//!
//! ## Layout
//!
//! Each embedded resource looks like this in the source blob:
//!
//! ```text
//! ... | marker (4) | length (u32 BE) | payload (length - 4) | ...
//!                  ^--------------- chunk ----------------^
//! ```
//!
//! The marker only locates the resource; the chunk handed back to callers
//! starts at the length field, which counts itself.
//!
//! ## Scanning
//!
//! [`find_next`] performs a plain byte-by-byte search and returns the offset
//! just past the marker. [`read_chunk`] then decodes and bounds-checks the
//! length field at that offset.

mod chunk;

use crate::error::Error;
use std::fmt;

pub use chunk::{read_chunk, Chunk, LENGTH_FIELD_LEN};

/// Length of every marker in bytes
pub const MARKER_LEN: usize = 4;

/// Four-byte sequence announcing the start of a resource
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Marker([u8; MARKER_LEN]);

impl Marker {
    /// Apple Icon Image marker (`icns`)
    pub const ICNS: Marker = Marker(*b"icns");

    /// Creates a marker from exactly four bytes
    pub const fn new(bytes: [u8; MARKER_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw marker bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Default for Marker {
    fn default() -> Self {
        Self::ICNS
    }
}

impl TryFrom<&[u8]> for Marker {
    type Error = Error;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        <[u8; MARKER_LEN]>::try_from(value)
            .map(Self)
            .map_err(|_| Error::InvalidMarker { len: value.len() })
    }
}

impl std::str::FromStr for Marker {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.as_bytes())
    }
}

impl fmt::Debug for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Marker({})", self)
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(|b| b.is_ascii_graphic()) {
            self.0.iter().try_for_each(|&b| write!(f, "{}", b as char))
        } else {
            write!(f, "{}", hex_preview(&self.0))
        }
    }
}

/// Finds the next marker at or after `start_pos`.
///
/// Returns the offset of the first byte following the marker, or `None` when
/// no complete marker occurs before the end of `buffer`. A `start_pos` past the
/// end of the buffer is not an error and simply finds nothing.
pub fn find_next(buffer: &[u8], start_pos: usize, marker: &Marker) -> Option<usize> {
    let haystack = buffer.get(start_pos..)?;
    find_subsequence(haystack, marker.as_bytes()).map(|pos| start_pos + pos + MARKER_LEN)
}

/// Find a subsequence within a byte slice
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Renders bytes as space-separated lowercase hex, e.g. `69 63 6e 73`
pub fn hex_preview(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
