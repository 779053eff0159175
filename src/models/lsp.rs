//! LSP Common Types
//!
//! Positions, ranges and `file://` URI helpers shared by the session,
//! the highlight engine and the CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ============================================================================
// Core LSP Types
// ============================================================================

/// Position within a document (0-indexed, LSP standard)
///
/// Field order makes the derived `Ord` lexicographic (line, then character).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }

    /// Convert 1-indexed CLI input to 0-indexed LSP position
    pub fn from_cli(line: u32, column: u32) -> Self {
        Self {
            line: line.saturating_sub(1),
            character: column.saturating_sub(1),
        }
    }

    /// Convert 0-indexed LSP position to 1-indexed display position
    pub fn to_display(&self) -> (u32, u32) {
        (self.line + 1, self.character + 1)
    }
}

/// Range within a document, end exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// Shorthand for `(start_line, start_col)-(end_line, end_col)`
    pub fn from_coords(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start: Position::new(start_line, start_col),
            end: Position::new(end_line, end_col),
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.start <= self.end
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},{})-({},{})",
            self.start.line, self.start.character, self.end.line, self.end.character
        )
    }
}

// ============================================================================
// URI Utilities
// ============================================================================

/// Convert file path to RFC 3986 compliant file:// URI
pub fn path_to_uri(path: &Path) -> String {
    let abs_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    };

    let path_str = abs_path.to_string_lossy();
    let encoded: String = path_str
        .chars()
        .map(|c| match c {
            '/' | '.' | '-' | '_' | '~' => c.to_string(),
            c if c.is_ascii_alphanumeric() => c.to_string(),
            c => {
                let mut buf = [0u8; 4];
                c.encode_utf8(&mut buf)
                    .bytes()
                    .map(|b| format!("%{:02X}", b))
                    .collect()
            }
        })
        .collect();

    format!("file://{encoded}")
}

/// Convert file:// URI to PathBuf with full percent-decoding
pub fn uri_to_path(uri: &str) -> PathBuf {
    let path = match uri.strip_prefix("file://") {
        Some(p) => p,
        None => {
            tracing::warn!("Invalid file URI (missing file:// prefix): {}", uri);
            return PathBuf::from(uri);
        }
    };

    // Windows: file:///C:/path → C:/path
    #[cfg(windows)]
    let path = path.strip_prefix('/').unwrap_or(path);

    PathBuf::from(percent_decode(path))
}

fn percent_decode(input: &str) -> String {
    let mut result = Vec::with_capacity(input.len());
    let mut bytes = input.bytes();

    while let Some(byte) = bytes.next() {
        if byte == b'%' {
            let high = bytes.next().and_then(hex_value);
            let low = bytes.next().and_then(hex_value);
            if let (Some(h), Some(l)) = (high, low) {
                result.push((h << 4) | l);
                continue;
            }
        }
        result.push(byte);
    }

    String::from_utf8_lossy(&result).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_from_cli() {
        let pos = Position::from_cli(10, 5);
        assert_eq!(pos.line, 9);
        assert_eq!(pos.character, 4);
    }

    #[test]
    fn test_position_ordering_is_lexicographic() {
        assert!(Position::new(0, 9) < Position::new(1, 0));
        assert!(Position::new(2, 3) < Position::new(2, 4));
        assert!(Range::from_coords(0, 0, 0, 5).is_well_formed());
        assert!(!Range::from_coords(1, 0, 0, 5).is_well_formed());
    }

    #[test]
    fn test_range_wire_shape() {
        let json = r#"{"start":{"line":0,"character":0},"end":{"line":0,"character":5}}"#;
        let range: Range = serde_json::from_str(json).unwrap();
        assert_eq!(range, Range::from_coords(0, 0, 0, 5));
        assert_eq!(range.to_string(), "(0,0)-(0,5)");
    }

    #[test]
    fn test_uri_roundtrip_simple() {
        let path = PathBuf::from("/test/file.aya");
        let uri = path_to_uri(&path);
        assert_eq!(uri, "file:///test/file.aya");
        assert_eq!(uri_to_path(&uri), path);
    }

    #[test]
    fn test_uri_with_spaces() {
        let path = PathBuf::from("/path with spaces/file.aya");
        let uri = path_to_uri(&path);
        assert!(uri.contains("%20"));
        assert_eq!(uri_to_path(&uri), path);
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("hello%20world"), "hello world");
        assert_eq!(percent_decode("test%2Fpath"), "test/path");
        assert_eq!(percent_decode("normal"), "normal");
    }
}
