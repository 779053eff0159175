//! `file:line[:column]` arguments
//!
//! Lines and columns are 1-indexed on the command line and converted to
//! 0-indexed LSP positions.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::models::lsp::Position;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLocation {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl ParsedLocation {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            bail!("Location cannot be empty");
        }

        let (file, rest) = split_position(input)?;
        let mut parts = rest.splitn(2, ':');
        let line = parse_index(parts.next().unwrap_or_default(), "line")?;
        let column = match parts.next() {
            Some(col) => parse_index(col, "column")?,
            None => 1,
        };

        Ok(Self {
            file: PathBuf::from(file),
            line,
            column,
        })
    }

    pub fn position(&self) -> Position {
        Position::from_cli(self.line, self.column)
    }

    /// Resolve relative to the current directory and check the file exists
    pub fn to_absolute(&self) -> Result<Self> {
        let file = if self.file.is_absolute() {
            self.file.clone()
        } else {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(&self.file)
        };
        let file = file
            .canonicalize()
            .with_context(|| format!("File not found: {}", file.display()))?;
        Ok(Self { file, ..*self })
    }
}

/// Split at the first `:` followed by a digit or `-`, skipping a Windows
/// drive prefix
fn split_position(input: &str) -> Result<(&str, &str)> {
    let bytes = input.as_bytes();
    let skip = if bytes.len() > 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        2
    } else {
        0
    };

    let split = input[skip..]
        .char_indices()
        .map(|(i, _)| i + skip)
        .find(|&i| {
            bytes[i] == b':'
                && bytes
                    .get(i + 1)
                    .is_some_and(|b| b.is_ascii_digit() || *b == b'-')
        });

    let Some(split) = split else {
        bail!("Invalid location format. Expected: file:line[:column]\nExample: src/Main.aya:10:5")
    };
    if bytes.get(split + 1) == Some(&b'-') {
        bail!("Invalid line number: negative values not allowed (1-indexed)")
    }
    Ok((&input[..split], &input[split + 1..]))
}

fn parse_index(raw: &str, what: &str) -> Result<u32> {
    let value: u32 = raw
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid {} number '{}': must be a positive integer", what, raw))?;
    if value == 0 {
        bail!("{} number must be >= 1 (got 0)", what);
    }
    Ok(value)
}

impl std::fmt::Display for ParsedLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}
