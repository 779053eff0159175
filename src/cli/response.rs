//! Response types for CLI output
//!
//! Positions are printed 1-indexed, the way they are typed on the command
//! line.

use serde::Serialize;

use crate::editor::RenderedDecoration;
use crate::highlight::style::FontWeight;
use crate::models::compute::ComputeTermResult;
use crate::models::lsp::Range;

/// 1-indexed span, end exclusive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanOutput {
    pub start: [u32; 2],
    pub end: [u32; 2],
}

impl From<Range> for SpanOutput {
    fn from(range: Range) -> Self {
        let (sl, sc) = range.start.to_display();
        let (el, ec) = range.end.to_display();
        Self {
            start: [sl, sc],
            end: [el, ec],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DecorationOutput {
    pub token_type: &'static str,
    #[serde(skip_serializing_if = "no_modifiers")]
    pub modifiers: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hover: Option<String>,
    pub ranges: Vec<SpanOutput>,
}

impl From<RenderedDecoration> for DecorationOutput {
    fn from(decoration: RenderedDecoration) -> Self {
        let style = decoration.style;
        Self {
            token_type: style.token_type,
            modifiers: style.modifiers,
            color: style.color,
            bold: style.weight == FontWeight::Bold,
            italic: style.italic,
            hover: decoration.hover,
            ranges: decoration.ranges.into_iter().map(SpanOutput::from).collect(),
        }
    }
}

fn no_modifiers(modifiers: &&[&str]) -> bool {
    modifiers.is_empty()
}

#[derive(Debug, Serialize)]
pub struct LoadResponse {
    pub file: String,
    pub mode: &'static str,
    pub symbols: usize,
    pub decorations: Vec<DecorationOutput>,
}

#[derive(Debug, Serialize)]
pub struct ComputeResponse {
    pub file: String,
    pub kind: &'static str,
    pub computed: String,
    pub range: SpanOutput,
}

impl ComputeResponse {
    pub fn new(file: String, kind: &'static str, result: ComputeTermResult) -> Self {
        Self {
            file,
            kind,
            computed: result.computed,
            range: result.range.into(),
        }
    }
}
