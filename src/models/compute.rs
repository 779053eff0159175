//! Point computations (`aya/computeType`, `aya/computeNF`)

use serde::{Deserialize, Serialize};

use super::lsp::{Position, Range};

/// Request params shared by both point computations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeTermParams {
    pub uri: String,
    pub position: Position,
}

/// Computed term or type for the expression under a position
///
/// Older servers answered `aya/computeType` with `computedType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeTermResult {
    pub uri: String,
    #[serde(alias = "computedType")]
    pub computed: String,
    pub range: Range,
}
