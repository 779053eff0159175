//! Semantic highlight payloads pushed or returned by the Aya server

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::lsp::Range;

/// Classification of one highlighted occurrence
///
/// The server has sent this both as the enum's name and as its ordinal,
/// so both decode. Anything unrecognised becomes `Unknown` and is never
/// rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    // definitions
    ModuleDef,
    FnDef,
    DataDef,
    StructDef,
    ConDef,
    FieldDef,
    PrimDef,
    // references
    Generalize,
    FnCall,
    DataCall,
    StructCall,
    ConCall,
    FieldCall,
    PrimCall,
    Unknown,
}

impl SymbolKind {
    /// Known kinds in wire ordinal order
    pub const ALL: [SymbolKind; 14] = [
        Self::ModuleDef,
        Self::FnDef,
        Self::DataDef,
        Self::StructDef,
        Self::ConDef,
        Self::FieldDef,
        Self::PrimDef,
        Self::Generalize,
        Self::FnCall,
        Self::DataCall,
        Self::StructCall,
        Self::ConCall,
        Self::FieldCall,
        Self::PrimCall,
    ];

    pub fn from_ordinal(ordinal: u64) -> Self {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .unwrap_or(Self::Unknown)
    }

    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name() == name)
            .unwrap_or(Self::Unknown)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ModuleDef => "ModuleDef",
            Self::FnDef => "FnDef",
            Self::DataDef => "DataDef",
            Self::StructDef => "StructDef",
            Self::ConDef => "ConDef",
            Self::FieldDef => "FieldDef",
            Self::PrimDef => "PrimDef",
            Self::Generalize => "Generalize",
            Self::FnCall => "FnCall",
            Self::DataCall => "DataCall",
            Self::StructCall => "StructCall",
            Self::ConCall => "ConCall",
            Self::FieldCall => "FieldCall",
            Self::PrimCall => "PrimCall",
            Self::Unknown => "Unknown",
        }
    }

    pub fn is_definition(self) -> bool {
        matches!(
            self,
            Self::ModuleDef
                | Self::FnDef
                | Self::DataDef
                | Self::StructDef
                | Self::ConDef
                | Self::FieldDef
                | Self::PrimDef
        )
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for SymbolKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for SymbolKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Ordinal(u64),
            Name(String),
            Other(serde_json::Value),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Ordinal(n) => Self::from_ordinal(n),
            Raw::Name(name) => Self::from_name(&name),
            Raw::Other(_) => Self::Unknown,
        })
    }
}

/// One highlighted region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub range: Range,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn new(range: Range, kind: SymbolKind) -> Self {
        Self { range, kind }
    }
}

/// Highlight payload for one document (`aya/load` result or
/// `aya/publishSyntaxHighlight` params)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightResult {
    pub uri: String,
    #[serde(default)]
    pub symbols: Vec<Symbol>,
}
