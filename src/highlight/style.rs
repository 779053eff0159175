//! Symbol kind → presentation table
//!
//! Token types and modifiers follow the LSP semantic token legend; colours
//! follow the Emacs aya-mode palette. Definitions are bold.

use serde::Serialize;

use crate::models::highlight::SymbolKind;

pub const TOKEN_TYPES: [&str; 7] = [
    "namespace",
    "function",
    "enum",
    "struct",
    "enumMember",
    "property",
    "typeParameter",
];
pub const TOKEN_MODIFIERS: [&str; 2] = ["definition", "defaultLibrary"];

const FN_COLOR: &str = "#005DAC";
const DATA_COLOR: &str = "#218C21";
const CON_COLOR: &str = "#A021EF";
const COMPUTED_BORDER: &str = "#66f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Normal,
    Bold,
}

/// How one class of decoration is painted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DecorationStyle {
    pub token_type: &'static str,
    pub modifiers: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
    pub weight: FontWeight,
    pub italic: bool,
    /// Bottom border colour, used for computed-term markers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<&'static str>,
}

impl DecorationStyle {
    const fn token(token_type: &'static str, modifiers: &'static [&'static str]) -> Self {
        Self {
            token_type,
            modifiers,
            color: None,
            weight: FontWeight::Normal,
            italic: false,
            underline: None,
        }
    }

    const fn color(mut self, color: &'static str) -> Self {
        self.color = Some(color);
        self
    }

    const fn bold(mut self) -> Self {
        self.weight = FontWeight::Bold;
        self
    }

    const fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    /// Underline marker for a computed type or normal form
    pub const fn computed() -> Self {
        Self {
            token_type: "computed",
            modifiers: &[],
            color: None,
            weight: FontWeight::Normal,
            italic: false,
            underline: Some(COMPUTED_BORDER),
        }
    }
}

const DEF: &[&str] = &["definition"];
const PRIM_DEF: &[&str] = &["definition", "defaultLibrary"];
const PRIM: &[&str] = &["defaultLibrary"];

/// Presentation for `kind`, `None` for kinds that are never painted
pub fn style_for(kind: SymbolKind) -> Option<DecorationStyle> {
    use DecorationStyle as S;

    let style = match kind {
        SymbolKind::ModuleDef => S::token("namespace", DEF).bold(),
        SymbolKind::FnDef => S::token("function", DEF).color(FN_COLOR).bold(),
        SymbolKind::PrimDef => S::token("function", PRIM_DEF).color(FN_COLOR).bold(),
        SymbolKind::DataDef => S::token("enum", DEF).color(DATA_COLOR).bold(),
        SymbolKind::StructDef => S::token("struct", DEF).color(DATA_COLOR).bold(),
        SymbolKind::ConDef => S::token("enumMember", DEF).color(CON_COLOR).bold(),
        SymbolKind::FieldDef => S::token("property", DEF).color(CON_COLOR).bold(),

        SymbolKind::Generalize => S::token("typeParameter", &[]).italic(),
        SymbolKind::FnCall => S::token("function", &[]).color(FN_COLOR),
        SymbolKind::PrimCall => S::token("function", PRIM).color(FN_COLOR),
        SymbolKind::DataCall => S::token("enum", &[]).color(DATA_COLOR),
        SymbolKind::StructCall => S::token("struct", &[]).color(DATA_COLOR),
        SymbolKind::ConCall => S::token("enumMember", &[]).color(CON_COLOR),
        SymbolKind::FieldCall => S::token("property", &[]).color(CON_COLOR),

        SymbolKind::Unknown => return None,
    };
    Some(style)
}
