use serde::{Deserialize, Serialize};
use wasmparser::TypeRef;

/// Kind of entity a module imports from its host.
///
/// Informational only: policy matching never looks at the kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    #[serde(rename = "func")]
    Function,
    Table,
    Memory,
    Global,
    Tag,
}

impl ImportKind {
    pub fn from_type_ref(ty: &TypeRef) -> Self {
        match ty {
            TypeRef::Func(_) | TypeRef::FuncExact(_) => Self::Function,
            TypeRef::Table(_) => Self::Table,
            TypeRef::Memory(_) => Self::Memory,
            TypeRef::Global(_) => Self::Global,
            TypeRef::Tag(_) => Self::Tag,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "func",
            Self::Table => "table",
            Self::Memory => "memory",
            Self::Global => "global",
            Self::Tag => "tag",
        }
    }
}

impl std::fmt::Display for ImportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a module's import section, in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportEntry {
    pub module: String,
    pub field: String,
    pub kind: ImportKind,
}

impl ImportEntry {
    pub fn new(module: impl Into<String>, field: impl Into<String>, kind: ImportKind) -> Self {
        Self {
            module: module.into(),
            field: field.into(),
            kind,
        }
    }
}

impl std::fmt::Display for ImportEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{} ({})", self.module, self.field, self.kind)
    }
}
