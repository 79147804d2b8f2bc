//! Language-neutral module IR

use serde::{Deserialize, Serialize};

/// Source position of a node: 1-based lines, 0-based UTF-8 byte columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub lineno: usize,
    pub col_offset: usize,
    pub end_lineno: usize,
    pub end_col_offset: usize,
}

impl Location {
    pub fn new(lineno: usize, col_offset: usize, end_lineno: usize, end_col_offset: usize) -> Self {
        Self {
            lineno,
            col_offset,
            end_lineno,
            end_col_offset,
        }
    }

    /// Byte range of this location within `source`
    pub fn byte_range(&self, source: &str) -> Option<(usize, usize)> {
        let starts = line_starts(source);
        let start = starts.get(self.lineno.checked_sub(1)?)? + self.col_offset;
        let end = starts.get(self.end_lineno.checked_sub(1)?)? + self.end_col_offset;
        (start <= end && end <= source.len()).then_some((start, end))
    }
}

/// Byte offsets at which each line starts
pub fn line_starts(source: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (idx, byte) in source.bytes().enumerate() {
        if byte == b'\n' {
            starts.push(idx + 1);
        }
    }
    starts
}

/// Parameter kinds, named as the host language's introspection names them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgumentKind {
    PositionalOnly,
    PositionalOrKeyword,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

impl ArgumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArgumentKind::PositionalOnly => "POSITIONAL_ONLY",
            ArgumentKind::PositionalOrKeyword => "POSITIONAL_OR_KEYWORD",
            ArgumentKind::VarPositional => "VAR_POSITIONAL",
            ArgumentKind::KeywordOnly => "KEYWORD_ONLY",
            ArgumentKind::VarKeyword => "VAR_KEYWORD",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub name: String,
    pub kind: ArgumentKind,
    pub annotation: Option<String>,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub args: Vec<Argument>,
    pub return_annotation: Option<String>,
    pub decorators: Vec<String>,
    pub docstring: Option<String>,
    pub is_async: bool,
    pub is_static: bool,
    pub is_class: bool,
    /// Span of the name token
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub annotation: Option<String>,
    pub value: Option<String>,
    pub docstring: Option<String>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<String>,
    pub decorators: Vec<String>,
    pub docstring: Option<String>,
    pub methods: Vec<FunctionDef>,
    pub attributes: Vec<Attribute>,
    pub location: Location,
}

/// Parsed view of one source file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleDef {
    pub file_path: String,
    pub docstring: Option<String>,
    pub functions: Vec<FunctionDef>,
    pub classes: Vec<ClassDef>,
    pub attributes: Vec<Attribute>,
    /// Import statements, verbatim
    pub imports: Vec<String>,
    /// Names listed in `__all__`, when declared
    pub dunder_all: Option<Vec<String>>,
}

impl ModuleDef {
    /// Every documentable fragment in source order
    pub fn fragments(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.docstring.is_some() {
            out.push(crate::suri::MODULE_DOC_FRAGMENT.to_string());
        }
        for attr in &self.attributes {
            out.push(attr.name.clone());
        }
        for func in &self.functions {
            out.push(func.name.clone());
        }
        for class in &self.classes {
            out.push(class.name.clone());
            for attr in &class.attributes {
                out.push(format!("{}.{}", class.name, attr.name));
            }
            for method in &class.methods {
                out.push(format!("{}.{}", class.name, method.name));
            }
        }
        out
    }

    /// Whether the module defines anything worth documenting
    pub fn is_documentable(&self) -> bool {
        self.docstring.is_some()
            || !self.functions.is_empty()
            || !self.classes.is_empty()
            || !self.attributes.is_empty()
    }
}

/// Public unless some segment of the fragment is underscore-prefixed
pub fn is_public_fragment(fragment: &str) -> bool {
    fragment == crate::suri::MODULE_DOC_FRAGMENT
        || !fragment.split('.').any(|part| part.starts_with('_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_range() {
        let source = "ab\ncdef\ng";
        let loc = Location::new(2, 1, 2, 3);
        assert_eq!(loc.byte_range(source), Some((4, 6)));
        assert_eq!(&source[4..6], "de");
        assert_eq!(Location::new(9, 0, 9, 1).byte_range(source), None);
    }

    #[test]
    fn test_is_public_fragment() {
        assert!(is_public_fragment("__doc__"));
        assert!(is_public_fragment("Bus.send"));
        assert!(!is_public_fragment("_helper"));
        assert!(!is_public_fragment("Bus._internal"));
        assert!(!is_public_fragment("Bus.__init__"));
    }
}
