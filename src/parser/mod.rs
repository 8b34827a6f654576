//! Import declaration extraction
//!
//! Architecture: Pluggable Front-End - the graph builder consumes declarations, not syntax
//! - `ImportParser` is the seam for language-specific import extraction
//! - The built-in `EsModuleParser` extracts ES-module declarations with regexes,
//!   ignoring module body execution entirely (static analysis only)
//! - Extraction failures degrade the single file, never the run

use crate::domain::violations::{BoundaryError, BoundaryResult};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;

/// One extracted import declaration
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ImportDecl {
    /// The specifier text, empty for computed dynamic imports
    pub specifier: String,
    /// Declaration form
    pub kind: ImportDeclKind,
    /// Imported identifiers; empty means whole-module import
    pub symbols: Vec<String>,
    /// 1-indexed line of the declaration
    pub line: u32,
    /// 1-indexed column of the declaration
    pub column: u32,
}

/// How an import was declared in source, before resolution; serializable so
/// cache entries can carry it
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportDeclKind {
    /// `import ... from 'spec'` or bare `import 'spec'`
    Static,
    /// `export ... from 'spec'`
    ReExport,
    /// `import('spec')` with a literal specifier
    Dynamic,
    /// `import(expr)` whose target cannot be reduced to a literal
    DynamicComputed,
}

/// Everything the graph builder needs to know about one module's source
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ModuleSource {
    /// Import declarations in source order
    pub imports: Vec<ImportDecl>,
    /// Identifiers the module exposes as its external surface
    pub exports: BTreeSet<String>,
}

impl ModuleSource {
    /// A barrel is a module whose declarations are exclusively re-exports
    pub fn is_barrel(&self) -> bool {
        !self.imports.is_empty()
            && self.imports.iter().all(|decl| decl.kind == ImportDeclKind::ReExport)
    }
}

/// Trait for language-specific import extraction front-ends
pub trait ImportParser: Send + Sync {
    /// Extract the import declarations and export surface of one module
    fn extract(&self, file: &Path, content: &str) -> BoundaryResult<ModuleSource>;

    /// Whether this parser handles the given file type
    fn handles_file(&self, file: &Path) -> bool;
}

/// Regex-based extractor for ES-module syntax (TypeScript/JavaScript)
pub struct EsModuleParser {
    static_import: Regex,
    reexport: Regex,
    dynamic_import: Regex,
    export_decl: Regex,
    export_list: Regex,
}

impl EsModuleParser {
    pub fn new() -> Self {
        // Anchored to line starts so expressions mentioning `import` in the
        // middle of a statement are not picked up
        Self {
            static_import: Regex::new(
                r#"(?m)^[ \t]*import\s+(?:([\w$]+\s*,\s*)?(\{[^}]*\}|\*\s+as\s+[\w$]+|[\w$]+)\s+from\s+)?['"]([^'"]+)['"]"#,
            )
            .expect("static import regex"),
            reexport: Regex::new(
                r#"(?m)^[ \t]*export\s+(\*(?:\s+as\s+[\w$]+)?|\{[^}]*\})\s+from\s+['"]([^'"]+)['"]"#,
            )
            .expect("reexport regex"),
            dynamic_import: Regex::new(r#"\bimport\s*\(\s*([^)]*?)\s*\)"#)
                .expect("dynamic import regex"),
            export_decl: Regex::new(
                r"(?m)^[ \t]*export\s+(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(?:function\s*\*?|class|const|let|var|interface|type|enum)\s+([\w$]+)",
            )
            .expect("export decl regex"),
            export_list: Regex::new(r"(?m)^[ \t]*export\s*\{([^}]*)\}\s*;?\s*$")
                .expect("export list regex"),
        }
    }
}

impl Default for EsModuleParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportParser for EsModuleParser {
    fn extract(&self, file: &Path, content: &str) -> BoundaryResult<ModuleSource> {
        if content.contains('\0') {
            return Err(BoundaryError::parse(
                file.display().to_string(),
                "file contains binary data",
            ));
        }

        let scrubbed = strip_comments(content);
        let mut source = ModuleSource::default();

        for caps in self.reexport.captures_iter(&scrubbed) {
            let whole = caps.get(0).expect("match");
            let (line, column) = position_of(&scrubbed, whole.start());
            let clause = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            source.imports.push(ImportDecl {
                specifier: caps[2].to_string(),
                kind: ImportDeclKind::ReExport,
                symbols: parse_named_clause(clause),
                line,
                column,
            });
        }

        for caps in self.static_import.captures_iter(&scrubbed) {
            let whole = caps.get(0).expect("match");
            let (line, column) = position_of(&scrubbed, whole.start());
            let mut symbols = Vec::new();
            if let Some(default_name) = caps.get(1) {
                symbols.push(default_name.as_str().trim_end_matches([',', ' ']).to_string());
            }
            if let Some(clause) = caps.get(2) {
                let clause = clause.as_str();
                if clause.starts_with('{') {
                    symbols.extend(parse_named_clause(clause));
                } else if !clause.starts_with('*') {
                    symbols.push(clause.to_string());
                }
                // `* as ns` stays a whole-module import: no symbol list
            }
            source.imports.push(ImportDecl {
                specifier: caps[3].to_string(),
                kind: ImportDeclKind::Static,
                symbols,
                line,
                column,
            });
        }

        for caps in self.dynamic_import.captures_iter(&scrubbed) {
            let whole = caps.get(0).expect("match");
            let (line, column) = position_of(&scrubbed, whole.start());
            let arg = caps[1].trim();
            let literal = arg
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .or_else(|| arg.strip_prefix('"').and_then(|s| s.strip_suffix('"')));

            match literal {
                Some(spec) if !spec.is_empty() => source.imports.push(ImportDecl {
                    specifier: spec.to_string(),
                    kind: ImportDeclKind::Dynamic,
                    symbols: Vec::new(),
                    line,
                    column,
                }),
                _ => source.imports.push(ImportDecl {
                    specifier: String::new(),
                    kind: ImportDeclKind::DynamicComputed,
                    symbols: Vec::new(),
                    line,
                    column,
                }),
            }
        }

        // Declarations are matched per form above; restore source order so the
        // graph's edge order follows the file
        source.imports.sort_by_key(|decl| (decl.line, decl.column));

        for caps in self.export_decl.captures_iter(&scrubbed) {
            source.exports.insert(caps[1].to_string());
        }
        for caps in self.export_list.captures_iter(&scrubbed) {
            for name in parse_named_clause(&format!("{{{}}}", &caps[1])) {
                source.exports.insert(name);
            }
        }

        Ok(source)
    }

    fn handles_file(&self, file: &Path) -> bool {
        matches!(
            file.extension().and_then(|e| e.to_str()),
            Some("ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs")
        )
    }
}

/// Parse a `{ a, b as c, type D }` clause into the locally relevant names
fn parse_named_clause(clause: &str) -> Vec<String> {
    let inner = clause.trim().trim_start_matches('{').trim_end_matches('}');
    inner
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let part = part.strip_prefix("type ").unwrap_or(part);
            // `a as b` exposes the original name `a` on the target module
            let name = part.split_whitespace().next()?;
            Some(name.to_string())
        })
        .collect()
}

/// Replace comments and template-literal bodies with spaces, preserving byte
/// offsets so line numbers computed on the scrubbed text match the original.
/// Quoted strings are kept intact because specifiers may legally contain `//`.
fn strip_comments(content: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Template,
    }

    let bytes = content.as_bytes();
    let mut out = content.as_bytes().to_vec();
    let mut state = State::Code;
    let mut i = 0;

    while i < bytes.len() {
        match state {
            State::Code => {
                if bytes[i] == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                    state = State::LineComment;
                    out[i] = b' ';
                } else if bytes[i] == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'*' {
                    state = State::BlockComment;
                    out[i] = b' ';
                } else if bytes[i] == b'`' {
                    state = State::Template;
                    out[i] = b' ';
                } else if bytes[i] == b'\'' || bytes[i] == b'"' {
                    // Skip over the quoted string without scrubbing it; a
                    // specifier may legally contain `//`
                    let quote = bytes[i];
                    i += 1;
                    while i < bytes.len() && bytes[i] != quote && bytes[i] != b'\n' {
                        if bytes[i] == b'\\' {
                            i += 1;
                        }
                        i += 1;
                    }
                }
            }
            State::LineComment => {
                if bytes[i] == b'\n' {
                    state = State::Code;
                } else {
                    out[i] = b' ';
                }
            }
            State::BlockComment => {
                if bytes[i] == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 1;
                    state = State::Code;
                } else if bytes[i] != b'\n' {
                    out[i] = b' ';
                }
            }
            State::Template => {
                if bytes[i] == b'`' {
                    out[i] = b' ';
                    state = State::Code;
                } else if bytes[i] != b'\n' {
                    out[i] = b' ';
                }
            }
        }
        i += 1;
    }

    // Every scrubbed byte became an ASCII space, so the buffer is valid UTF-8
    String::from_utf8_lossy(&out).into_owned()
}

/// 1-indexed (line, column) of a byte offset
fn position_of(content: &str, offset: usize) -> (u32, u32) {
    let before = &content[..offset];
    let line = before.bytes().filter(|&b| b == b'\n').count() as u32 + 1;
    let column = before.rfind('\n').map(|n| offset - n).unwrap_or(offset + 1) as u32;
    (line, column)
}
