#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! A parsed submission file and the structural facts extracted from it.

use std::{
    collections::BTreeSet,
    fmt::Display,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;
use tree_sitter::Node;

use super::{
    DocstringScope, InspectError, LoopKind, ReportMode, fallback,
    parser::{Capture, Parser},
    queries::*,
};
use crate::error::ParseError;

/// How a [`SourceUnit`] was analysed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Analysis {
    /// Facts come from a full syntax tree.
    Syntax,
    /// The file did not parse; facts come from line-oriented scanning.
    Textual,
}

/// Kinds of loop and branch constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructKind {
    /// `for` / `async for` statement.
    ForLoop,
    /// `while` statement.
    WhileLoop,
    /// `if` or `elif` branch.
    If,
    /// `match` statement.
    Match,
    /// `a if cond else b`.
    ConditionalExpression,
}

impl Display for ConstructKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstructKind::ForLoop => write!(f, "for loop"),
            ConstructKind::WhileLoop => write!(f, "while loop"),
            ConstructKind::If => write!(f, "if statement"),
            ConstructKind::Match => write!(f, "match statement"),
            ConstructKind::ConditionalExpression => write!(f, "conditional expression"),
        }
    }
}

/// A loop or branch found in the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Construct {
    /// What was found.
    pub kind: ConstructKind,
    /// 1-based line of the construct.
    pub line: usize,
}

/// Kind of a named declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    /// `def` / `async def`.
    Function,
    /// `class`.
    Class,
}

/// A function or class declaration, at any nesting depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Definition {
    /// Bare name.
    pub name:           String,
    /// Dotted name including enclosing classes and functions.
    pub qualified_name: String,
    /// Function or class.
    pub kind:           DefinitionKind,
    /// 1-based line of the `def`/`class` keyword.
    pub line:           usize,
    /// Declared directly at module scope.
    pub top_level:      bool,
    /// First statement of the body is a non-empty string literal.
    pub has_docstring:  bool,
}

/// Everything the inspector knows about one file's structure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StructuralSummary {
    /// Loops in source order.
    pub loops:             Vec<Construct>,
    /// Branches in source order, excluding the main-module guard.
    pub conditionals:      Vec<Construct>,
    /// Declarations in source order.
    pub definitions:       Vec<Definition>,
    /// The module starts with a non-empty docstring.
    pub module_docstring:  bool,
    /// Names bound at module scope.
    pub top_level_symbols: BTreeSet<String>,
}

/// A declaration that should carry a docstring but does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingDocstring {
    /// Qualified name, or `module` for the module docstring.
    pub symbol: String,
    /// 1-based line of the declaration.
    pub line:   usize,
}

/// A submission source file with its derived views.
#[derive(Debug, Clone, Serialize)]
pub struct SourceUnit {
    /// Path the file was read from.
    path:        PathBuf,
    /// Final path component, used in messages.
    file_name:   String,
    /// Raw text.
    #[serde(skip)]
    code:        String,
    /// Text with comments and statement-level string literals blanked out.
    #[serde(skip)]
    stripped:    String,
    /// Structural facts.
    summary:     StructuralSummary,
    /// How the facts were obtained.
    analysis:    Analysis,
    /// Why textual analysis was used, if it was.
    parse_error: Option<ParseError>,
}

impl SourceUnit {
    /// Reads and parses a file, failing on syntax errors.
    pub fn parse(path: impl AsRef<Path>) -> Result<Self, InspectError> {
        let path = path.as_ref();
        let code = read_source(path)?;
        Self::from_source(path, code)
    }

    /// Parses already-loaded text, failing on syntax errors.
    pub fn from_source(path: impl AsRef<Path>, code: String) -> Result<Self, InspectError> {
        let path = path.as_ref();
        let parser = Parser::new(code)?;

        if let Some((line, message)) = parser.first_error() {
            return Err(InspectError::Parse(ParseError {
                path: path.to_path_buf(),
                line,
                message,
            }));
        }

        let summary = summarize(&parser)?;
        let stripped = strip_comments_and_docstrings(&parser)?;

        Ok(Self {
            path: path.to_path_buf(),
            file_name: file_name_of(path),
            code: parser.code().to_string(),
            stripped,
            summary,
            analysis: Analysis::Syntax,
            parse_error: None,
        })
    }

    /// Builds a unit by textual scanning, recording the parse error that made
    /// this necessary.
    pub fn textual(
        path: impl AsRef<Path>,
        code: String,
        parse_error: ParseError,
    ) -> Result<Self, InspectError> {
        let path = path.as_ref();
        let scan = fallback::scan(&code)?;

        Ok(Self {
            path: path.to_path_buf(),
            file_name: file_name_of(path),
            code,
            stripped: scan.stripped,
            summary: scan.summary,
            analysis: Analysis::Textual,
            parse_error: Some(parse_error),
        })
    }

    /// Path the unit was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used in messages.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Raw source text.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Source text with comments and docstrings blanked out; line numbers are
    /// preserved.
    pub fn stripped(&self) -> &str {
        &self.stripped
    }

    /// Structural facts.
    pub fn summary(&self) -> &StructuralSummary {
        &self.summary
    }

    /// Whether facts come from a syntax tree or from textual scanning.
    pub fn analysis(&self) -> Analysis {
        self.analysis
    }

    /// The parse error that forced textual analysis, if any.
    pub fn parse_error(&self) -> Option<&ParseError> {
        self.parse_error.as_ref()
    }

    /// Loops of the requested kind, in source order.
    pub fn loops(&self, kind: LoopKind) -> Vec<&Construct> {
        self.summary
            .loops
            .iter()
            .filter(|c| kind.matches(c.kind))
            .collect()
    }

    /// Returns true when the file contains a loop of the requested kind.
    pub fn has_loop_construct(&self, kind: LoopKind) -> bool {
        !self.loops(kind).is_empty()
    }

    /// Branching constructs in source order.
    pub fn conditionals(&self) -> &[Construct] {
        &self.summary.conditionals
    }

    /// Returns true when the file contains any branching construct other than
    /// the main-module guard.
    pub fn has_conditional(&self) -> bool {
        !self.summary.conditionals.is_empty()
    }

    /// Declarations in `scope` that lack a non-empty docstring.
    pub fn missing_docstrings(&self, scope: DocstringScope, mode: ReportMode) -> Vec<MissingDocstring> {
        let mut missing = Vec::new();

        if scope.includes_module() && !self.summary.module_docstring {
            missing.push(MissingDocstring {
                symbol: "module".into(),
                line:   1,
            });
        }

        missing.extend(
            self.summary
                .definitions
                .iter()
                .filter(|d| scope.includes(d.kind) && !d.has_docstring)
                .map(|d| MissingDocstring {
                    symbol: d.qualified_name.clone(),
                    line:   d.line,
                }),
        );

        if mode == ReportMode::First {
            missing.truncate(1);
        }
        missing
    }

    /// Returns true when every declaration in `scope` is documented.
    pub fn all_docstrings_present(&self, scope: DocstringScope) -> bool {
        self.missing_docstrings(scope, ReportMode::First).is_empty()
    }

    /// The requested names that are not bound at module scope.
    pub fn missing_symbols<I, S>(&self, names: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter(|n| !self.summary.top_level_symbols.contains(n.as_ref()))
            .map(|n| n.as_ref().to_string())
            .collect()
    }
}

/// Reads a source file, mapping a missing file to [`InspectError::NotFound`].
pub(super) fn read_source(path: &Path) -> Result<String, InspectError> {
    std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            InspectError::NotFound(path.to_path_buf())
        } else {
            InspectError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Final path component as a string.
fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Returns true for the `__name__ == "__main__"` guard condition, in either
/// operand order.
pub(super) fn is_main_guard(condition: &str) -> bool {
    let compact: String = condition
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    matches!(
        compact.as_str(),
        "__name__=='__main__'"
            | "__name__==\"__main__\""
            | "'__main__'==__name__"
            | "\"__main__\"==__name__"
    )
}

/// Returns true when a string literal has non-blank content.
pub(super) fn literal_has_content(literal: &str) -> bool {
    let body = literal.trim_start_matches(|c: char| "rRuUbBfF".contains(c));
    let inner = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|q| {
            (body.len() >= 2 * q.len() && body.starts_with(q) && body.ends_with(q))
                .then(|| &body[q.len()..body.len() - q.len()])
        })
        .unwrap_or(body);
    !inner.trim().is_empty()
}

/// Collects loops, branches, declarations and module-scope names from a
/// syntax tree.
fn summarize(parser: &Parser) -> Result<StructuralSummary> {
    let constructs = |query: &str, kind: ConstructKind| -> Result<Vec<Construct>> {
        Ok(parser
            .query_captures(query, "construct")?
            .into_iter()
            .map(|c| Construct { kind, line: c.line })
            .collect())
    };

    let mut loops = constructs(FOR_LOOP_QUERY, ConstructKind::ForLoop)?;
    loops.extend(constructs(WHILE_LOOP_QUERY, ConstructKind::WhileLoop)?);
    loops.sort_by_key(|c| c.line);

    let mut conditionals: Vec<Construct> = parser
        .query_captures(IF_CONDITION_QUERY, "construct")?
        .into_iter()
        .filter(|c| !is_main_guard(&c.text))
        .map(|c| Construct {
            kind: ConstructKind::If,
            line: c.line,
        })
        .collect();
    conditionals.extend(constructs(MATCH_STATEMENT_QUERY, ConstructKind::Match)?);
    conditionals.extend(constructs(
        CONDITIONAL_EXPRESSION_QUERY,
        ConstructKind::ConditionalExpression,
    )?);
    conditionals.sort_by_key(|c| c.line);

    let root = parser.root_node();
    let mut definitions = Vec::new();
    collect_definitions(parser, root, &mut Vec::new(), &mut definitions);

    let mut top_level_symbols = BTreeSet::new();
    collect_module_names(parser, root, &mut top_level_symbols);

    Ok(StructuralSummary {
        loops,
        conditionals,
        definitions,
        module_docstring: body_docstring(parser, root),
        top_level_symbols,
    })
}

/// Returns true when the first statement of `body` is a non-empty string.
fn body_docstring(parser: &Parser, body: Node<'_>) -> bool {
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment");

    match first {
        Some(stmt) if stmt.kind() == "expression_statement" && stmt.named_child_count() == 1 => stmt
            .named_child(0)
            .filter(|lit| matches!(lit.kind(), "string" | "concatenated_string"))
            .is_some_and(|lit| literal_has_content(parser.text_of(lit))),
        _ => false,
    }
}

/// Walks the tree recording every function and class with its enclosing
/// scope.
fn collect_definitions(
    parser: &Parser,
    node: Node<'_>,
    scope: &mut Vec<String>,
    out: &mut Vec<Definition>,
) {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();

    for child in children {
        let declaration = match child.kind() {
            "decorated_definition" => child.child_by_field_name("definition"),
            "function_definition" | "class_definition" => Some(child),
            _ => None,
        };

        let Some(decl) = declaration else {
            collect_definitions(parser, child, scope, out);
            continue;
        };
        let (Some(name), Some(body)) = (
            decl.child_by_field_name("name"),
            decl.child_by_field_name("body"),
        ) else {
            continue;
        };

        let name = parser.text_of(name).to_string();
        let qualified_name = scope
            .iter()
            .chain(std::iter::once(&name))
            .cloned()
            .collect::<Vec<_>>()
            .join(".");

        out.push(Definition {
            name: name.clone(),
            qualified_name,
            kind: if decl.kind() == "class_definition" {
                DefinitionKind::Class
            } else {
                DefinitionKind::Function
            },
            line: decl.start_position().row + 1,
            top_level: scope.is_empty(),
            has_docstring: body_docstring(parser, body),
        });

        scope.push(name);
        collect_definitions(parser, body, scope, out);
        scope.pop();
    }
}

/// Node kinds whose bodies still execute at module scope.
const MODULE_SCOPE_BLOCKS: &[&str] = &[
    "block",
    "if_statement",
    "elif_clause",
    "else_clause",
    "try_statement",
    "except_clause",
    "finally_clause",
    "with_statement",
    "for_statement",
    "while_statement",
];

/// Records the names bound at module scope below `node`.
fn collect_module_names(parser: &Parser, node: Node<'_>, names: &mut BTreeSet<String>) {
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();

    for child in children {
        match child.kind() {
            "function_definition" | "class_definition" => {
                if let Some(name) = child.child_by_field_name("name") {
                    names.insert(parser.text_of(name).to_string());
                }
            }
            "decorated_definition" => {
                if let Some(decl) = child.child_by_field_name("definition")
                    && let Some(name) = decl.child_by_field_name("name")
                {
                    names.insert(parser.text_of(name).to_string());
                }
            }
            "expression_statement" => {
                let mut inner = child.walk();
                for expr in child.named_children(&mut inner) {
                    collect_assigned(parser, expr, names);
                }
            }
            "import_statement" | "import_from_statement" => {
                collect_imported(parser, child, names);
            }
            kind if MODULE_SCOPE_BLOCKS.contains(&kind) => {
                collect_module_names(parser, child, names);
            }
            _ => {}
        }
    }
}

/// Records the targets of a (possibly chained) assignment.
fn collect_assigned(parser: &Parser, expr: Node<'_>, names: &mut BTreeSet<String>) {
    if expr.kind() != "assignment" {
        return;
    }
    if let Some(left) = expr.child_by_field_name("left") {
        collect_target_names(parser, left, names);
    }
    if let Some(right) = expr.child_by_field_name("right") {
        collect_assigned(parser, right, names);
    }
}

/// Records identifiers bound by an assignment target pattern.
fn collect_target_names(parser: &Parser, target: Node<'_>, names: &mut BTreeSet<String>) {
    match target.kind() {
        "identifier" => {
            names.insert(parser.text_of(target).to_string());
        }
        "pattern_list" | "tuple_pattern" | "list_pattern" | "list_splat_pattern" => {
            let mut cursor = target.walk();
            for part in target.named_children(&mut cursor) {
                collect_target_names(parser, part, names);
            }
        }
        _ => {}
    }
}

/// Records the names an import statement binds.
fn collect_imported(parser: &Parser, stmt: Node<'_>, names: &mut BTreeSet<String>) {
    let is_from = stmt.kind() == "import_from_statement";
    let mut cursor = stmt.walk();

    for imported in stmt.children_by_field_name("name", &mut cursor) {
        let bound = match imported.kind() {
            "aliased_import" => imported
                .child_by_field_name("alias")
                .map(|alias| parser.text_of(alias).to_string()),
            "dotted_name" => {
                let text = parser.text_of(imported);
                let segment = if is_from {
                    text.rsplit('.').next()
                } else {
                    text.split('.').next()
                };
                segment.map(|s| s.trim().to_string())
            }
            _ => None,
        };
        if let Some(name) = bound.filter(|n| !n.is_empty()) {
            names.insert(name);
        }
    }
}

/// Replaces comments and statement-level string literals with spaces,
/// keeping newlines so line numbers survive.
fn strip_comments_and_docstrings(parser: &Parser) -> Result<String> {
    let mut spans: Vec<Capture> = parser.query_captures(COMMENT_QUERY, "comment")?;
    spans.extend(parser.query_captures(DOCSTRING_QUERY, "docstring")?);

    let mut bytes = parser.code().as_bytes().to_vec();
    for span in spans {
        for b in &mut bytes[span.bytes] {
            if *b != b'\n' {
                *b = b' ';
            }
        }
    }

    String::from_utf8(bytes).context("Blanked source is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parses inline source for a test.
    fn unit(code: &str) -> SourceUnit {
        SourceUnit::from_source("inline.py", code.to_string()).expect("valid source")
    }

    #[test]
    fn main_guard_is_recognised_in_both_orders() {
        assert!(is_main_guard("__name__ == \"__main__\""));
        assert!(is_main_guard("'__main__' == __name__"));
        assert!(!is_main_guard("__name__ != '__main__'"));
    }

    #[test]
    fn blank_docstrings_do_not_count() {
        assert!(literal_has_content("\"\"\"Adds.\"\"\""));
        assert!(literal_has_content("r'x'"));
        assert!(!literal_has_content("\"\"\"   \"\"\""));
        assert!(!literal_has_content("''"));
    }

    #[test]
    fn comprehensions_are_not_loops() {
        let src = unit("squares = [x * x for x in range(3)]\n");
        assert!(!src.has_loop_construct(LoopKind::Any));
    }

    #[test]
    fn nested_loops_are_all_reported() {
        let src = unit("for i in a:\n    while i:\n        i -= 1\n");
        let lines: Vec<_> = src.loops(LoopKind::Any).iter().map(|c| c.line).collect();
        assert_eq!(lines, vec![1, 2]);
        assert_eq!(src.loops(LoopKind::While).len(), 1);
    }

    #[test]
    fn main_guard_is_not_a_conditional() {
        let src = unit("def main():\n    pass\n\nif __name__ == '__main__':\n    main()\n");
        assert!(!src.has_conditional());
    }

    #[test]
    fn ternaries_and_elifs_are_conditionals() {
        let src = unit("x = 1 if y else 2\nif a:\n    pass\nelif b:\n    pass\n");
        let kinds: Vec<_> = src.conditionals().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ConstructKind::ConditionalExpression,
                ConstructKind::If,
                ConstructKind::If
            ]
        );
    }

    #[test]
    fn methods_are_qualified_by_their_class() {
        let src = unit(
            "\"\"\"Shapes.\"\"\"\n\nclass Box:\n    \"\"\"A box.\"\"\"\n\n    def area(self):\n        return 0\n",
        );
        let missing = src.missing_docstrings(DocstringScope::All, ReportMode::All);
        assert_eq!(
            missing,
            vec![MissingDocstring {
                symbol: "Box.area".into(),
                line:   6,
            }]
        );
    }

    #[test]
    fn module_scope_names_include_imports_and_targets() {
        let src = unit(
            "import os.path\nfrom math import pi as PI\na, b = 1, 2\nc = d = 3\n\n@staticmethod\ndef f():\n    inner = 1\n",
        );
        let missing = src.missing_symbols(["os", "PI", "a", "b", "c", "d", "f", "inner", "pi"]);
        assert_eq!(
            missing.into_iter().collect::<Vec<_>>(),
            vec!["inner".to_string(), "pi".to_string()]
        );
    }

    #[test]
    fn stripping_keeps_line_numbers_and_code() {
        let src = unit("\"\"\"Doc.\"\"\"\nx = 'keep'  # note\n");
        assert_eq!(src.stripped().lines().count(), 2);
        assert!(src.stripped().contains("x = 'keep'"));
        assert!(!src.stripped().contains("note"));
        assert!(!src.stripped().contains("Doc"));
    }
}
