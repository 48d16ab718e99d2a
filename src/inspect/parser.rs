#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Tree-sitter parser wrapper for Python source code.

use std::{collections::BTreeSet, fmt::Formatter, ops::Range};

use anyhow::{Context, Result, anyhow};
use tree_sitter::{Language, Node, Query, QueryCursor, StreamingIterator, Tree};

/// One node captured by a tree-sitter query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Source text of the captured node.
    pub text:  String,
    /// 1-based starting line.
    pub line:  usize,
    /// Byte range of the node in the source.
    pub bytes: Range<usize>,
}

/// A struct that wraps a tree-sitter parse tree and the source it came from.
#[derive(Clone)]
pub struct Parser {
    /// The source code being parsed.
    code: String,
    /// The parse tree.
    tree: Tree,
    /// The tree-sitter Python grammar language.
    lang: Language,
}

/// Returns the compiled tree-sitter Python language.
fn python_language() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("bytes", &self.code.len())
            .field("has_error", &self.tree.root_node().has_error())
            .finish()
    }
}

impl Parser {
    /// Returns a new parser object.
    ///
    /// Tree-sitter recovers from syntax errors, so this only fails when the
    /// grammar cannot be loaded; use [`Parser::first_error`] to find out
    /// whether the source is actually valid.
    ///
    /// * `source_code`: the source code to be parsed
    pub fn new(source_code: String) -> Result<Self> {
        let mut parser = tree_sitter::Parser::new();
        let language = python_language();

        parser
            .set_language(&language)
            .with_context(|| "Failed to load Python grammar")?;
        let tree = parser
            .parse(source_code.as_str(), None)
            .ok_or_else(|| anyhow!("Error parsing Python code"))?;

        Ok(Self {
            code: source_code,
            tree,
            lang: language,
        })
    }

    /// A getter for parser's source code.
    pub fn code(&self) -> &str {
        self.code.as_str()
    }

    /// Returns the parse tree's root node.
    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Returns the source text of a node belonging to this tree.
    pub fn text_of(&self, node: Node<'_>) -> &str {
        node.utf8_text(self.code.as_bytes()).unwrap_or_default()
    }

    /// Returns the 1-based line and a description of the first syntax error,
    /// or `None` when the source parsed cleanly.
    pub fn first_error(&self) -> Option<(usize, String)> {
        let root = self.tree.root_node();
        if !root.has_error() {
            return None;
        }

        let mut cursor = root.walk();
        let mut stack = vec![root];
        let mut first: Option<Node<'_>> = None;

        while let Some(node) = stack.pop() {
            if node.is_error() || node.is_missing() {
                if first.is_none_or(|f| node.start_byte() < f.start_byte()) {
                    first = Some(node);
                }
                continue;
            }
            if node.has_error() {
                stack.extend(node.children(&mut cursor));
            }
        }

        let node = first.unwrap_or(root);
        let message = if node.is_missing() {
            format!("missing `{}`", node.kind())
        } else {
            "invalid syntax".to_string()
        };
        Some((node.start_position().row + 1, message))
    }

    /// Returns every occurrence of the requested capture in the supplied
    /// query, in source order.
    pub fn query_captures(&self, q: &str, capture_name: &str) -> Result<Vec<Capture>> {
        let query = Query::new(&self.lang, q)
            .with_context(|| format!("Failed to compile tree-sitter query: {q}"))?;
        let capture_index = query
            .capture_index_for_name(capture_name)
            .ok_or_else(|| anyhow!("Capture name {capture_name} not present in query"))?;

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, self.tree.root_node(), self.code.as_bytes());
        let mut results = Vec::new();

        while let Some(m) = matches.next() {
            for capture in m.captures.iter().filter(|c| c.index == capture_index) {
                let text = capture
                    .node
                    .utf8_text(self.code.as_bytes())
                    .context("Cannot map capture to source text")?;
                results.push(Capture {
                    text:  text.to_string(),
                    line:  capture.node.start_position().row + 1,
                    bytes: capture.node.byte_range(),
                });
            }
        }

        results.sort_by_key(|c| c.bytes.start);
        results.dedup_by_key(|c| c.bytes.start);
        Ok(results)
    }

    /// Returns the 1-based first lines of every statement, skipping comments
    /// and statements made of a lone string literal.
    pub fn statement_lines(&self) -> BTreeSet<usize> {
        let root = self.tree.root_node();
        let mut cursor = root.walk();
        let mut stack = vec![root];
        let mut lines = BTreeSet::new();

        while let Some(node) = stack.pop() {
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "comment" => {}
                    "expression_statement"
                        if child.named_child_count() == 1
                            && child
                                .named_child(0)
                                .is_some_and(|c| matches!(c.kind(), "string" | "concatenated_string")) => {}
                    "block" => stack.push(child),
                    kind if node.kind() == "module" || node.kind() == "block" => {
                        lines.insert(child.start_position().row + 1);
                        if kind != "expression_statement" {
                            stack.push(child);
                        }
                    }
                    _ => stack.push(child),
                }
            }
        }
        lines
    }

    /// Returns the total number of lines in the source code.
    pub fn line_count(&self) -> usize {
        self.code.lines().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_source_has_no_error() {
        let parser = Parser::new("def f():\n    return 1\n".into()).expect("parse");
        assert_eq!(parser.first_error(), None);
        assert_eq!(parser.line_count(), 2);
    }

    #[test]
    fn broken_source_reports_a_line() {
        let parser = Parser::new("x = 1\ndef broken(:\n    pass\n".into()).expect("parse");
        let (line, _) = parser.first_error().expect("syntax error");
        assert_eq!(line, 2);
    }

    #[test]
    fn captures_come_back_in_source_order() {
        let parser = Parser::new("while a:\n    pass\nwhile b:\n    pass\n".into()).expect("parse");
        let captures = parser
            .query_captures("(while_statement) @loop", "loop")
            .expect("query");
        let lines: Vec<_> = captures.iter().map(|c| c.line).collect();
        assert_eq!(lines, vec![1, 3]);
    }

    #[test]
    fn statement_lines_skip_docstrings_and_comments() {
        let code = "\"\"\"Doc.\"\"\"\nimport os\n\ndef f(x):\n    \"\"\"Doc.\"\"\"\n    # note\n    if x:\n        return 1\n    return 2\n";
        let parser = Parser::new(code.into()).expect("parse");
        let lines: Vec<_> = parser.statement_lines().into_iter().collect();
        assert_eq!(lines, vec![2, 4, 7, 8, 9]);
    }
}
