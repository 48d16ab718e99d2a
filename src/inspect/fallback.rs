#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Line-oriented scanning for files that do not parse.
//!
//! Submissions with a syntax error still get structural checks. The scanner
//! tracks string and comment state character by character, then matches
//! keyword patterns line by line against a copy of the source where every
//! comment and string literal has been blanked out. Indentation decides
//! nesting.

use std::{collections::BTreeSet, sync::OnceLock};

use anyhow::Result;
use regex::Regex;

use super::source::{
    Construct, ConstructKind, Definition, DefinitionKind, StructuralSummary, is_main_guard,
    literal_has_content,
};

/// Output of a textual scan.
#[derive(Debug, Clone)]
pub struct Scan {
    /// Source with comments and statement-level strings blanked out.
    pub stripped: String,
    /// Structural facts recovered from the text.
    pub summary:  StructuralSummary,
}

/// Compiled line patterns.
struct Patterns {
    /// `for` header, with or without its colon.
    for_loop:    Regex,
    /// `while` header, with or without its colon.
    while_loop:  Regex,
    /// `if`/`elif` header, with or without its colon; group 1 is the
    /// condition.
    branch:      Regex,
    /// `match` header.
    match_stmt:  Regex,
    /// Inline `a if b else c`.
    ternary:     Regex,
    /// `def`/`class` header; groups are indentation, keyword, name.
    declaration: Regex,
    /// Module-scope assignment; group 1 is the target list.
    assignment:  Regex,
    /// `import a, b as c`.
    import:      Regex,
    /// `from m import a, b as c`.
    from_import: Regex,
}

impl Patterns {
    /// Compiles every pattern.
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            for_loop:    Regex::new(r"^\s*(?:async\s+)?for\s+.+?\s+in\b")?,
            while_loop:  Regex::new(r"^\s*while\b\s*\S")?,
            branch:      Regex::new(r"^\s*(?:if|elif)\b(.+?)(?::\s*)?$")?,
            match_stmt:  Regex::new(r"^\s*match\b.+:\s*$")?,
            ternary:     Regex::new(r"\S.*\bif\b.+\belse\b")?,
            declaration: Regex::new(r"^(\s*)(?:async\s+)?(def|class)\s+([A-Za-z_]\w*)")?,
            assignment:  Regex::new(
                r"^([A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)\s*(?::[^=]*)?=(?:[^=]|$)",
            )?,
            import:      Regex::new(r"^import\s+(.+)$")?,
            from_import: Regex::new(r"^from\s+\S+\s+import\s+\(?([^)]*)\)?\s*$")?,
        })
    }
}

/// Process-wide compiled patterns.
static PATTERNS: OnceLock<Patterns> = OnceLock::new();

/// Returns the compiled patterns, compiling them on first use.
fn patterns() -> Result<&'static Patterns> {
    if let Some(p) = PATTERNS.get() {
        return Ok(p);
    }
    let compiled = Patterns::compile()?;
    Ok(PATTERNS.get_or_init(|| compiled))
}

/// A string literal located by the character scanner.
#[derive(Debug, Clone, Copy)]
struct Literal {
    /// Byte offset of the first character, including any prefix.
    start:     usize,
    /// Byte offset one past the closing quote.
    end:       usize,
    /// Nothing but whitespace surrounds the literal on its lines.
    statement: bool,
}

/// Character-level tokens relevant to blanking.
#[derive(Debug, Default)]
struct Tokens {
    /// Comment byte ranges.
    comments: Vec<(usize, usize)>,
    /// String literals.
    literals: Vec<Literal>,
}

/// Finds comments and string literals, tolerating unterminated ones.
fn tokenize(code: &str) -> Tokens {
    let bytes = code.as_bytes();
    let mut tokens = Tokens::default();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                let end = code[i..].find('\n').map_or(bytes.len(), |n| i + n);
                tokens.comments.push((i, end));
                i = end;
            }
            quote @ (b'"' | b'\'') => {
                let mut start = i;
                while start > 0 && b"rRuUbBfF".contains(&bytes[start - 1]) {
                    start -= 1;
                }
                if start > 0 && (bytes[start - 1].is_ascii_alphanumeric() || bytes[start - 1] == b'_') {
                    start = i;
                }

                let triple = bytes[i..].starts_with(&[quote; 3]);
                let delim = if triple { 3 } else { 1 };
                let mut j = i + delim;
                let end = loop {
                    if j >= bytes.len() {
                        break bytes.len();
                    }
                    match bytes[j] {
                        b'\\' => j += 2,
                        b'\n' if !triple => break j,
                        b if b == quote && (!triple || bytes[j..].starts_with(&[quote; 3])) => {
                            break j + delim;
                        }
                        _ => j += 1,
                    }
                };
                let end = end.min(bytes.len());

                tokens.literals.push(Literal {
                    start,
                    end,
                    statement: false,
                });
                i = end;
            }
            _ => i += 1,
        }
    }

    for lit in &mut tokens.literals {
        let line_start = code[..lit.start].rfind('\n').map_or(0, |n| n + 1);
        let line_end = code[lit.end..].find('\n').map_or(code.len(), |n| lit.end + n);
        let before = &code[line_start..lit.start];
        let after = code[lit.end..line_end].trim_start();
        lit.statement = before.trim().is_empty() && (after.is_empty() || after.starts_with('#'));
    }

    tokens
}

/// Replaces the given byte ranges with spaces, keeping newlines.
fn blank(code: &str, ranges: impl IntoIterator<Item = (usize, usize)>) -> String {
    let mut bytes = code.as_bytes().to_vec();
    for (start, end) in ranges {
        for b in &mut bytes[start..end] {
            if *b != b'\n' {
                *b = b' ';
            }
        }
    }
    String::from_utf8_lossy(&bytes).to_string()
}

/// Number of leading whitespace columns.
fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Adds the names bound by an import list such as `a.b, c as d`.
fn add_imported(list: &str, keep_last_segment: bool, names: &mut BTreeSet<String>) {
    for item in list.split(',') {
        let item = item.trim();
        let bound = match item.split_once(" as ") {
            Some((_, alias)) => alias.trim(),
            None if keep_last_segment => item.rsplit('.').next().unwrap_or(item),
            None => item.split('.').next().unwrap_or(item),
        };
        if !bound.is_empty() && bound != "*" {
            names.insert(bound.to_string());
        }
    }
}

/// Scans `code` without a syntax tree.
pub fn scan(code: &str) -> Result<Scan> {
    let patterns = patterns()?;
    let tokens = tokenize(code);

    let stripped = blank(
        code,
        tokens.comments.iter().copied().chain(
            tokens
                .literals
                .iter()
                .filter(|l| l.statement)
                .map(|l| (l.start, l.end)),
        ),
    );
    let masked = blank(
        code,
        tokens
            .comments
            .iter()
            .copied()
            .chain(tokens.literals.iter().map(|l| (l.start, l.end))),
    );

    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(code.match_indices('\n').map(|(n, _)| n + 1))
        .collect();
    let line_of = |offset: usize| line_starts.partition_point(|&s| s <= offset);

    let statement_literal_on = |line: usize| {
        tokens
            .literals
            .iter()
            .find(|l| l.statement && line_of(l.start) == line)
            .map(|l| &code[l.start..l.end])
    };

    let masked_lines: Vec<&str> = masked.lines().collect();
    let raw_lines: Vec<&str> = code.lines().collect();

    // first line after `from` (1-based) holding something other than a comment
    let next_significant = |from: usize| {
        (from..=raw_lines.len()).find(|&n| {
            let raw = raw_lines[n - 1].trim();
            !raw.is_empty() && !raw.starts_with('#')
        })
    };
    let docstring_at = |line: Option<usize>| {
        line.and_then(statement_literal_on)
            .is_some_and(literal_has_content)
    };

    let mut summary = StructuralSummary {
        module_docstring: docstring_at(next_significant(1)),
        ..StructuralSummary::default()
    };
    let mut scope: Vec<(usize, String)> = Vec::new();

    for (idx, line) in masked_lines.iter().enumerate() {
        let number = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let indent = indent_of(line);
        while scope.last().is_some_and(|(i, _)| *i >= indent) {
            scope.pop();
        }

        if patterns.for_loop.is_match(line) {
            summary.loops.push(Construct {
                kind: ConstructKind::ForLoop,
                line: number,
            });
        } else if patterns.while_loop.is_match(line) {
            summary.loops.push(Construct {
                kind: ConstructKind::WhileLoop,
                line: number,
            });
        }

        if let Some(condition) = patterns.branch.captures(line).and_then(|c| c.get(1)) {
            // the guard's literals are blanked in `masked`; offsets match the raw line
            let raw_condition = raw_lines[idx].get(condition.range()).unwrap_or("");
            if !is_main_guard(raw_condition) {
                summary.conditionals.push(Construct {
                    kind: ConstructKind::If,
                    line: number,
                });
            }
        } else if patterns.match_stmt.is_match(line) {
            summary.conditionals.push(Construct {
                kind: ConstructKind::Match,
                line: number,
            });
        }
        let head = line.trim_start();
        if patterns.ternary.is_match(line)
            && !["if ", "elif ", "while ", "for ", "else"]
                .iter()
                .any(|k| head.starts_with(k))
        {
            summary.conditionals.push(Construct {
                kind: ConstructKind::ConditionalExpression,
                line: number,
            });
        }

        if let Some(caps) = patterns.declaration.captures(line) {
            let name = caps[3].to_string();
            let kind = if &caps[2] == "class" {
                DefinitionKind::Class
            } else {
                DefinitionKind::Function
            };
            let header_end = (idx..masked_lines.len())
                .find(|&n| masked_lines[n].trim_end().ends_with(':'))
                .unwrap_or(idx);
            let qualified_name = scope
                .iter()
                .map(|(_, n)| n.as_str())
                .chain(std::iter::once(name.as_str()))
                .collect::<Vec<_>>()
                .join(".");

            if scope.is_empty() {
                summary.top_level_symbols.insert(name.clone());
            }
            summary.definitions.push(Definition {
                name: name.clone(),
                qualified_name,
                kind,
                line: number,
                top_level: scope.is_empty(),
                has_docstring: docstring_at(next_significant(header_end + 2)),
            });
            scope.push((indent, name));
            continue;
        }

        if indent == 0 {
            if let Some(caps) = patterns.assignment.captures(line) {
                for target in caps[1].split(',') {
                    summary.top_level_symbols.insert(target.trim().to_string());
                }
            } else if let Some(caps) = patterns.import.captures(line) {
                add_imported(&caps[1], false, &mut summary.top_level_symbols);
            } else if let Some(caps) = patterns.from_import.captures(line) {
                add_imported(&caps[1], true, &mut summary.top_level_symbols);
            }
        }
    }

    Ok(Scan { stripped, summary })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_inside_strings_and_comments_are_ignored() {
        let scan = scan("print('for x in y:')  # while True:\nx = 1\n").expect("scan");
        assert!(scan.summary.loops.is_empty());
        assert!(scan.summary.top_level_symbols.contains("x"));
    }

    #[test]
    fn broken_file_still_reports_loops_and_definitions() {
        let code = "def total(xs:\n    \"\"\"Sum.\"\"\"\n    for x in xs:\n        pass\n\ndef other():\n    return 1\n";
        let scan = scan(code).expect("scan");

        assert_eq!(scan.summary.loops.len(), 1);
        assert_eq!(scan.summary.loops[0].line, 3);
        let undocumented: Vec<_> = scan
            .summary
            .definitions
            .iter()
            .filter(|d| !d.has_docstring)
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(undocumented, vec!["other"]);
    }

    #[test]
    fn nested_definitions_are_qualified() {
        let code = "class A:\n    def m(self):\n        pass\ndef f():\n    pass\n";
        let names: Vec<_> = scan(code)
            .expect("scan")
            .summary
            .definitions
            .into_iter()
            .map(|d| d.qualified_name)
            .collect();
        assert_eq!(names, vec!["A", "A.m", "f"]);
    }

    #[test]
    fn main_guard_is_skipped() {
        let scan = scan("if __name__ == '__main__':\n    main(\n").expect("scan");
        assert!(scan.summary.conditionals.is_empty());
    }

    #[test]
    fn headers_missing_their_colon_are_still_detected() {
        let code = "for item in items\n    print(item)\nwhile running\n    step()\nif ready\n    go()\n";
        let scan = scan(code).expect("scan");

        let kinds: Vec<_> = scan.summary.loops.iter().map(|c| (c.kind, c.line)).collect();
        assert_eq!(
            kinds,
            vec![(ConstructKind::ForLoop, 1), (ConstructKind::WhileLoop, 3)]
        );
        assert_eq!(scan.summary.conditionals.len(), 1);
        assert_eq!(scan.summary.conditionals[0].line, 5);
    }

    #[test]
    fn guard_with_trailing_comment_is_skipped() {
        let scan = scan("if __name__ == \"__main__\":  # entry point\n    main()\n").expect("scan");
        assert!(scan.summary.conditionals.is_empty());
    }

    #[test]
    fn statement_strings_are_stripped_but_values_kept() {
        let scan = scan("\"\"\"Module.\"\"\"\nname = 'kept'\n").expect("scan");
        assert!(scan.summary.module_docstring);
        assert!(!scan.stripped.contains("Module"));
        assert!(scan.stripped.contains("'kept'"));
    }
}
