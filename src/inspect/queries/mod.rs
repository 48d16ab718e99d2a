//! Tree-sitter query strings used by the source inspector.

/// Tree-sitter query that returns `for` loops (including `async for`).
/// * `construct`: the whole statement
pub const FOR_LOOP_QUERY: &str = include_str!("for_loop.scm");

/// Tree-sitter query that returns `while` loops.
/// * `construct`: the whole statement
pub const WHILE_LOOP_QUERY: &str = include_str!("while_loop.scm");

/// Tree-sitter query that returns the conditions of `if` and `elif` branches.
/// * `construct`: the condition expression
pub const IF_CONDITION_QUERY: &str = include_str!("if_condition.scm");

/// Tree-sitter query that returns `match` statements.
/// * `construct`: the whole statement
pub const MATCH_STATEMENT_QUERY: &str = include_str!("match_statement.scm");

/// Tree-sitter query that returns `a if cond else b` expressions.
/// * `construct`: the whole expression
pub const CONDITIONAL_EXPRESSION_QUERY: &str = include_str!("conditional_expression.scm");

/// Tree-sitter query that returns comments.
/// * `comment`: the comment token
pub const COMMENT_QUERY: &str = include_str!("comment.scm");

/// Tree-sitter query that returns statements made of a lone string literal.
/// * `docstring`: the string literal
pub const DOCSTRING_QUERY: &str = include_str!("docstring.scm");

/// Tree-sitter query that returns module-scope assignments to a single name.
/// * `name`: the assigned identifier
/// * `value`: the right-hand side, however many lines it spans
pub const MODULE_ASSIGNMENT_QUERY: &str = include_str!("module_assignment.scm");
