//! Port for the multi-language AST utility.
//!
//! Backed by tree-sitter in `infrastructure::ast`. The context compressor
//! uses it to cut whole files down to the function named in a goal or
//! error; the code evaluator uses it as the syntax gate.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpan {
    pub name: String,
    /// Zero-based, inclusive.
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
}

pub trait CodeAnalyzer: Send + Sync {
    fn supports(&self, language: &str) -> bool;

    /// `None` when the language is unsupported.
    fn syntax_valid(&self, code: &str, language: &str) -> Option<bool>;

    fn functions(&self, code: &str, language: &str) -> Vec<FunctionSpan>;

    fn find_function(&self, code: &str, language: &str, name: &str) -> Option<String> {
        self.functions(code, language)
            .into_iter()
            .find(|f| f.name == name)
            .map(|f| f.text)
    }

    /// Text of the smallest enclosing named block (function, class, ...)
    /// covering the zero-based `line`.
    fn enclosing_block_at_line(&self, code: &str, language: &str, line: usize)
        -> Option<String>;
}
