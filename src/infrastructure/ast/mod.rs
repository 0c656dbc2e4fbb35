//! Tree-sitter backed code analyzer.
//!
//! Five grammars (python, javascript, typescript, rust, go). Parsers are
//! constructed per call: `tree_sitter::Parser` is not `Sync`, construction
//! is cheap, and the analyzer sits behind a `Send + Sync` port.

use tracing::warn;
use tree_sitter::{Language, Node, Parser, Point, Tree};

use crate::domain::ports::{CodeAnalyzer, FunctionSpan};

pub struct TreeSitterAnalyzer;

impl Default for TreeSitterAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeSitterAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn supported_languages() -> &'static [&'static str] {
        &["python", "javascript", "typescript", "rust", "go"]
    }

    fn language_for(language: &str) -> Option<Language> {
        match language {
            "python" => Some(tree_sitter_python::LANGUAGE.into()),
            "javascript" => Some(tree_sitter_javascript::LANGUAGE.into()),
            "typescript" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            "rust" => Some(tree_sitter_rust::LANGUAGE.into()),
            "go" => Some(tree_sitter_go::LANGUAGE.into()),
            _ => None,
        }
    }

    /// Node kinds that define a named function in each grammar.
    fn function_kinds(language: &str) -> &'static [&'static str] {
        match language {
            "python" => &["function_definition"],
            "javascript" | "typescript" => &[
                "function_declaration",
                "generator_function_declaration",
                "method_definition",
            ],
            "rust" => &["function_item"],
            "go" => &["function_declaration", "method_declaration"],
            _ => &[],
        }
    }

    /// Kinds that count as an enclosing block for node-at-line lookups.
    fn block_kinds(language: &str) -> &'static [&'static str] {
        match language {
            "python" => &["function_definition", "class_definition"],
            "javascript" | "typescript" => &[
                "function_declaration",
                "generator_function_declaration",
                "method_definition",
                "class_declaration",
            ],
            "rust" => &["function_item", "impl_item", "struct_item", "enum_item"],
            "go" => &["function_declaration", "method_declaration", "type_declaration"],
            _ => &[],
        }
    }

    pub fn parse(&self, code: &str, language: &str) -> Option<Tree> {
        let lang = Self::language_for(language)?;
        let mut parser = Parser::new();
        if let Err(error) = parser.set_language(&lang) {
            warn!(%language, %error, "failed to load grammar");
            return None;
        }
        parser.parse(code, None)
    }
}

fn collect_by_kind<'a>(node: Node<'a>, kinds: &[&str], out: &mut Vec<Node<'a>>) {
    if kinds.contains(&node.kind()) {
        out.push(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_by_kind(child, kinds, out);
    }
}

fn node_name(node: Node<'_>, source: &str) -> Option<String> {
    node.child_by_field_name("name")
        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
        .map(str::to_string)
}

fn node_text(node: Node<'_>, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or("").to_string()
}

impl CodeAnalyzer for TreeSitterAnalyzer {
    fn supports(&self, language: &str) -> bool {
        Self::language_for(language).is_some()
    }

    fn syntax_valid(&self, code: &str, language: &str) -> Option<bool> {
        let tree = self.parse(code, language)?;
        Some(!tree.root_node().has_error())
    }

    fn functions(&self, code: &str, language: &str) -> Vec<FunctionSpan> {
        let Some(tree) = self.parse(code, language) else {
            return Vec::new();
        };
        let kinds = Self::function_kinds(language);
        let mut nodes = Vec::new();
        collect_by_kind(tree.root_node(), kinds, &mut nodes);

        nodes
            .into_iter()
            .filter_map(|node| {
                let name = node_name(node, code)?;
                Some(FunctionSpan {
                    name,
                    start_line: node.start_position().row,
                    end_line: node.end_position().row,
                    text: node_text(node, code),
                })
            })
            .collect()
    }

    fn enclosing_block_at_line(
        &self,
        code: &str,
        language: &str,
        line: usize,
    ) -> Option<String> {
        let tree = self.parse(code, language)?;
        let point = Point::new(line, 0);
        let mut node = tree
            .root_node()
            .named_descendant_for_point_range(point, point)?;

        let blocks = Self::block_kinds(language);
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if blocks.contains(&current.kind()) {
                return Some(node_text(current, code));
            }
            cursor = current.parent();
        }
        // No enclosing block; fall back to the smallest node at the line.
        if node.kind() == "module" || node.kind() == "source_file" {
            return None;
        }
        while let Some(parent) = node.parent() {
            if parent.start_position().row != line {
                break;
            }
            node = parent;
        }
        Some(node_text(node, code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PYTHON: &str = "def alpha():\n    return 1\n\n\nclass Widget:\n    def beta(self):\n        return 2\n";

    #[test]
    fn finds_python_functions_with_spans() {
        let analyzer = TreeSitterAnalyzer::new();
        let functions = analyzer.functions(PYTHON, "python");
        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(functions[0].start_line, 0);
    }

    #[test]
    fn find_function_extracts_only_that_function() {
        let analyzer = TreeSitterAnalyzer::new();
        let text = analyzer.find_function(PYTHON, "python", "beta").unwrap();
        assert!(text.contains("return 2"));
        assert!(!text.contains("return 1"));
    }

    #[test]
    fn syntax_validity_gates_broken_code() {
        let analyzer = TreeSitterAnalyzer::new();
        assert_eq!(analyzer.syntax_valid(PYTHON, "python"), Some(true));
        assert_eq!(
            analyzer.syntax_valid("def broken(:\n    pass\n", "python"),
            Some(false)
        );
        assert_eq!(analyzer.syntax_valid("anything", "cobol"), None);
    }

    #[test]
    fn enclosing_block_finds_the_surrounding_function() {
        let analyzer = TreeSitterAnalyzer::new();
        let block = analyzer
            .enclosing_block_at_line(PYTHON, "python", 1)
            .unwrap();
        assert!(block.starts_with("def alpha"));
    }

    #[test]
    fn all_five_grammars_load() {
        let analyzer = TreeSitterAnalyzer::new();
        let samples = [
            ("python", "def f():\n    pass\n"),
            ("javascript", "function f() { return 1; }\n"),
            ("typescript", "function f(): number { return 1; }\n"),
            ("rust", "fn f() -> u32 { 1 }\n"),
            ("go", "package main\n\nfunc f() int { return 1 }\n"),
        ];
        for (language, code) in samples {
            assert_eq!(
                analyzer.syntax_valid(code, language),
                Some(true),
                "grammar failed for {language}"
            );
            assert_eq!(analyzer.functions(code, language).len(), 1, "{language}");
        }
    }
}
