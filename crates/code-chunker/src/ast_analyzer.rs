use crate::error::{ChunkerError, Result};
use crate::language::Language;
use crate::registry::MethodExtractor;
use crate::types::MethodNode;
use tree_sitter::{Node, Parser, Tree};

/// Node kinds that drive method extraction for one grammar
#[derive(Debug, Clone, Copy)]
pub struct NodeKinds {
    /// Nodes emitted as methods. The walk does not descend into them.
    pub methods: &'static [&'static str],
    /// Sibling kinds collected as the doc comment
    pub comments: &'static [&'static str],
    /// Sibling kinds allowed between a doc comment and its method
    pub passthrough: &'static [&'static str],
}

impl NodeKinds {
    pub fn for_language(language: Language) -> Option<Self> {
        let kinds = match language {
            Language::Rust => Self {
                methods: &["function_item"],
                comments: &["line_comment", "block_comment"],
                passthrough: &["attribute_item"],
            },
            Language::JavaScript => Self {
                methods: &[
                    "function_declaration",
                    "generator_function_declaration",
                    "method_definition",
                ],
                comments: &["comment"],
                passthrough: &[],
            },
            Language::TypeScript | Language::Tsx => Self {
                methods: &[
                    "function_declaration",
                    "generator_function_declaration",
                    "method_definition",
                ],
                comments: &["comment"],
                passthrough: &["decorator"],
            },
            Language::Go => Self {
                methods: &["function_declaration", "method_declaration"],
                comments: &["comment"],
                passthrough: &[],
            },
            Language::Java => Self {
                methods: &["method_declaration", "constructor_declaration"],
                comments: &["block_comment", "line_comment"],
                passthrough: &[],
            },
            Language::C | Language::Cpp => Self {
                methods: &["function_definition"],
                comments: &["comment"],
                passthrough: &[],
            },
            Language::CSharp => Self {
                methods: &["method_declaration", "constructor_declaration"],
                comments: &["comment"],
                passthrough: &["attribute_list"],
            },
            Language::Ruby => Self {
                methods: &["method", "singleton_method"],
                comments: &["comment"],
                passthrough: &[],
            },
            Language::Kotlin => Self {
                methods: &["function_declaration", "secondary_constructor"],
                comments: &["line_comment", "block_comment"],
                passthrough: &[],
            },
            Language::Python | Language::Haskell | Language::Unknown => return None,
        };
        Some(kinds)
    }
}

fn parse_tree(language: Language, source: &str) -> Result<Tree> {
    let ts_language = language.tree_sitter_language()?;
    let mut parser = Parser::new();
    parser
        .set_language(&ts_language)
        .map_err(|e| ChunkerError::tree_sitter(format!("Failed to set language: {e}")))?;

    parser
        .parse(source, None)
        .ok_or_else(|| ChunkerError::parse(format!("Failed to parse {language} source")))
}

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    source.get(node.byte_range()).unwrap_or_default()
}

fn method_node(node: Node, source: &str, name: Option<String>, doc_comment: Option<String>) -> MethodNode {
    MethodNode {
        name,
        doc_comment,
        source: node_text(node, source).to_string(),
        start_line: node.start_position().row + 1,
    }
}

/// Generic extractor: walks the tree and emits every node of a method kind.
pub struct TreeSitterExtractor {
    language: Language,
    kinds: NodeKinds,
}

impl TreeSitterExtractor {
    pub fn new(language: Language, kinds: NodeKinds) -> Self {
        Self { language, kinds }
    }

    /// Built-in extractor for the language, `None` for Python, Haskell and
    /// unknown files
    pub fn for_language(language: Language) -> Option<Self> {
        NodeKinds::for_language(language).map(|kinds| Self::new(language, kinds))
    }

    fn walk(&self, node: Node, source: &str, out: &mut Vec<MethodNode>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if self.kinds.methods.contains(&child.kind()) {
                let name = self.method_name(child, source);
                let doc = preceding_comments(child, source, &self.kinds);
                out.push(method_node(child, source, name, doc));
            } else {
                self.walk(child, source, out);
            }
        }
    }

    fn method_name(&self, node: Node, source: &str) -> Option<String> {
        match self.language {
            Language::C | Language::Cpp => declarator_name(node, source),
            _ => node
                .child_by_field_name("name")
                .map(|name| node_text(name, source).to_string()),
        }
    }
}

/// Contiguous comment siblings directly above `node`.
fn preceding_comments(node: Node, source: &str, kinds: &NodeKinds) -> Option<String> {
    let mut comments = Vec::new();
    let mut boundary_row = node.start_position().row;
    let mut sibling = node.prev_named_sibling();

    while let Some(prev) = sibling {
        let kind = prev.kind();
        let adjacent = last_row(prev) + 1 >= boundary_row;
        if !adjacent {
            break;
        }
        if kinds.comments.contains(&kind) {
            comments.push(node_text(prev, source).trim_end().to_string());
        } else if !kinds.passthrough.contains(&kind) {
            break;
        }
        boundary_row = prev.start_position().row;
        sibling = prev.prev_named_sibling();
    }

    if comments.is_empty() {
        return None;
    }
    comments.reverse();
    Some(comments.join("\n"))
}

/// Row of the last character; line doc comments own their trailing newline.
fn last_row(node: Node) -> usize {
    let end = node.end_position();
    if end.column == 0 && end.row > node.start_position().row {
        end.row - 1
    } else {
        end.row
    }
}

/// Follows `declarator` fields through pointer and reference wrappers until
/// the function declarator, whose own declarator is the name.
fn declarator_name(node: Node, source: &str) -> Option<String> {
    let mut current = node.child_by_field_name("declarator")?;
    loop {
        match current.kind() {
            "function_declarator" => {
                let name = current.child_by_field_name("declarator")?;
                return Some(node_text(name, source).to_string());
            }
            "pointer_declarator" | "reference_declarator" | "parenthesized_declarator" => {
                let next = match current.child_by_field_name("declarator") {
                    Some(next) => next,
                    None => {
                        let mut cursor = current.walk();
                        let first = current.named_children(&mut cursor).next()?;
                        first
                    }
                };
                current = next;
            }
            _ => return None,
        }
    }
}

impl MethodExtractor for TreeSitterExtractor {
    fn language(&self) -> Language {
        self.language
    }

    fn extract(&self, source: &str) -> Result<Vec<MethodNode>> {
        let tree = parse_tree(self.language, source)?;
        let mut methods = Vec::new();
        self.walk(tree.root_node(), source, &mut methods);
        Ok(methods)
    }
}

/// Python extractor: module-level functions and the methods of module-level
/// classes. The docstring stays in the method source and is also reported
/// as the doc comment.
pub struct PythonExtractor;

impl PythonExtractor {
    /// Unwraps `@decorator` wrappers to the inner definition.
    fn definition(node: Node) -> Node {
        if node.kind() == "decorated_definition" {
            if let Some(inner) = node.child_by_field_name("definition") {
                return inner;
            }
        }
        node
    }

    fn function(node: Node, source: &str) -> MethodNode {
        let name = node
            .child_by_field_name("name")
            .map(|name| node_text(name, source).to_string());
        method_node(node, source, name, Self::docstring(node, source))
    }

    fn docstring(node: Node, source: &str) -> Option<String> {
        let body = node.child_by_field_name("body")?;
        let mut cursor = body.walk();
        let first = body.named_children(&mut cursor).next()?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let mut inner_cursor = first.walk();
        let literal = first.named_children(&mut inner_cursor).next()?;
        (literal.kind() == "string").then(|| node_text(literal, source).to_string())
    }
}

impl MethodExtractor for PythonExtractor {
    fn language(&self) -> Language {
        Language::Python
    }

    fn extract(&self, source: &str) -> Result<Vec<MethodNode>> {
        let tree = parse_tree(Language::Python, source)?;
        let root = tree.root_node();
        let mut methods = Vec::new();

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            let definition = Self::definition(child);
            match definition.kind() {
                "function_definition" => methods.push(Self::function(definition, source)),
                "class_definition" => {
                    let Some(body) = definition.child_by_field_name("body") else {
                        continue;
                    };
                    let mut body_cursor = body.walk();
                    for member in body.named_children(&mut body_cursor) {
                        let member = Self::definition(member);
                        if member.kind() == "function_definition" {
                            methods.push(Self::function(member, source));
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(methods)
    }
}

/// Haskell extractor: top-level bindings with their type signature.
///
/// A signature and the equations that follow it under the same name become
/// one method, so `fact 0 = 1` and `fact n = ...` are not split apart.
pub struct HaskellExtractor;

impl HaskellExtractor {
    const KINDS: NodeKinds = NodeKinds {
        methods: &["signature", "function", "bind"],
        comments: &["comment", "haddock"],
        passthrough: &[],
    };

    fn binding_name(node: Node, source: &str) -> Option<String> {
        if !Self::KINDS.methods.contains(&node.kind()) {
            return None;
        }
        node.child_by_field_name("name")
            .map(|name| node_text(name, source).to_string())
    }

    fn group(first: Node, last: Node, name: String, source: &str) -> MethodNode {
        MethodNode {
            name: Some(name),
            doc_comment: preceding_comments(first, source, &Self::KINDS),
            source: source
                .get(first.start_byte()..last.end_byte())
                .unwrap_or_default()
                .trim_end()
                .to_string(),
            start_line: first.start_position().row + 1,
        }
    }
}

impl MethodExtractor for HaskellExtractor {
    fn language(&self) -> Language {
        Language::Haskell
    }

    fn extract(&self, source: &str) -> Result<Vec<MethodNode>> {
        let tree = parse_tree(Language::Haskell, source)?;
        let Some(declarations) = tree.root_node().child_by_field_name("declarations") else {
            return Ok(Vec::new());
        };

        let mut cursor = declarations.walk();
        let nodes: Vec<Node> = declarations.named_children(&mut cursor).collect();
        let mut methods = Vec::new();
        let mut i = 0;

        while i < nodes.len() {
            let first = nodes[i];
            let Some(name) = Self::binding_name(first, source) else {
                i += 1;
                continue;
            };

            let mut last = first;
            let mut equations = usize::from(first.kind() != "signature");
            let mut j = i + 1;
            while let Some(&next) = nodes.get(j) {
                let same_binding = next.kind() != "signature"
                    && Self::binding_name(next, source).as_deref() == Some(name.as_str());
                if !same_binding {
                    break;
                }
                last = next;
                equations += 1;
                j += 1;
            }

            // A signature without equations declares nothing to search.
            if equations > 0 {
                methods.push(Self::group(first, last, name, source));
            }
            i = j;
        }

        Ok(methods)
    }
}
