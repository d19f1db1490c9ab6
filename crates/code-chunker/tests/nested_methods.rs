use codequery_code_chunker::{Document, DocumentParser, ParserConfig};

fn parse(code: &str, filename: &str) -> Vec<Document> {
    let parser = DocumentParser::new(ParserConfig::default()).expect("valid config");
    parser
        .parse_source(code, filename, Some("c0ffee"))
        .expect("parsing failed")
}

fn method_names(docs: &[Document]) -> Vec<&str> {
    docs.iter().filter_map(Document::method_name).collect()
}

#[test]
fn extracts_methods_inside_module_impl() {
    let code = r"
mod api {
    pub struct Car;

    impl Car {
        pub fn drive(&self) {}
        fn stop(&self) {}
    }
}
";

    let docs = parse(code, "nested.rs");
    let methods = method_names(&docs);
    assert!(
        methods.contains(&"drive") && methods.contains(&"stop"),
        "expected methods inside module impl, got: {methods:?}"
    );
}

#[test]
fn real_splitter_source_has_method_documents() {
    let code = include_str!("../src/splitter.rs");

    let docs = parse(code, "crates/code-chunker/src/splitter.rs");
    let methods = method_names(&docs);
    assert!(
        methods.contains(&"split_keeping_separator") && methods.contains(&"merge"),
        "expected splitter methods, got: {methods:?}"
    );
    assert!(docs
        .iter()
        .all(|d| d.filename() == "crates/code-chunker/src/splitter.rs"));
}

#[test]
fn typescript_class_methods() {
    let code = r#"
export class Store {
  // loads everything
  load(): void {}

  save(item: string): boolean {
    return true;
  }
}

export function create(): Store {
  return new Store();
}
"#;

    let docs = parse(code, "web/store.ts");
    assert_eq!(method_names(&docs), vec!["load", "save", "create"]);
    assert!(docs[0].content.starts_with("// loads everything\nload()"));
}

#[test]
fn csharp_and_cpp_methods() {
    let csharp = r#"
namespace App {
    public class Greeter {
        // greets
        public string Hello() { return "hi"; }
    }
}
"#;
    let docs = parse(csharp, "App/Greeter.cs");
    assert_eq!(method_names(&docs), vec!["Hello"]);

    let cpp = r#"
int Widget::size() const { return 1; }

static int helper(int x) { return x; }
"#;
    let docs = parse(cpp, "src/widget.cpp");
    assert_eq!(method_names(&docs), vec!["Widget::size", "helper"]);
}
