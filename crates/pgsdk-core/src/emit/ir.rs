//! # Emitter IR
//!
//! The emitters build files out of a small declaration-level IR instead of
//! splicing template text. The IR is the portable artifact: every generated
//! file is a `RustFile` of items, rendered by one formatter, so layout,
//! indentation, and header conventions stay identical across the artifact
//! set — and hermetic across runs.

use std::fmt::Write as _;

/// One generated file, relative to its output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

/// A Rust source file under construction.
#[derive(Debug, Default)]
pub struct RustFile {
    /// `//!` header lines (without the marker).
    pub header: Vec<String>,
    pub uses: Vec<String>,
    pub items: Vec<Item>,
}

#[derive(Debug)]
pub enum Item {
    Struct(StructDef),
    Fn(FnDef),
    Mod { name: String },
    Const { name: String, ty: String, value: String },
    Raw(String),
}

#[derive(Debug)]
pub struct StructDef {
    pub doc: Option<String>,
    pub derives: Vec<String>,
    /// Container-level attributes, e.g. `serde(deny_unknown_fields)`.
    pub attrs: Vec<String>,
    pub name: String,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug)]
pub struct FieldDef {
    pub attrs: Vec<String>,
    pub name: String,
    pub ty: String,
}

#[derive(Debug)]
pub struct FnDef {
    pub doc: Option<String>,
    /// Full signature up to the opening brace, e.g.
    /// `pub fn registry() -> ApiRegistry`.
    pub signature: String,
    /// Body lines, rendered at one indent level.
    pub body: Vec<String>,
}

impl RustFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, lines: &[&str]) -> Self {
        self.header = lines.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn use_(mut self, path: &str) -> Self {
        self.uses.push(path.to_string());
        self
    }

    pub fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.header {
            if line.is_empty() {
                out.push_str("//!\n");
            } else {
                let _ = writeln!(out, "//! {line}");
            }
        }
        if !self.header.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "{GENERATED_BANNER}");
        out.push('\n');
        for use_ in &self.uses {
            let _ = writeln!(out, "use {use_};");
        }
        if !self.uses.is_empty() {
            out.push('\n');
        }
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            render_item(&mut out, item);
        }
        out
    }
}

/// Marker line; the driver refuses to overwrite directories whose files
/// don't carry it.
pub const GENERATED_BANNER: &str = "// @generated by pgsdk — do not edit by hand";

fn render_item(out: &mut String, item: &Item) {
    match item {
        Item::Struct(def) => {
            if let Some(doc) = &def.doc {
                for line in doc.lines() {
                    let _ = writeln!(out, "/// {line}");
                }
            }
            if !def.derives.is_empty() {
                let _ = writeln!(out, "#[derive({})]", def.derives.join(", "));
            }
            for attr in &def.attrs {
                let _ = writeln!(out, "#[{attr}]");
            }
            let _ = writeln!(out, "pub struct {} {{", def.name);
            for field in &def.fields {
                for attr in &field.attrs {
                    let _ = writeln!(out, "    #[{attr}]");
                }
                let _ = writeln!(out, "    pub {}: {},", field.name, field.ty);
            }
            let _ = writeln!(out, "}}");
        }
        Item::Fn(def) => {
            if let Some(doc) = &def.doc {
                for line in doc.lines() {
                    let _ = writeln!(out, "/// {line}");
                }
            }
            let _ = writeln!(out, "{} {{", def.signature);
            for line in &def.body {
                if line.is_empty() {
                    out.push('\n');
                } else {
                    let _ = writeln!(out, "    {line}");
                }
            }
            let _ = writeln!(out, "}}");
        }
        Item::Mod { name } => {
            let _ = writeln!(out, "pub mod {name};");
        }
        Item::Const { name, ty, value } => {
            let _ = writeln!(out, "pub const {name}: {ty} = {value};");
        }
        Item::Raw(text) => {
            let _ = writeln!(out, "{text}");
        }
    }
}

/// `book_tags` → `BookTags`.
pub fn pascal_case(name: &str) -> String {
    name.split(['_', '-'])
        .filter(|p| !p.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Make a table/column name usable as a Rust identifier. Returns the
/// (possibly escaped) identifier and whether a serde rename is required.
pub fn rust_ident(name: &str) -> (String, bool) {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident
        .chars()
        .next()
        .map(|c| c.is_ascii_digit())
        .unwrap_or(true)
    {
        ident = format!("_{ident}");
    }
    let changed = ident != name;
    if RESERVED.contains(&ident.as_str()) {
        return (format!("r#{ident}"), changed);
    }
    (ident, changed)
}

const RESERVED: &[&str] = &[
    "as", "async", "await", "box", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "static", "struct", "super", "trait", "true", "type",
    "unsafe", "use", "where", "while", "yield",
];

/// Render a Rust string literal. Uses a raw string with enough `#`s when
/// the content has characters a plain literal would mangle.
pub fn string_literal(content: &str) -> String {
    if !content.contains(['"', '\\', '\n']) {
        return format!("\"{content}\"");
    }
    let mut hashes = 1;
    while content.contains(&format!("\"{}", "#".repeat(hashes))) {
        hashes += 1;
    }
    let fence = "#".repeat(hashes);
    format!("r{fence}\"{content}\"{fence}")
}
