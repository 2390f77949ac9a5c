//! Manifest assembler: embeds the emitted client files into the server as
//! a path → contents map, powering the SDK pull endpoints.

use crate::emit::ir::{string_literal, FnDef, GeneratedFile, Item, RustFile};

/// `manifest.rs` on the server side.
pub fn manifest_module(version: &str, generated_at: &str, client_files: &[GeneratedFile]) -> RustFile {
    let mut file = RustFile::new()
        .header(&[
            "Embedded client SDK bundle. `GET /_psdk/sdk/manifest` lists the",
            "paths; `GET /_psdk/sdk/download` returns the full contents.",
        ])
        .use_("indexmap::IndexMap")
        .use_("pgsdk_runtime::http::SdkManifest");

    let mut body = Vec::new();
    body.push("let mut files: IndexMap<String, String> = IndexMap::new();".to_string());
    for f in client_files {
        body.push(format!(
            "files.insert({}.to_string(), {}.to_string());",
            string_literal(&f.path),
            string_literal(&f.content),
        ));
    }
    body.push("SdkManifest {".to_string());
    body.push(format!(
        "    version: {}.to_string(),",
        string_literal(version)
    ));
    body.push(format!(
        "    generated: {}.to_string(),",
        string_literal(generated_at)
    ));
    body.push("    files,".to_string());
    body.push("}".to_string());

    file.push(Item::Fn(FnDef {
        doc: Some("The SDK bundle this server was generated with.".to_string()),
        signature: "pub fn sdk_manifest() -> SdkManifest".to_string(),
        body,
    }));
    file
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_embeds_files() {
        let files = vec![
            GeneratedFile {
                path: "mod.rs".to_string(),
                content: "pub mod clients;\n".to_string(),
            },
            GeneratedFile {
                path: "clients/authors.rs".to_string(),
                content: "// client with \"quotes\"\n".to_string(),
            },
        ];
        let out = manifest_module("0.3.0", "2025-01-01T00:00:00Z", &files).render();
        assert!(out.contains("pub fn sdk_manifest() -> SdkManifest"));
        assert!(out.contains("files.insert(\"mod.rs\".to_string()"));
        assert!(out.contains("clients/authors.rs"));
        // content with quotes and newlines rides in a raw string
        assert!(out.contains("r#\""));
    }
}
