use std::collections::BTreeMap;
use std::path::{Component, Path};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::args::PullArgs;

#[derive(Debug, Deserialize)]
struct SdkDownload {
    version: String,
    generated: String,
    files: BTreeMap<String, String>,
}

/// Fetch `/_psdk/sdk/download` from a running generated server and
/// re-materialize the SDK files on disk.
pub async fn run(args: &PullArgs) -> Result<()> {
    let url = format!("{}/_psdk/sdk/download", args.url.trim_end_matches('/'));
    let client = reqwest::Client::new();

    let mut request = client.get(&url);
    if let Some(token) = &args.token {
        request = request.bearer_auth(token);
    }
    let response = request.send().await.context("requesting SDK bundle")?;

    match response.status().as_u16() {
        200 => {}
        401 => bail!("unauthorized: the server requires a pull token (--token or PGSDK_PULL_TOKEN)"),
        status => bail!("server returned {status} for {url}"),
    }

    let bundle: SdkDownload = response.json().await.context("decoding SDK bundle")?;

    let out_dir = Path::new(&args.out);
    let mut written = 0usize;
    for (rel_path, content) in &bundle.files {
        if !is_safe_relative(rel_path) {
            bail!("bundle contains an unsafe path: {rel_path}");
        }
        let path = out_dir.join(rel_path);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
        written += 1;
    }

    println!(
        "Pulled SDK {} (generated {}): {} files into {}",
        bundle.version,
        bundle.generated,
        written,
        out_dir.display()
    );
    Ok(())
}

/// Reject absolute paths and `..` components before writing.
fn is_safe_relative(path: &str) -> bool {
    let p = Path::new(path);
    !p.is_absolute()
        && p.components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
