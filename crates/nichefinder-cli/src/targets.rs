//! Target list assembly from `--url` flags and `--urls-file`.

use std::path::Path;

use anyhow::Context;

/// Site directory scraped when `categories` is given no targets.
pub(crate) const DEFAULT_DIRECTORY_URL: &str = "https://www.amazon.co.za/gp/site-directory";

/// Flag URLs first, then file URLs, each in the order given.
///
/// # Errors
///
/// Returns an error if the file cannot be read or any entry is not an
/// absolute `http`/`https` URL.
pub(crate) fn collect(urls: &[String], urls_file: Option<&Path>) -> anyhow::Result<Vec<String>> {
    let mut targets: Vec<String> = urls.iter().map(|u| u.trim().to_owned()).collect();

    if let Some(path) = urls_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read urls file {}", path.display()))?;
        targets.extend(parse_lines(&content));
    }

    for target in &targets {
        validate(target)?;
    }
    Ok(targets)
}

/// Non-empty, non-comment lines, trimmed.
fn parse_lines(content: &str) -> impl Iterator<Item = String> + '_ {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
}

fn validate(target: &str) -> anyhow::Result<()> {
    let parsed =
        url::Url::parse(target).with_context(|| format!("invalid target URL '{target}'"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => anyhow::bail!("target URL '{target}' has unsupported scheme '{other}'"),
    }
}

/// Keeps the first occurrence of each URL, preserving order.
pub(crate) fn dedupe(urls: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

pub(crate) fn print_dry_run(command: &str, targets: &[String]) {
    println!("dry-run: {command} would visit {} targets:", targets.len());
    for target in targets {
        println!("  {target}");
    }
}
