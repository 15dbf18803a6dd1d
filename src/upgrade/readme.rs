//! Release notes fetched from the repository's `readme.txt`.
//!
//! The canonical readme uses section markers of the form `== Heading ==`.
//! The description and changelog sections back `upgrade --changelog` and
//! the `info` command when a release carries no notes of its own.

use anyhow::{Context, Result};
use tracing::debug;

use crate::constants::{GITHUB_OWNER, GITHUB_REPO, GITHUB_TIMEOUT, USER_AGENT};

/// Sections pulled out of a readme document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadmeSections {
    pub description: Option<String>,
    pub changelog: Option<String>,
}

/// Fetch `readme.txt` from the stable branch on GitHub.
pub async fn fetch_readme() -> Result<String> {
    let url = format!(
        "https://raw.githubusercontent.com/{GITHUB_OWNER}/{GITHUB_REPO}/stable/readme.txt"
    );
    debug!("fetching readme from {url}");

    let client = reqwest::Client::builder()
        .timeout(GITHUB_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .context("failed to build HTTP client")?;
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("failed to fetch {url}"))?
        .error_for_status()
        .with_context(|| format!("failed to fetch {url}"))?;
    response.text().await.context("failed to read readme body")
}

/// Extract the description and changelog sections.
pub fn parse_sections(readme: &str) -> ReadmeSections {
    ReadmeSections {
        description: extract_section(readme, "Description"),
        changelog: extract_section(readme, "Changelog"),
    }
}

/// Text between `== {heading} ==` and the next `== ... ==` marker.
fn extract_section(readme: &str, heading: &str) -> Option<String> {
    let marker = format!("== {heading} ==");
    let mut lines = readme.lines();
    lines.by_ref().find(|line| line.trim() == marker)?;

    let body: Vec<&str> = lines.take_while(|line| !is_section_marker(line)).collect();
    let body = body.join("\n").trim().to_string();
    (!body.is_empty()).then_some(body)
}

fn is_section_marker(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() > 4 && trimmed.starts_with("== ") && trimmed.ends_with(" ==")
}

/// Rewrite readme subheadings (`= 1.2 =`) as markdown (`## 1.2`).
pub fn markdown_lite(section: &str) -> String {
    section
        .lines()
        .map(|line| {
            let trimmed = line.trim();
            if trimmed.len() > 2
                && trimmed.starts_with("= ")
                && trimmed.ends_with(" =")
                && !trimmed.starts_with("==")
            {
                format!("## {}", &trimmed[2..trimmed.len() - 2])
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
