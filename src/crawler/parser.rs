//! HTML parsing: outgoing links for discovery, structured section records for
//! extraction
//!
//! Section pages carry their position in the Title / Division / Chapter /
//! Subchapter / Article hierarchy in a breadcrumb trail; the body is converted
//! to Markdown, the canonical content representation.

use crate::storage::SectionRecord;
use chrono::Utc;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use url::Url;

/// Extracts all followable links from a page, resolved to absolute URLs
///
/// Skips `javascript:`, `mailto:`, `tel:`, and `data:` links, fragment-only
/// anchors, download links, and anything that does not resolve to HTTP(S).
pub fn extract_links(html: &str, base_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, base_url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    // Fragment-only links are same-page anchors
    if href.starts_with('#') {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

/// Parses a section page into a complete [`SectionRecord`]
///
/// Pulls the breadcrumb trail and splits it into the named hierarchy fields,
/// finds the section heading and number (falling back to the URL and then the
/// breadcrumb), synthesizes the citation, and converts the main content region
/// to Markdown.
///
/// # Errors
///
/// Returns a message describing what was missing when the page does not look
/// like a section document (no heading, no content region, or a body the
/// Markdown converter rejects).
pub fn parse_section_page(html: &str, source_url: &str) -> Result<SectionRecord, String> {
    let document = Html::parse_document(html);

    let breadcrumb_path = extract_breadcrumb_path(&document);
    let hierarchy = split_breadcrumb(&breadcrumb_path);

    let heading = extract_heading(&document)
        .ok_or_else(|| "no section heading found in page".to_string())?;

    let section_number = extract_section_number(&heading)
        .or_else(|| section_number_from_url(source_url))
        .or_else(|| extract_section_number(&breadcrumb_path))
        .unwrap_or_else(|| "unknown".to_string());

    let citation = build_citation(hierarchy.title_number, &section_number);

    let content = extract_content_markdown(&document)?;

    Ok(SectionRecord {
        title_number: hierarchy.title_number,
        title_name: hierarchy.title_name,
        division: hierarchy.division,
        chapter: hierarchy.chapter,
        subchapter: hierarchy.subchapter,
        article: hierarchy.article,
        section_number,
        section_heading: heading,
        citation,
        breadcrumb_path,
        source_url: source_url.to_string(),
        content,
        retrieved_at: Utc::now(),
    })
}

/// Hierarchy levels parsed out of a breadcrumb trail; every level is optional
#[derive(Debug, Default, PartialEq)]
struct Hierarchy {
    title_number: Option<u32>,
    title_name: Option<String>,
    division: Option<String>,
    chapter: Option<String>,
    subchapter: Option<String>,
    article: Option<String>,
}

/// Finds the breadcrumb container and joins its text into a ` > ` trail
fn extract_breadcrumb_path(document: &Html) -> String {
    const BREADCRUMB_SELECTORS: &[&str] = &[
        r#"nav[class*="breadcrumb"]"#,
        r#"nav[class*="navigation"]"#,
        r#"ol[class*="breadcrumb"]"#,
        r#"ul[class*="breadcrumb"]"#,
        r#"div[class*="breadcrumb"]"#,
    ];

    for raw in BREADCRUMB_SELECTORS {
        if let Ok(selector) = Selector::parse(raw) {
            if let Some(element) = document.select(&selector).next() {
                let parts: Vec<String> = element
                    .text()
                    .map(|chunk| chunk.trim())
                    .filter(|chunk| !chunk.is_empty() && *chunk != ">")
                    .map(|chunk| chunk.to_string())
                    .collect();
                return parts.join(" > ");
            }
        }
    }

    String::new()
}

/// Splits a breadcrumb trail into named hierarchy fields
///
/// Each ` > `-separated part is keyword-matched; the first match per level
/// wins. Subchapter is checked before chapter since every subchapter label
/// also contains "chapter".
fn split_breadcrumb(breadcrumb: &str) -> Hierarchy {
    let mut hierarchy = Hierarchy {
        title_number: extract_title_number(breadcrumb),
        ..Hierarchy::default()
    };

    for part in breadcrumb.split('>') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let lower = part.to_lowercase();

        if lower.contains("title") {
            if hierarchy.title_name.is_none() {
                hierarchy.title_name = Some(part.to_string());
            }
        } else if lower.contains("division") {
            if hierarchy.division.is_none() {
                hierarchy.division = Some(part.to_string());
            }
        } else if lower.contains("subchapter") {
            if hierarchy.subchapter.is_none() {
                hierarchy.subchapter = Some(part.to_string());
            }
        } else if lower.contains("chapter") {
            if hierarchy.chapter.is_none() {
                hierarchy.chapter = Some(part.to_string());
            }
        } else if lower.contains("article") && hierarchy.article.is_none() {
            hierarchy.article = Some(part.to_string());
        }
    }

    hierarchy
}

/// Extracts the title number from breadcrumb or heading text (`Title 17`)
fn extract_title_number(text: &str) -> Option<u32> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)Title\s+(\d+)").expect("valid title pattern"));

    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Extracts a section number from free text
///
/// Tries `§ 1234`, `Section 1234`, and `sec. 1234` forms before falling back
/// to a bare number of at least three digits (portal section numbers; two
/// digits would catch title numbers).
fn extract_section_number(text: &str) -> Option<String> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            r"§\s*(\d+(?:\.\d+)?)",
            r"(?i)\bSection\s+(\d+(?:\.\d+)?)",
            r"(?i)\bsec\.\s*(\d+(?:\.\d+)?)",
            r"\b(\d{3,}(?:\.\d+)?)\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid section pattern"))
        .collect()
    });

    for re in patterns {
        if let Some(caps) = re.captures(text) {
            if let Some(m) = caps.get(1) {
                return Some(m.as_str().to_string());
            }
        }
    }

    None
}

/// Extracts a section number hint from the URL path, when present
fn section_number_from_url(url: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"[/\-](\d{4,}(?:\.\d+)?)(?:[/?#]|$)").expect("valid url pattern")
    });

    re.captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Builds the standard citation string (`17 CCR § 1234`)
fn build_citation(title_number: Option<u32>, section_number: &str) -> String {
    if section_number == "unknown" {
        return "CCR (unknown section)".to_string();
    }

    match title_number {
        Some(title) => format!("{} CCR § {}", title, section_number),
        None => format!("CCR § {}", section_number),
    }
}

/// Finds the section heading: a classed h1/h2 first, then any h1/h2
fn extract_heading(document: &Html) -> Option<String> {
    const HEADING_SELECTORS: &[&str] = &[
        r#"h1[class*="section"], h2[class*="section"]"#,
        r#"h1[class*="heading"], h2[class*="heading"]"#,
        r#"h1[class*="title"], h2[class*="title"]"#,
        "h1, h2",
    ];

    for raw in HEADING_SELECTORS {
        if let Ok(selector) = Selector::parse(raw) {
            if let Some(element) = document.select(&selector).next() {
                let text = element.text().collect::<String>().trim().to_string();
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }

    None
}

/// Selects the main content region and converts it to Markdown
fn extract_content_markdown(document: &Html) -> Result<String, String> {
    const CONTENT_SELECTORS: &[&str] = &[
        r#"div[class*="section-content"]"#,
        r#"div[class*="content"]"#,
        r#"div[class*="body"]"#,
        "main",
        "article",
        "body",
    ];

    let region = CONTENT_SELECTORS
        .iter()
        .filter_map(|raw| Selector::parse(raw).ok())
        .find_map(|selector| document.select(&selector).next())
        .ok_or_else(|| "no content region found in page".to_string())?;

    html_to_markdown(&region)
}

/// Converts an HTML region to Markdown, dropping chrome elements
fn html_to_markdown(region: &ElementRef) -> Result<String, String> {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec![
            "script", "style", "nav", "header", "footer", "iframe", "noscript",
        ])
        .build();

    converter
        .convert(&region.html())
        .map(|markdown| markdown.trim().to_string())
        .map_err(|e| format!("markdown conversion failed: {}", e))
}
