//! Reply & citation extractor: raw `generateContent` response in, displayable reply out.

use reqwest::Url;

use crate::chat::prompts::{NO_CLEAR_RESPONSE, SOURCES_HEADER};
use crate::chat::transcript::Citation;
use crate::llm_client::{GenerateContentResponse, GroundingSource};

/// Text and sources for one assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub sources: Vec<Citation>,
}

/// Builds the assistant reply from a successful response.
///
/// - Text: first part of the first candidate, or `NO_CLEAR_RESPONSE` when absent/empty.
/// - Sources: `groundingAttributions`, falling back to `groundingChunks`; a source
///   survives only with a non-empty title and a URI that has a hostname.
/// - A citation block is appended to the text when at least one source survives.
pub fn extract_reply(response: &GenerateContentResponse) -> Reply {
    let body = response
        .text()
        .filter(|text| !text.trim().is_empty())
        .unwrap_or(NO_CLEAR_RESPONSE);

    let sources = extract_citations(response);

    let text = if sources.is_empty() {
        body.to_string()
    } else {
        format!("{body}\n\n{}", render_citation_block(&sources))
    };

    Reply { text, sources }
}

fn extract_citations(response: &GenerateContentResponse) -> Vec<Citation> {
    let Some(metadata) = response
        .first_candidate()
        .and_then(|c| c.grounding_metadata.as_ref())
    else {
        return vec![];
    };

    let raw: &[GroundingSource] = if metadata.grounding_attributions.is_empty() {
        &metadata.grounding_chunks
    } else {
        &metadata.grounding_attributions
    };

    raw.iter().filter_map(to_citation).collect()
}

fn to_citation(source: &GroundingSource) -> Option<Citation> {
    let web = source.web.as_ref()?;
    let uri = web.uri.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
    let title = web.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
    // A URI without a hostname cannot be rendered, so the whole citation goes.
    hostname(uri)?;
    Some(Citation {
        uri: uri.to_string(),
        title: title.to_string(),
    })
}

/// Hostname of an absolute URL, e.g. `https://www.example.com/a` -> `www.example.com`.
pub fn hostname(uri: &str) -> Option<String> {
    Url::parse(uri)
        .ok()?
        .host_str()
        .filter(|h| !h.is_empty())
        .map(String::from)
}

/// Header line plus one `n. Title (hostname)` line per source, 1-indexed.
/// Callers only pass citations that already passed `hostname`.
pub fn render_citation_block(sources: &[Citation]) -> String {
    let mut lines = vec![SOURCES_HEADER.to_string()];
    for (i, source) in sources.iter().enumerate() {
        let host = hostname(&source.uri).unwrap_or_default();
        lines.push(format!("{}. {} ({})", i + 1, source.title, host));
    }
    lines.join("\n")
}
