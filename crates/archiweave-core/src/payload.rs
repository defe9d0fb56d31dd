//! Payload extraction from Archi HTML report pages.
//!
//! A report page embeds its machine-readable model data as script arrays
//! (`dataElements.push({...});`, `dataRelationships.push({...});`,
//! `dataFolders.push(...)`, `dataFoldersContent.push(...)`,
//! `dataProperties.push(...)`) next to the human-rendered HTML, plus an image map
//! whose `<area>` order is the declared order of the view's visual nodes.
//!
//! `extract` is a pure function of the page text. It locates the embedded data,
//! decodes it into a fully validated [`Payload`] and never touches shared state;
//! callers may run it concurrently for many pages.

use crate::decode::decode_report_string;
use crate::types::{AccessType, ElementType, RelationshipType, is_non_model_tag};
use crate::{Error, Result};
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::sync::OnceLock;

/// Marker identifying a script block that carries embedded model data.
pub const PAYLOAD_MARKER: &str = "dataElements.push(";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadView {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadElement {
    pub id: String,
    pub name: String,
    pub element_type: ElementType,
    pub documentation: Option<String>,
    /// Folder path declared by the page (e.g. `Business/Actors`), when present.
    pub folder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadRelationship {
    pub id: String,
    pub relationship_type: RelationshipType,
    pub source: String,
    pub target: String,
    pub name: Option<String>,
    pub documentation: Option<String>,
    pub access_type: Option<AccessType>,
    pub folder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadFolder {
    pub id: String,
    pub name: String,
    /// Raw folder kind tag (`Folder`, or `ArchimateModel` for the virtual root).
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadFolderContent {
    pub folder: String,
    pub content: String,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayloadProperty {
    pub element: String,
    pub key: String,
    pub value: String,
}

/// Decoded, validated intermediate representation of one report page.
///
/// The builder can assume this shape without re-validating: every record carries
/// an identity, every type tag went through the closed vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    pub view: PayloadView,
    pub elements: Vec<PayloadElement>,
    pub relationships: Vec<PayloadRelationship>,
    pub folders: Vec<PayloadFolder>,
    pub folder_contents: Vec<PayloadFolderContent>,
    pub properties: Vec<PayloadProperty>,
    /// Element ids in declared visual order (image-map `<area>` order, first
    /// sighting wins; falls back to element declaration order).
    pub node_order: Vec<String>,
}

fn script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script[^>]*>(.*?)</script>").expect("valid regex"))
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"))
}

fn map_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)<map\s[^>]*?name\s*=\s*"([^"]+)""#).expect("valid regex"))
}

fn area_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<area\b[^>]*>").expect("valid regex"))
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)([a-z]+)\s*=\s*"([^"]*)""#).expect("valid regex"))
}

fn href_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(id-[A-Za-z0-9-]+)\.html").expect("valid regex"))
}

fn field_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z]+)\s*:\s*(?:decodeURL\(\s*)?"((?:[^"\\]|\\.)*)""#)
            .expect("valid regex")
    })
}

/// Extracts the embedded model payload from one report page.
///
/// Fails with [`Error::PayloadNotFound`] when no script block carries the data
/// marker, and with [`Error::MalformedPayload`] when a marker is present but the
/// data cannot be decoded (truncated records, missing required fields).
pub fn extract(page_text: &str) -> Result<Payload> {
    let blocks = script_blocks(page_text);

    let candidates: Vec<(usize, &str)> = blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| b.contains(PAYLOAD_MARKER))
        .map(|(i, b)| (i, *b))
        .collect();
    if candidates.is_empty() {
        return Err(Error::PayloadNotFound);
    }

    // Pages can contain more than one script block mentioning the marker (inline
    // viewers, commented-out data). The payload block is the first candidate that
    // yields at least one well-formed record carrying the required `id` field.
    let Some(&(chosen_idx, block)) = candidates
        .iter()
        .find(|(_, b)| has_well_formed_element_record(b))
    else {
        return Err(Error::malformed(
            "payload marker present but no well-formed dataElements record",
        ));
    };
    if chosen_idx != candidates[0].0 {
        tracing::debug!(
            chosen = chosen_idx,
            first_candidate = candidates[0].0,
            "disambiguated embedded payload among multiple marker candidates"
        );
    }

    let element_records = push_records(block, "dataElements")?;
    let relationship_records = push_records(block, "dataRelationships")?;
    let folder_records = push_records(block, "dataFolders")?;
    let folder_content_records = push_records(block, "dataFoldersContent")?;
    let property_records = push_records(block, "dataProperties")?;

    let mut first_record_id: Option<String> = None;
    let mut elements = Vec::new();
    for record in &element_records {
        let id = require(record, "id", "dataElements")?;
        if first_record_id.is_none() {
            first_record_id = Some(id.clone());
        }
        let raw_type = require(record, "type", "dataElements")?;
        if is_non_model_tag(&raw_type) {
            continue;
        }
        elements.push(PayloadElement {
            id,
            name: human_text(record, "name").unwrap_or_default(),
            element_type: ElementType::from_report_tag(&raw_type)?,
            documentation: human_text(record, "documentation"),
            folder: human_text(record, "folder"),
        });
    }

    let mut relationships = Vec::new();
    for record in &relationship_records {
        let raw_type = require(record, "type", "dataRelationships")?;
        relationships.push(PayloadRelationship {
            id: require(record, "id", "dataRelationships")?,
            relationship_type: RelationshipType::from_report_tag(&raw_type)?,
            source: require(record, "source", "dataRelationships")?,
            target: require(record, "target", "dataRelationships")?,
            name: human_text(record, "name").filter(|s| !s.is_empty()),
            documentation: human_text(record, "documentation"),
            access_type: record
                .get("accesstype")
                .and_then(|raw| AccessType::from_report_tag(raw)),
            folder: human_text(record, "folder"),
        });
    }

    let mut folders = Vec::new();
    for record in &folder_records {
        folders.push(PayloadFolder {
            id: require(record, "id", "dataFolders")?,
            name: human_text(record, "name").unwrap_or_default(),
            kind: record
                .get("type")
                .cloned()
                .unwrap_or_else(|| "Folder".to_string()),
        });
    }

    let mut folder_contents = Vec::new();
    for record in &folder_content_records {
        folder_contents.push(PayloadFolderContent {
            folder: require(record, "folderid", "dataFoldersContent")?,
            content: require(record, "contentid", "dataFoldersContent")?,
            content_type: record
                .get("contenttype")
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string()),
        });
    }

    let mut properties = Vec::new();
    for record in &property_records {
        properties.push(PayloadProperty {
            element: require(record, "id", "dataProperties")?,
            key: require(record, "key", "dataProperties")?,
            value: human_text(record, "value").unwrap_or_default(),
        });
    }

    let node_order = image_map_node_order(page_text)
        .unwrap_or_else(|| elements.iter().map(|e| e.id.clone()).collect());

    let view_id = match map_name_re().captures(page_text) {
        Some(caps) => {
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            name.strip_suffix("map").unwrap_or(name).to_string()
        }
        // Data-only pages (the report's model page) have no image map; derive a
        // stable identity from the first declared record instead.
        None => format!(
            "view-from-{}",
            first_record_id.as_deref().unwrap_or("empty")
        ),
    };

    let view_name = title_re()
        .captures(page_text)
        .map(|caps| {
            decode_report_string(caps.get(1).map(|m| m.as_str()).unwrap_or_default().trim())
                .into_owned()
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Unknown View".to_string());

    Ok(Payload {
        view: PayloadView {
            id: view_id,
            name: view_name,
        },
        elements,
        relationships,
        folders,
        folder_contents,
        properties,
        node_order,
    })
}

/// Splits a page into its script bodies. Raw script content (no HTML wrapper) is
/// treated as a single block.
fn script_blocks(page_text: &str) -> Vec<&str> {
    let blocks: Vec<&str> = script_re()
        .captures_iter(page_text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    if blocks.is_empty() {
        vec![page_text]
    } else {
        blocks
    }
}

fn has_well_formed_element_record(block: &str) -> bool {
    let mut at = 0usize;
    while let Some(pos) = block[at..].find(PAYLOAD_MARKER) {
        let start = at + pos + PAYLOAD_MARKER.len();
        match record_body(&block[start..]) {
            Some((body, consumed)) => {
                if parse_fields(body).contains_key("id") {
                    return true;
                }
                at = start + consumed;
            }
            None => return false,
        }
    }
    false
}

/// Collects the record bodies of every `<array>.push({...});` call in the block.
fn push_records(block: &str, array: &str) -> Result<Vec<FxHashMap<String, String>>> {
    let needle = format!("{array}.push(");
    let mut out = Vec::new();
    let mut at = 0usize;
    while let Some(pos) = block[at..].find(&needle) {
        let start = at + pos + needle.len();
        let Some((body, consumed)) = record_body(&block[start..]) else {
            return Err(Error::malformed(format!("truncated {array} record")));
        };
        out.push(parse_fields(body));
        at = start + consumed;
    }
    Ok(out)
}

/// Scans `{ ... });` starting right after `push(`, honoring quoted strings, and
/// returns the brace body plus the number of bytes consumed. `None` means the
/// record is truncated or structurally broken.
fn record_body(rest: &str) -> Option<(&str, usize)> {
    let bytes = rest.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() || bytes[i] != b'{' {
        return None;
    }
    let body_start = i + 1;

    let mut depth = 1usize;
    let mut in_string: Option<u8> = None;
    let mut escaped = false;
    let mut j = body_start;
    let body_end = loop {
        if j >= bytes.len() {
            return None;
        }
        let b = bytes[j];
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == quote {
                in_string = None;
            }
        } else {
            match b {
                b'"' | b'\'' => in_string = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        break j;
                    }
                }
                _ => {}
            }
        }
        j += 1;
    };

    let mut k = body_end + 1;
    while k < bytes.len() && bytes[k].is_ascii_whitespace() {
        k += 1;
    }
    if k >= bytes.len() || bytes[k] != b')' {
        return None;
    }
    k += 1;
    while k < bytes.len() && bytes[k].is_ascii_whitespace() {
        k += 1;
    }
    if k >= bytes.len() || bytes[k] != b';' {
        return None;
    }

    Some((&rest[body_start..body_end], k + 1))
}

/// `key: "value"` pairs of one record body, with JS string escapes resolved.
/// `decodeURL(...)` wrappers are transparent here; URL/entity decoding is applied
/// per-field where human text is expected.
fn parse_fields(body: &str) -> FxHashMap<String, String> {
    let mut out = FxHashMap::default();
    for caps in field_re().captures_iter(body) {
        let key = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let raw = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        out.entry(key.to_ascii_lowercase())
            .or_insert_with(|| unescape_js(raw));
    }
    out
}

fn unescape_js(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn require(record: &FxHashMap<String, String>, key: &str, array: &str) -> Result<String> {
    record
        .get(key)
        .cloned()
        .ok_or_else(|| Error::malformed(format!("{array} record missing required `{key}` field")))
}

fn human_text(record: &FxHashMap<String, String>, key: &str) -> Option<String> {
    record
        .get(key)
        .map(|raw| decode_report_string(raw).into_owned())
}

/// Declared visual-node order from the page's image map. Areas referencing other
/// views (`target="view"`) and non-rect shapes are skipped, mirroring the report
/// exporter. Returns `None` when the page has no areas at all.
fn image_map_node_order(page_text: &str) -> Option<Vec<String>> {
    let mut order = Vec::new();
    let mut seen: FxHashSet<String> = FxHashSet::default();
    let mut saw_area = false;

    for m in area_re().find_iter(page_text) {
        saw_area = true;
        let mut shape = None;
        let mut href = None;
        let mut target = None;
        for caps in attr_re().captures_iter(m.as_str()) {
            let key = caps.get(1).map(|c| c.as_str().to_ascii_lowercase());
            let value = caps.get(2).map(|c| c.as_str());
            match (key.as_deref(), value) {
                (Some("shape"), Some(v)) => shape = Some(v),
                (Some("href"), Some(v)) => href = Some(v),
                (Some("target"), Some(v)) => target = Some(v),
                _ => {}
            }
        }

        if shape.is_some_and(|s| !s.eq_ignore_ascii_case("rect")) {
            continue;
        }
        if target.is_some_and(|t| t.eq_ignore_ascii_case("view")) {
            continue;
        }
        let Some(id) = href.and_then(|h| {
            href_id_re()
                .captures(h)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        }) else {
            continue;
        };
        if seen.insert(id.clone()) {
            order.push(id);
        }
    }

    saw_area.then_some(order)
}
