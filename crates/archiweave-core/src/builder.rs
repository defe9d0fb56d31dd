//! Incremental graph construction from decoded payloads.
//!
//! `ingest` is the only code that mutates a [`ModelGraph`]. Exclusive access is
//! enforced through `&mut`; callers ingesting payloads for several views must
//! funnel them through one graph reference, which serializes them by
//! construction. Ingestion is infallible: the payload was fully validated at the
//! extractor boundary, so the only non-fatal outcomes are the warnings collected
//! in the report.

use crate::graph::{
    Connection, Element, ModelGraph, OrganizationKind, PendingRelationship, Property,
    Relationship, View, VisualNode,
};
use crate::payload::{Payload, PayloadFolder};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

/// Caller-supplied overrides for the payload's own view identity/title, for
/// hosts (the browsing shell) that know both out-of-band.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewContext {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngestWarning {
    /// An item was sighted again with a different declared folder path. The
    /// first-declared path is kept.
    InconsistentFolderPath {
        item: String,
        kept: String,
        ignored: String,
    },
    /// A pending relationship was dropped because its endpoints never resolved.
    DroppedPendingRelationship {
        relationship: String,
        source: String,
        target: String,
    },
}

/// Per-ingest accounting, surfaced to hosts as a page status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub view: String,
    pub new_elements: usize,
    pub duplicate_elements: usize,
    pub new_relationships: usize,
    pub duplicate_relationships: usize,
    pub new_folders: usize,
    /// Relationships still pending after this ingest completed.
    pub pending_relationships: usize,
    /// Previously pending relationships resolved during this ingest.
    pub resolved_relationships: usize,
    pub warnings: Vec<IngestWarning>,
}

pub fn ingest(graph: &mut ModelGraph, payload: &Payload) -> IngestReport {
    ingest_with_context(graph, payload, &ViewContext::default())
}

pub fn ingest_with_context(
    graph: &mut ModelGraph,
    payload: &Payload,
    context: &ViewContext,
) -> IngestReport {
    let view_id = context
        .id
        .clone()
        .unwrap_or_else(|| payload.view.id.clone());
    let view_name = context
        .name
        .clone()
        .unwrap_or_else(|| payload.view.name.clone());

    let mut report = IngestReport {
        view: view_id.clone(),
        ..Default::default()
    };
    let folders_before = graph.folder_count();

    // A later payload may have supplied endpoints that an earlier payload's
    // relationships were waiting for; settle old debts before taking new ones.
    retry_pending(graph, &mut report);

    let declared = declared_paths(payload);

    for el in &payload.elements {
        let declared_path = el
            .folder
            .as_deref()
            .or_else(|| declared.get(el.id.as_str()).map(String::as_str));

        if let Some(existing) = graph.elements.get_mut(&el.id) {
            report.duplicate_elements += 1;
            if existing.documentation.is_none() && el.documentation.is_some() {
                existing.documentation = el.documentation.clone();
            }
            check_placement(graph, &el.id, declared_path, &mut report);
        } else {
            graph.elements.insert(
                el.id.clone(),
                Element {
                    id: el.id.clone(),
                    name: el.name.clone(),
                    element_type: el.element_type,
                    documentation: el.documentation.clone(),
                    properties: Vec::new(),
                },
            );
            graph.place(
                OrganizationKind::Elements,
                declared_path.unwrap_or_default(),
                &el.id,
            );
            report.new_elements += 1;
        }
    }

    // Properties enrich whichever element they reference, whether it was first
    // seen in this payload or an earlier one. Union-fill by key, first value wins.
    for prop in &payload.properties {
        if let Some(el) = graph.elements.get_mut(&prop.element)
            && !el.properties.iter().any(|p| p.key == prop.key)
        {
            el.properties.push(Property {
                key: prop.key.clone(),
                value: prop.value.clone(),
            });
        }
    }

    for rel in &payload.relationships {
        let declared_path = rel
            .folder
            .as_deref()
            .or_else(|| declared.get(rel.id.as_str()).map(String::as_str));

        if let Some(existing) = graph.relationships.get_mut(&rel.id) {
            report.duplicate_relationships += 1;
            if existing.name.is_none() && rel.name.is_some() {
                existing.name = rel.name.clone();
            }
            if existing.documentation.is_none() && rel.documentation.is_some() {
                existing.documentation = rel.documentation.clone();
            }
            if existing.access_type.is_none() {
                existing.access_type = rel.access_type;
            }
            check_placement(graph, &rel.id, declared_path, &mut report);
        } else if graph.pending().iter().any(|p| p.relationship.id == rel.id) {
            report.duplicate_relationships += 1;
        } else {
            let record = Relationship {
                id: rel.id.clone(),
                relationship_type: rel.relationship_type,
                source: rel.source.clone(),
                target: rel.target.clone(),
                name: rel.name.clone(),
                documentation: rel.documentation.clone(),
                access_type: rel.access_type,
            };
            if graph.elements.contains_key(&rel.source) && graph.elements.contains_key(&rel.target)
            {
                graph.place(
                    OrganizationKind::Relations,
                    declared_path.unwrap_or_default(),
                    &rel.id,
                );
                graph.relationships.insert(rel.id.clone(), record);
                report.new_relationships += 1;
            } else {
                graph.push_pending(PendingRelationship {
                    relationship: record,
                    declared_folder: declared_path.map(str::to_string),
                });
            }
        }
    }

    // This payload's elements may be exactly the endpoints earlier pages'
    // relationships were waiting for; re-attempt once more now that they are in,
    // so resolution never depends on a further ingest happening.
    retry_pending(graph, &mut report);

    // One payload, one view. Re-ingesting a known view replaces its node and
    // connection lists (idempotent re-fetch) without touching anything owned by
    // the graph; the view keeps its original position in the document order.
    let mut nodes = Vec::new();
    let mut node_of_element: FxHashMap<&str, &str> = FxHashMap::default();
    for elem_id in &payload.node_order {
        if !graph.elements.contains_key(elem_id) {
            tracing::debug!(element = %elem_id, view = %view_id, "image map references unknown element; node skipped");
            continue;
        }
        let node_id = format!("{view_id}-n{}", nodes.len());
        nodes.push(VisualNode {
            id: node_id,
            element: elem_id.clone(),
            bounds: None,
        });
    }
    for node in &nodes {
        node_of_element.insert(node.element.as_str(), node.id.as_str());
    }

    let mut connections = Vec::new();
    for rel in &payload.relationships {
        if !graph.relationships.contains_key(&rel.id) {
            continue;
        }
        let (Some(source), Some(target)) = (
            node_of_element.get(rel.source.as_str()),
            node_of_element.get(rel.target.as_str()),
        ) else {
            continue;
        };
        connections.push(Connection {
            id: format!("{view_id}-c{}", connections.len()),
            relationship: rel.id.clone(),
            source: (*source).to_string(),
            target: (*target).to_string(),
        });
    }

    if let Some(existing) = graph.views.get_mut(&view_id) {
        existing.name = view_name;
        existing.nodes = nodes;
        existing.connections = connections;
    } else {
        graph.views.insert(
            view_id.clone(),
            View {
                id: view_id.clone(),
                name: view_name,
                nodes,
                connections,
            },
        );
        let view_path = declared
            .get(view_id.as_str())
            .map(String::as_str)
            .unwrap_or_default();
        graph.place(OrganizationKind::Views, view_path, &view_id);
    }

    report.pending_relationships = graph.pending().len();
    report.new_folders = graph.folder_count() - folders_before;
    report
}

/// Drops relationships that never resolved. Call once per session, after the
/// last payload has been ingested and before export.
pub fn drain_unresolved(graph: &mut ModelGraph) -> Vec<IngestWarning> {
    graph
        .take_pending()
        .into_iter()
        .map(|p| {
            tracing::warn!(
                relationship = %p.relationship.id,
                source = %p.relationship.source,
                target = %p.relationship.target,
                "dropping pending relationship with unresolved endpoints"
            );
            IngestWarning::DroppedPendingRelationship {
                relationship: p.relationship.id,
                source: p.relationship.source,
                target: p.relationship.target,
            }
        })
        .collect()
}

fn retry_pending(graph: &mut ModelGraph, report: &mut IngestReport) {
    for p in graph.take_pending() {
        let resolvable = graph.elements.contains_key(&p.relationship.source)
            && graph.elements.contains_key(&p.relationship.target);
        if resolvable {
            graph.place(
                OrganizationKind::Relations,
                p.declared_folder.as_deref().unwrap_or_default(),
                &p.relationship.id,
            );
            graph
                .relationships
                .insert(p.relationship.id.clone(), p.relationship);
            report.resolved_relationships += 1;
        } else {
            graph.push_pending(p);
        }
    }
}

fn check_placement(
    graph: &ModelGraph,
    item_id: &str,
    declared_path: Option<&str>,
    report: &mut IngestReport,
) {
    let Some(declared_path) = declared_path else {
        return;
    };
    let Some(kept) = graph.placement(item_id) else {
        return;
    };
    if kept != declared_path {
        tracing::warn!(
            item = %item_id,
            kept = %kept,
            ignored = %declared_path,
            "duplicate sighting declares a different folder path; keeping first placement"
        );
        report.warnings.push(IngestWarning::InconsistentFolderPath {
            item: item_id.to_string(),
            kept: kept.to_string(),
            ignored: declared_path.to_string(),
        });
    }
}

/// Resolves each item id mentioned by the payload's folder tables to a `/`-joined
/// folder path. The report's virtual `ArchimateModel` root folder is excluded
/// from paths, matching the exporter.
fn declared_paths(payload: &Payload) -> FxHashMap<String, String> {
    let folders: FxHashMap<&str, &PayloadFolder> = payload
        .folders
        .iter()
        .map(|f| (f.id.as_str(), f))
        .collect();
    let parent_of: FxHashMap<&str, &str> = payload
        .folder_contents
        .iter()
        .filter(|fc| folders.contains_key(fc.content.as_str()))
        .map(|fc| (fc.content.as_str(), fc.folder.as_str()))
        .collect();

    let mut out: FxHashMap<String, String> = FxHashMap::default();
    for fc in &payload.folder_contents {
        if folders.contains_key(fc.content.as_str()) {
            continue; // folder nesting record, not an item placement
        }

        let mut segments: Vec<&str> = Vec::new();
        let mut cursor = Some(fc.folder.as_str());
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        while let Some(folder_id) = cursor {
            if !visited.insert(folder_id) {
                break; // cycle in the declared tree; keep what we have
            }
            if let Some(folder) = folders.get(folder_id)
                && folder.kind != "ArchimateModel"
            {
                segments.push(folder.name.as_str());
            }
            cursor = parent_of.get(folder_id).copied();
        }
        segments.reverse();
        out.entry(fc.content.clone()).or_insert(segments.join("/"));
    }
    out
}
