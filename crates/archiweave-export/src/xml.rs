//! Open Exchange Format 3.0 serialization.
//!
//! The document is written by hand over `std::fmt::Write`; the section order
//! (`name`, `elements`, `relationships`, `organizations`,
//! `propertyDefinitions`, `views`) is the schema's, and within each section
//! records appear in graph insertion order, so identical graphs serialize to
//! byte-identical documents.

use crate::ids::IdMapper;
use crate::{Error, ExportOptions, Result};
use archiweave_core::graph::{Bounds, Folder, View};
use archiweave_core::{AccessType, ModelGraph};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::fmt::Write as _;

const ARCHIMATE_NS: &str = "http://www.opengroup.org/xsd/archimate/3.0/";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const SCHEMA_LOCATION: &str = "http://www.opengroup.org/xsd/archimate/3.0/ \
                               http://www.opengroup.org/xsd/archimate/3.1/archimate3_Diagram.xsd";

/// The model element's identifier is fixed rather than generated, which keeps
/// repeated exports of the same graph byte-identical.
const MODEL_IDENTIFIER: &str = "id-model";

/// Model name when several views are exported and no override is given.
const BATCH_MODEL_NAME: &str = "Reconstructed Model";

/// Geometry for nodes the layout stage never touched.
const FALLBACK_BOUNDS: Bounds = Bounds {
    x: 0,
    y: 0,
    width: 140,
    height: 60,
};

/// Serializes the graph as an Open Exchange Format 3.0 document covering the
/// selected views (empty selection means every view, in graph order).
///
/// Element and relationship definitions are emitted exactly once no matter how
/// many selected views reference them. Errors leave the graph untouched.
///
/// Serialization does not position anything: nodes the layout stage never
/// touched all get the same fallback box. Call [`crate::layout::layout_views`]
/// first, or use [`crate::export_views`], for non-overlapping geometry.
pub fn serialize_model(
    graph: &ModelGraph,
    view_ids: &[String],
    options: &ExportOptions,
) -> Result<String> {
    if graph.is_empty() {
        return Err(Error::EmptyGraph);
    }
    let views = selected_views(graph, view_ids)?;

    let property_definitions = collect_property_definitions(graph);

    let mut ids = IdMapper::new();
    ids.reserve(MODEL_IDENTIFIER);
    for def_id in property_definitions.values() {
        ids.reserve(def_id);
    }
    for element_id in graph.elements.keys() {
        ids.assign(element_id);
    }
    for relationship_id in graph.relationships.keys() {
        ids.assign(relationship_id);
    }
    for view in &views {
        ids.assign(&view.id);
    }

    let model_name = match (&options.model_name, views.as_slice()) {
        (Some(name), _) => name.clone(),
        (None, [only]) => only.name.clone(),
        (None, _) => BATCH_MODEL_NAME.to_string(),
    };

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        out,
        "<model xmlns=\"{ARCHIMATE_NS}\" xmlns:xsi=\"{XSI_NS}\" \
         xsi:schemaLocation=\"{SCHEMA_LOCATION}\" identifier=\"{MODEL_IDENTIFIER}\">",
    );
    write_lang_text(&mut out, 1, "name", &model_name);

    write_elements(&mut out, graph, &mut ids, &property_definitions);
    write_relationships(&mut out, graph, &mut ids);
    write_organizations(&mut out, graph, &views, &ids);
    write_property_definitions(&mut out, &property_definitions);
    write_views(&mut out, &views, &mut ids);

    out.push_str("</model>\n");
    Ok(out)
}

/// Resolves the selection against the graph, in graph insertion order and with
/// duplicate selections collapsed.
fn selected_views<'a>(graph: &'a ModelGraph, view_ids: &[String]) -> Result<Vec<&'a View>> {
    for id in view_ids {
        if !graph.views.contains_key(id) {
            return Err(Error::UnknownViewSelected { view: id.clone() });
        }
    }
    let want: FxHashSet<&str> = view_ids.iter().map(String::as_str).collect();
    Ok(graph
        .views
        .values()
        .filter(|v| want.is_empty() || want.contains(v.id.as_str()))
        .collect())
}

/// Property keys in first-sighting order, each bound to a definition id.
fn collect_property_definitions(graph: &ModelGraph) -> IndexMap<String, String> {
    let mut defs = IndexMap::new();
    for element in graph.elements.values() {
        for property in &element.properties {
            let next = defs.len() + 1;
            defs.entry(property.key.clone())
                .or_insert_with(|| format!("propid-{next}"));
        }
    }
    defs
}

fn write_elements(
    out: &mut String,
    graph: &ModelGraph,
    ids: &mut IdMapper,
    defs: &IndexMap<String, String>,
) {
    out.push_str("  <elements>\n");
    for element in graph.elements.values() {
        let id = ids.assign(&element.id);
        let _ = writeln!(
            out,
            "    <element identifier=\"{id}\" xsi:type=\"{}\">",
            element.element_type.exchange_tag(),
        );
        write_lang_text(out, 3, "name", &element.name);
        if let Some(doc) = &element.documentation {
            write_lang_text(out, 3, "documentation", doc);
        }
        if !element.properties.is_empty() {
            out.push_str("      <properties>\n");
            for property in &element.properties {
                // Every key was registered by collect_property_definitions.
                let def_id = defs.get(&property.key).map(String::as_str).unwrap_or("");
                let _ = writeln!(
                    out,
                    "        <property propertyDefinitionRef=\"{def_id}\">",
                );
                write_lang_text(out, 5, "value", &property.value);
                out.push_str("        </property>\n");
            }
            out.push_str("      </properties>\n");
        }
        out.push_str("    </element>\n");
    }
    out.push_str("  </elements>\n");
}

fn write_relationships(out: &mut String, graph: &ModelGraph, ids: &mut IdMapper) {
    if graph.relationships.is_empty() {
        return;
    }
    out.push_str("  <relationships>\n");
    for relationship in graph.relationships.values() {
        let id = ids.assign(&relationship.id);
        let source = ids.assign(&relationship.source);
        let target = ids.assign(&relationship.target);
        let _ = write!(
            out,
            "    <relationship identifier=\"{id}\" xsi:type=\"{}\" \
             source=\"{source}\" target=\"{target}\"",
            relationship.relationship_type.exchange_tag(),
        );
        if let Some(access) = relationship.access_type {
            if access != AccessType::Access {
                let _ = write!(out, " accessType=\"{}\"", access.exchange_tag());
            }
        }
        if relationship.name.is_none() && relationship.documentation.is_none() {
            out.push_str("/>\n");
            continue;
        }
        out.push_str(">\n");
        if let Some(name) = &relationship.name {
            write_lang_text(out, 3, "name", name);
        }
        if let Some(doc) = &relationship.documentation {
            write_lang_text(out, 3, "documentation", doc);
        }
        out.push_str("    </relationship>\n");
    }
    out.push_str("  </relationships>\n");
}

fn write_organizations(out: &mut String, graph: &ModelGraph, views: &[&View], ids: &IdMapper) {
    use archiweave_core::graph::OrganizationKind::*;

    // Folder leaves are filtered to what this document actually defines; a
    // ref to an unselected view or an unresolved endpoint would not validate.
    let mut emitted: FxHashSet<&str> = graph.elements.keys().map(String::as_str).collect();
    emitted.extend(graph.relationships.keys().map(String::as_str));
    emitted.extend(views.iter().map(|v| v.id.as_str()));

    let roots: Vec<&Folder> = [Elements, Relations, Views]
        .into_iter()
        .map(|kind| graph.organization(kind))
        .filter(|folder| folder_has_content(folder, &emitted))
        .collect();
    if roots.is_empty() {
        return;
    }

    out.push_str("  <organizations>\n");
    for root in roots {
        write_folder_item(out, 2, root, &emitted, ids);
    }
    out.push_str("  </organizations>\n");
}

fn folder_has_content(folder: &Folder, emitted: &FxHashSet<&str>) -> bool {
    folder.items.iter().any(|id| emitted.contains(id.as_str()))
        || folder.folders.iter().any(|f| folder_has_content(f, emitted))
}

fn write_folder_item(
    out: &mut String,
    depth: usize,
    folder: &Folder,
    emitted: &FxHashSet<&str>,
    ids: &IdMapper,
) {
    indent(out, depth);
    out.push_str("<item>\n");
    write_lang_text(out, depth + 1, "label", &folder.name);
    for child in &folder.folders {
        if folder_has_content(child, emitted) {
            write_folder_item(out, depth + 1, child, emitted, ids);
        }
    }
    for item in &folder.items {
        if !emitted.contains(item.as_str()) {
            continue;
        }
        if let Some(mapped) = ids.get(item) {
            indent(out, depth + 1);
            let _ = writeln!(out, "<item identifierRef=\"{mapped}\"/>");
        }
    }
    indent(out, depth);
    out.push_str("</item>\n");
}

fn write_property_definitions(out: &mut String, defs: &IndexMap<String, String>) {
    if defs.is_empty() {
        return;
    }
    out.push_str("  <propertyDefinitions>\n");
    for (key, def_id) in defs {
        let _ = writeln!(
            out,
            "    <propertyDefinition identifier=\"{def_id}\" type=\"string\">",
        );
        indent(out, 3);
        let _ = writeln!(out, "<name>{}</name>", escape_xml(key));
        out.push_str("    </propertyDefinition>\n");
    }
    out.push_str("  </propertyDefinitions>\n");
}

fn write_views(out: &mut String, views: &[&View], ids: &mut IdMapper) {
    if views.is_empty() {
        return;
    }
    out.push_str("  <views>\n    <diagrams>\n");
    for view in views {
        let view_id = ids.assign(&view.id);
        let _ = writeln!(
            out,
            "      <view identifier=\"{view_id}\" xsi:type=\"Diagram\">",
        );
        write_lang_text(out, 4, "name", &view.name);
        for node in &view.nodes {
            let node_id = ids.assign(&node.id);
            let element_ref = ids.assign(&node.element);
            let bounds = node.bounds.unwrap_or(FALLBACK_BOUNDS);
            let _ = writeln!(
                out,
                "        <node identifier=\"{node_id}\" elementRef=\"{element_ref}\" \
                 xsi:type=\"Element\" x=\"{}\" y=\"{}\" w=\"{}\" h=\"{}\"/>",
                bounds.x, bounds.y, bounds.width, bounds.height,
            );
        }
        for connection in &view.connections {
            let conn_id = ids.assign(&connection.id);
            let relationship_ref = ids.assign(&connection.relationship);
            let source = ids.assign(&connection.source);
            let target = ids.assign(&connection.target);
            let _ = writeln!(
                out,
                "        <connection identifier=\"{conn_id}\" \
                 relationshipRef=\"{relationship_ref}\" xsi:type=\"Relationship\" \
                 source=\"{source}\" target=\"{target}\"/>",
            );
        }
        out.push_str("      </view>\n");
    }
    out.push_str("    </diagrams>\n  </views>\n");
}

fn write_lang_text(out: &mut String, depth: usize, tag: &str, text: &str) {
    indent(out, depth);
    let _ = writeln!(out, "<{tag} xml:lang=\"en\">{}</{tag}>", escape_xml(text));
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

pub(crate) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_xml_into(&mut out, text);
    out
}

pub(crate) fn escape_xml_into(out: &mut String, text: &str) {
    let bytes = text.as_bytes();
    let mut start = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        let esc = match b {
            b'&' => Some("&amp;"),
            b'<' => Some("&lt;"),
            b'"' => Some("&quot;"),
            b'\'' => Some("&#39;"),
            _ => None,
        };
        let Some(esc) = esc else {
            continue;
        };
        if start < i {
            out.push_str(&text[start..i]);
        }
        out.push_str(esc);
        start = i + 1;
    }
    if start < text.len() {
        out.push_str(&text[start..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LayoutOptions;
    use archiweave_core::builder::ingest;
    use archiweave_core::payload::{
        Payload, PayloadElement, PayloadProperty, PayloadRelationship, PayloadView,
    };
    use archiweave_core::{ElementType, RelationshipType};

    fn actor_process_payload() -> Payload {
        Payload {
            view: PayloadView {
                id: "id-view1".into(),
                name: "Main View".into(),
            },
            elements: vec![
                PayloadElement {
                    id: "id-actor".into(),
                    name: "Customer".into(),
                    element_type: ElementType::BusinessActor,
                    documentation: Some("External party & friend".into()),
                    folder: Some("Business".into()),
                },
                PayloadElement {
                    id: "id-process".into(),
                    name: "Order Handling".into(),
                    element_type: ElementType::BusinessProcess,
                    documentation: None,
                    folder: Some("Business".into()),
                },
            ],
            relationships: vec![PayloadRelationship {
                id: "id-serves".into(),
                relationship_type: RelationshipType::Serving,
                source: "id-process".into(),
                target: "id-actor".into(),
                name: None,
                documentation: None,
                access_type: None,
                folder: None,
            }],
            folders: Vec::new(),
            folder_contents: Vec::new(),
            properties: vec![PayloadProperty {
                element: "id-actor".into(),
                key: "Owner".into(),
                value: "Sales <dept>".into(),
            }],
            node_order: vec!["id-actor".into(), "id-process".into()],
        }
    }

    fn exported(payload: &Payload) -> String {
        let mut graph = ModelGraph::new();
        ingest(&mut graph, payload);
        crate::export_views(
            &mut graph,
            &[],
            &LayoutOptions::default(),
            &ExportOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn document_carries_all_schema_sections() {
        let xml = exported(&actor_process_payload());

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<model "));
        assert!(xml.contains("xmlns=\"http://www.opengroup.org/xsd/archimate/3.0/\""));
        assert!(xml.contains("identifier=\"id-model\""));
        assert!(xml.contains("<element identifier=\"id-actor\" xsi:type=\"BusinessActor\">"));
        assert!(xml.contains(
            "<relationship identifier=\"id-serves\" xsi:type=\"Serving\" \
             source=\"id-process\" target=\"id-actor\"/>"
        ));
        assert!(xml.contains("<propertyDefinition identifier=\"propid-1\" type=\"string\">"));
        assert!(xml.contains("<view identifier=\"id-view1\" xsi:type=\"Diagram\">"));
        assert!(xml.contains("elementRef=\"id-actor\""));
        assert!(xml.contains("relationshipRef=\"id-serves\""));
        assert!(xml.ends_with("</model>\n"));
    }

    #[test]
    fn single_view_export_takes_the_view_name() {
        let xml = exported(&actor_process_payload());
        assert!(xml.contains("<name xml:lang=\"en\">Main View</name>"));
    }

    #[test]
    fn text_content_is_escaped() {
        let xml = exported(&actor_process_payload());
        assert!(xml.contains("External party &amp; friend"));
        assert!(xml.contains("Sales &lt;dept&gt;") || xml.contains("Sales &lt;dept>"));
    }

    #[test]
    fn organizations_reflect_declared_folders() {
        let xml = exported(&actor_process_payload());
        assert!(xml.contains("<label xml:lang=\"en\">Elements</label>"));
        assert!(xml.contains("<label xml:lang=\"en\">Business</label>"));
        assert!(xml.contains("<item identifierRef=\"id-actor\"/>"));
        assert!(xml.contains("<item identifierRef=\"id-view1\"/>"));
    }

    #[test]
    fn repeated_export_is_byte_identical() {
        let payload = actor_process_payload();
        let mut graph = ModelGraph::new();
        ingest(&mut graph, &payload);

        let first = crate::export_views(
            &mut graph,
            &[],
            &LayoutOptions::default(),
            &ExportOptions::default(),
        )
        .unwrap();
        let second = crate::export_views(
            &mut graph,
            &[],
            &LayoutOptions::default(),
            &ExportOptions::default(),
        )
        .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_graph_is_rejected() {
        let graph = ModelGraph::new();
        let err = serialize_model(&graph, &[], &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyGraph));
    }

    #[test]
    fn unknown_view_selection_is_rejected() {
        let mut graph = ModelGraph::new();
        ingest(&mut graph, &actor_process_payload());
        let err = serialize_model(
            &graph,
            &["id-missing".to_string()],
            &ExportOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownViewSelected { view } if view == "id-missing"));
    }

    #[test]
    fn offending_source_ids_are_remapped() {
        let mut payload = actor_process_payload();
        payload.elements[0].id = "actor one".into();
        payload.relationships[0].target = "actor one".into();
        payload.node_order[0] = "actor one".into();

        let xml = exported(&payload);
        assert!(xml.contains("<element identifier=\"actor-one\""));
        assert!(xml.contains("target=\"actor-one\""));
        assert!(!xml.contains("\"actor one\""));
    }
}
