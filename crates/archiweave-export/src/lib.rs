#![forbid(unsafe_code)]

//! Layout and Open Exchange Format serialization over a reconstructed
//! [`ModelGraph`].
//!
//! Both stages are read-only with respect to the graph's element, relationship
//! and folder state; the layout stage writes only visual-node bounding boxes.

pub mod ids;
pub mod layout;
pub mod xml;

use archiweave_core::ModelGraph;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot serialize an empty model graph")]
    EmptyGraph,

    #[error("unknown view selected for export: {view}")]
    UnknownViewSelected { view: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Knobs for the flattened grid layout.
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    pub cell_width: i32,
    pub cell_height: i32,
    /// Gap between cells and around the grid edge.
    pub padding: i32,
    /// Rows wrap once the next cell would end past this width.
    pub max_row_width: i32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            cell_width: 140,
            cell_height: 60,
            padding: 30,
            max_row_width: 1200,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Overrides the document's model name. Defaults to the selected view's name
    /// for single-view exports and a fixed name for batches.
    pub model_name: Option<String>,
}

/// Lays out the selected views and serializes the graph in one step, so a view
/// cannot be observed half-replaced between the two stages. An empty selection
/// means every view, in graph order.
pub fn export_views(
    graph: &mut ModelGraph,
    view_ids: &[String],
    layout_options: &LayoutOptions,
    export_options: &ExportOptions,
) -> Result<String> {
    let selected: Vec<String> = if view_ids.is_empty() {
        graph.views.keys().cloned().collect()
    } else {
        view_ids.to_vec()
    };
    tracing::debug!(
        views = selected.len(),
        elements = graph.elements.len(),
        relationships = graph.relationships.len(),
        "exporting model graph"
    );

    layout::layout_views(graph, &selected, layout_options)?;
    xml::serialize_model(graph, &selected, export_options)
}
