//! Flattened grid layout.
//!
//! The original report geometry is discarded by design (reconstructed nesting
//! overlaps badly once connection routing is gone), so views get a deliberately
//! simple placement: nodes in declared order, left to right, wrapping into new
//! rows. Deterministic and non-overlapping is the whole contract; relationships
//! play no part in positioning.

use crate::{Error, LayoutOptions, Result};
use archiweave_core::ModelGraph;
use archiweave_core::graph::{Bounds, View};

/// Populates bounding boxes for every visual node of the view. Touches nothing
/// but `VisualNode::bounds`.
pub fn layout_view(view: &mut View, options: &LayoutOptions) {
    let mut x = options.padding;
    let mut y = options.padding;
    for node in &mut view.nodes {
        if x > options.padding && x + options.cell_width > options.max_row_width {
            x = options.padding;
            y += options.cell_height + options.padding;
        }
        node.bounds = Some(Bounds {
            x,
            y,
            width: options.cell_width,
            height: options.cell_height,
        });
        x += options.cell_width + options.padding;
    }
}

/// Lays out each selected view in place. Fails without touching any view when a
/// selected identity is unknown.
pub fn layout_views(
    graph: &mut ModelGraph,
    view_ids: &[String],
    options: &LayoutOptions,
) -> Result<()> {
    if let Some(missing) = view_ids.iter().find(|id| !graph.views.contains_key(*id)) {
        return Err(Error::UnknownViewSelected {
            view: missing.clone(),
        });
    }
    for id in view_ids {
        if let Some(view) = graph.views.get_mut(id) {
            layout_view(view, options);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use archiweave_core::graph::VisualNode;

    fn view_with_nodes(n: usize) -> View {
        View {
            id: "id-view".to_string(),
            name: "Test".to_string(),
            nodes: (0..n)
                .map(|i| VisualNode {
                    id: format!("id-view-n{i}"),
                    element: format!("id-e{i}"),
                    bounds: None,
                })
                .collect(),
            connections: Vec::new(),
        }
    }

    #[test]
    fn no_two_boxes_intersect() {
        let mut view = view_with_nodes(23);
        layout_view(&mut view, &LayoutOptions::default());

        let boxes: Vec<_> = view.nodes.iter().map(|n| n.bounds.unwrap()).collect();
        for (i, a) in boxes.iter().enumerate() {
            for b in &boxes[i + 1..] {
                assert!(!a.intersects(b), "{a:?} intersects {b:?}");
            }
        }
    }

    #[test]
    fn rows_wrap_at_max_row_width() {
        let options = LayoutOptions {
            cell_width: 100,
            cell_height: 50,
            padding: 10,
            max_row_width: 240,
        };
        let mut view = view_with_nodes(3);
        layout_view(&mut view, &options);

        // Two cells fit per row (10+100+10+100 = 220 <= 240), the third wraps.
        assert_eq!(view.nodes[0].bounds.unwrap().x, 10);
        assert_eq!(view.nodes[1].bounds.unwrap().x, 120);
        let third = view.nodes[2].bounds.unwrap();
        assert_eq!(third.x, 10);
        assert_eq!(third.y, 70);
    }

    #[test]
    fn layout_is_stable_across_runs() {
        let mut a = view_with_nodes(9);
        let mut b = view_with_nodes(9);
        layout_view(&mut a, &LayoutOptions::default());
        layout_view(&mut b, &LayoutOptions::default());
        assert_eq!(a, b);
    }

    #[test]
    fn a_single_oversized_cell_still_gets_placed() {
        let options = LayoutOptions {
            cell_width: 500,
            cell_height: 50,
            padding: 10,
            max_row_width: 240,
        };
        let mut view = view_with_nodes(2);
        layout_view(&mut view, &options);
        // First cell of a row never wraps, even when wider than the row limit.
        assert_eq!(view.nodes[0].bounds.unwrap().x, 10);
        assert_eq!(view.nodes[1].bounds.unwrap().y, 70);
    }
}
