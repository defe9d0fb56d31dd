//! The canonical model graph: the single owned aggregate the builder mutates and
//! the layout/serializer stages read.
//!
//! Insertion order is load-bearing. Elements, relationships, folders and views
//! are kept in the order they were first ingested, and the exchange serializer
//! emits them in exactly that order, which is what makes repeated exports
//! byte-identical.

use crate::types::{AccessType, ElementType, RelationshipType};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Element {
    pub id: String,
    pub name: String,
    pub element_type: ElementType,
    pub documentation: Option<String>,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Relationship {
    pub id: String,
    pub relationship_type: RelationshipType,
    pub source: String,
    pub target: String,
    pub name: Option<String>,
    pub documentation: Option<String>,
    pub access_type: Option<AccessType>,
}

/// A named container in the organization tree. Child order is preserved; leaf
/// items are identities of elements, relationships or views depending on the
/// category root the folder lives under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub folders: Vec<Folder>,
    pub items: Vec<String>,
}

impl Folder {
    fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            folders: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.folders.iter().all(Folder::is_empty)
    }

    /// Returns the child folder for `name`, creating it (at the end of the child
    /// list) when absent.
    fn child_mut(&mut self, name: &str) -> &mut Folder {
        let idx = match self.folders.iter().position(|f| f.name == name) {
            Some(idx) => idx,
            None => {
                let id = format!("{}-{}", self.id, self.folders.len());
                self.folders.push(Folder::new(id, name));
                self.folders.len() - 1
            }
        };
        &mut self.folders[idx]
    }
}

/// The three fixed top-level organization categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OrganizationKind {
    Elements,
    Relations,
    Views,
}

impl OrganizationKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Elements => "Elements",
            Self::Relations => "Relations",
            Self::Views => "Views",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// A view-local, positioned reference to an element. Geometry is absent until
/// the layout stage populates it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualNode {
    pub id: String,
    pub element: String,
    pub bounds: Option<Bounds>,
}

/// A logical connection between two visual nodes, backed by a relationship.
/// Deliberately carries no routing geometry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connection {
    pub id: String,
    pub relationship: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct View {
    pub id: String,
    pub name: String,
    pub nodes: Vec<VisualNode>,
    pub connections: Vec<Connection>,
}

/// A relationship whose endpoints are not all known yet. First-class state, not
/// an error: a later payload may supply the missing element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingRelationship {
    pub relationship: Relationship,
    pub declared_folder: Option<String>,
}

/// One session's model graph. Created empty, grows monotonically under the
/// builder's exclusive `&mut` access, and is discarded with the session; graphs
/// must never be reused across report loads.
#[derive(Debug, Clone, Serialize)]
pub struct ModelGraph {
    pub elements: IndexMap<String, Element>,
    pub relationships: IndexMap<String, Relationship>,
    pub views: IndexMap<String, View>,
    organizations: [Folder; 3],
    pending: Vec<PendingRelationship>,
    /// Item id -> declared folder path, for first-wins placement checks.
    #[serde(skip)]
    placements: FxHashMap<String, String>,
}

impl Default for ModelGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelGraph {
    pub fn new() -> Self {
        Self {
            elements: IndexMap::new(),
            relationships: IndexMap::new(),
            views: IndexMap::new(),
            organizations: [
                Folder::new("org-elements", OrganizationKind::Elements.label()),
                Folder::new("org-relations", OrganizationKind::Relations.label()),
                Folder::new("org-views", OrganizationKind::Views.label()),
            ],
            pending: Vec::new(),
            placements: FxHashMap::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn organization(&self, kind: OrganizationKind) -> &Folder {
        match kind {
            OrganizationKind::Elements => &self.organizations[0],
            OrganizationKind::Relations => &self.organizations[1],
            OrganizationKind::Views => &self.organizations[2],
        }
    }

    fn organization_mut(&mut self, kind: OrganizationKind) -> &mut Folder {
        match kind {
            OrganizationKind::Elements => &mut self.organizations[0],
            OrganizationKind::Relations => &mut self.organizations[1],
            OrganizationKind::Views => &mut self.organizations[2],
        }
    }

    /// Total folder count across the three category trees, excluding the fixed
    /// roots themselves.
    pub fn folder_count(&self) -> usize {
        fn count(folder: &Folder) -> usize {
            folder.folders.iter().map(|f| 1 + count(f)).sum()
        }
        self.organizations.iter().map(count).sum()
    }

    /// The folder path an item was placed under, if it has been placed.
    pub fn placement(&self, item_id: &str) -> Option<&str> {
        self.placements.get(item_id).map(String::as_str)
    }

    /// Places an item under the folder path (segments separated by `/`; an empty
    /// path means the category root). First placement wins; this must only be
    /// called for items not yet placed.
    pub(crate) fn place(&mut self, kind: OrganizationKind, path: &str, item_id: &str) {
        debug_assert!(!self.placements.contains_key(item_id));
        let mut folder = self.organization_mut(kind);
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            folder = folder.child_mut(segment);
        }
        folder.items.push(item_id.to_string());
        self.placements.insert(item_id.to_string(), path.to_string());
    }

    pub(crate) fn push_pending(&mut self, pending: PendingRelationship) {
        self.pending.push(pending);
    }

    pub fn pending(&self) -> &[PendingRelationship] {
        &self.pending
    }

    pub(crate) fn take_pending(&mut self) -> Vec<PendingRelationship> {
        std::mem::take(&mut self.pending)
    }
}
