//! Closed vocabularies for the ArchiMate concept and relationship types that the
//! report family can declare.
//!
//! The HTML report tags concepts with `i18n-elementtype-<Type>` CSS classes and
//! script records with the same raw tag strings. Unknown tags fail loudly instead
//! of passing through to the exchange document (a document with an invented
//! `xsi:type` would be rejected by conformant importers anyway).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Visual-only tags the report uses for diagram furniture. These carry no model
/// semantics and are skipped rather than rejected.
const NON_MODEL_TAGS: &[&str] = &["DiagramModelNote", "DiagramModelReference"];

pub fn is_non_model_tag(tag: &str) -> bool {
    NON_MODEL_TAGS.contains(&tag)
}

macro_rules! concept_types {
    ($($variant:ident),+ $(,)?) => {
        /// ArchiMate 3.x concept types understood by the extractor.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum ElementType {
            $($variant,)+
        }

        impl ElementType {
            /// The `xsi:type` tag emitted into the exchange document.
            pub fn exchange_tag(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)+
                }
            }

            fn from_tag(tag: &str) -> Option<Self> {
                match tag {
                    $(stringify!($variant) => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

concept_types!(
    // Strategy
    Resource,
    Capability,
    CourseOfAction,
    ValueStream,
    // Business
    BusinessActor,
    BusinessRole,
    BusinessCollaboration,
    BusinessInterface,
    BusinessProcess,
    BusinessFunction,
    BusinessInteraction,
    BusinessEvent,
    BusinessService,
    BusinessObject,
    Contract,
    Representation,
    Product,
    // Application
    ApplicationComponent,
    ApplicationCollaboration,
    ApplicationInterface,
    ApplicationFunction,
    ApplicationInteraction,
    ApplicationProcess,
    ApplicationEvent,
    ApplicationService,
    DataObject,
    // Technology
    Node,
    Device,
    SystemSoftware,
    TechnologyCollaboration,
    TechnologyInterface,
    Path,
    CommunicationNetwork,
    TechnologyFunction,
    TechnologyProcess,
    TechnologyInteraction,
    TechnologyEvent,
    TechnologyService,
    Artifact,
    // Physical
    Equipment,
    Facility,
    DistributionNetwork,
    Material,
    // Motivation
    Stakeholder,
    Driver,
    Assessment,
    Goal,
    Outcome,
    Principle,
    Requirement,
    Constraint,
    Meaning,
    Value,
    // Implementation & migration
    WorkPackage,
    Deliverable,
    ImplementationEvent,
    Plateau,
    Gap,
    // Other
    Location,
    Grouping,
);

impl ElementType {
    /// Parses a raw report tag (e.g. from `i18n-elementtype-BusinessActor`).
    pub fn from_report_tag(tag: &str) -> Result<Self> {
        Self::from_tag(tag).ok_or_else(|| Error::UnrecognizedElementType {
            tag: tag.to_string(),
        })
    }
}

macro_rules! relationship_types {
    ($($variant:ident),+ $(,)?) => {
        /// ArchiMate 3.x relationship types.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum RelationshipType {
            $($variant,)+
        }

        impl RelationshipType {
            pub fn exchange_tag(self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)+
                }
            }

            fn from_tag(tag: &str) -> Option<Self> {
                match tag {
                    $(stringify!($variant) => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

relationship_types!(
    Composition,
    Aggregation,
    Assignment,
    Realization,
    Serving,
    Access,
    Influence,
    Triggering,
    Flow,
    Specialization,
    Association,
);

impl RelationshipType {
    /// Parses a raw report tag. The report declares relationships with a
    /// `Relationship` suffix (`ServingRelationship`); the exchange schema does not.
    pub fn from_report_tag(tag: &str) -> Result<Self> {
        let bare = tag.strip_suffix("Relationship").unwrap_or(tag);
        Self::from_tag(bare).ok_or_else(|| Error::UnrecognizedRelationshipType {
            tag: tag.to_string(),
        })
    }
}

/// Qualifier on `Access` relationships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    Access,
    Read,
    Write,
    ReadWrite,
}

impl AccessType {
    pub fn exchange_tag(self) -> &'static str {
        match self {
            Self::Access => "Access",
            Self::Read => "Read",
            Self::Write => "Write",
            Self::ReadWrite => "ReadWrite",
        }
    }

    /// Parses the report's numeric or textual access qualifier.
    ///
    /// Archi persists access types as small integers (1 = read, 2 = write,
    /// 3 = read/write); exported reports have been seen with both forms.
    pub fn from_report_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "0" | "Access" | "access" => Some(Self::Access),
            "1" | "Read" | "read" => Some(Self::Read),
            "2" | "Write" | "write" => Some(Self::Write),
            "3" | "ReadWrite" | "readwrite" => Some(Self::ReadWrite),
            _ => None,
        }
    }
}
