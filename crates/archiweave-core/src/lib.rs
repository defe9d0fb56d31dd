#![forbid(unsafe_code)]

//! Model reconstruction from Archi HTML report exports.
//!
//! Design goals:
//! - recover a consistent, de-duplicated model graph from report pages that were
//!   rendered for human viewing, not machine re-ingestion
//! - deterministic, testable outputs (insertion-ordered graph state)
//! - runtime-agnostic async APIs (no specific executor required)
//!
//! The pipeline is strictly extract -> ingest -> (layout -> serialize, in
//! `archiweave-export`). Extraction is pure and may run concurrently; all graph
//! mutation goes through [`builder::ingest`] under `&mut` access.

pub mod builder;
pub mod decode;
pub mod error;
pub mod graph;
pub mod payload;
pub mod types;

pub use builder::{IngestReport, IngestWarning, ViewContext, drain_unresolved, ingest,
    ingest_with_context};
pub use error::{Error, Result};
pub use graph::ModelGraph;
pub use payload::{Payload, extract};
pub use types::{AccessType, ElementType, RelationshipType};

use serde::Serialize;

/// Outcome of ingesting one page in a batch. A failed page never aborts the
/// batch; hosts surface the statuses as a per-view list.
#[derive(Debug, Clone, Serialize)]
pub struct PageStatus {
    pub page: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<IngestReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One reconstruction session: a fresh graph per loaded report.
///
/// Sessions own their graph outright, so independent sessions (tests, multiple
/// open reports) never interfere. Reloading a report means a new session; graphs
/// are never reused across loads, since stale identities from a previous load
/// would silently merge into the new model.
#[derive(Debug, Default)]
pub struct Session {
    graph: ModelGraph,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &ModelGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ModelGraph {
        &mut self.graph
    }

    pub fn into_graph(self) -> ModelGraph {
        self.graph
    }

    /// Extracts and ingests a single page. `&mut self` serializes concurrent
    /// ingests by construction; extraction itself is pure and can be staged
    /// concurrently by callers that fetch many pages at once.
    pub fn ingest_page_sync(&mut self, page_text: &str) -> Result<IngestReport> {
        let payload = extract(page_text)?;
        Ok(ingest(&mut self.graph, &payload))
    }

    pub async fn ingest_page(&mut self, page_text: &str) -> Result<IngestReport> {
        self.ingest_page_sync(page_text)
    }

    /// Ingests an already-extracted payload, with optional view overrides from
    /// the host.
    pub fn ingest_payload(&mut self, payload: &Payload, context: &ViewContext) -> IngestReport {
        ingest_with_context(&mut self.graph, payload, context)
    }

    /// Batch ingestion with per-page failure isolation: a page that fails to
    /// extract is reported and skipped, pages after it are still ingested.
    pub fn ingest_pages_sync<'a, I>(&mut self, pages: I) -> Vec<PageStatus>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        pages
            .into_iter()
            .map(|(label, text)| match self.ingest_page_sync(text) {
                Ok(report) => PageStatus {
                    page: label.to_string(),
                    report: Some(report),
                    error: None,
                },
                Err(err) => PageStatus {
                    page: label.to_string(),
                    report: None,
                    error: Some(err.to_string()),
                },
            })
            .collect()
    }

    pub async fn ingest_pages<'a, I>(&mut self, pages: I) -> Vec<PageStatus>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.ingest_pages_sync(pages)
    }

    /// Ends the ingestion phase: drops relationships whose endpoints never
    /// resolved and returns the corresponding warnings.
    pub fn finish(&mut self) -> Vec<IngestWarning> {
        drain_unresolved(&mut self.graph)
    }
}

#[cfg(test)]
mod tests;
