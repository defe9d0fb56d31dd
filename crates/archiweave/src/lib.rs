#![forbid(unsafe_code)]

//! `archiweave` reconstructs an ArchiMate model graph from the pages of an
//! Archi HTML report export, then re-serializes it as an Open Exchange Format
//! 3.0 document that modeling tools can import again.
//!
//! The extraction and graph-building core is always available; layout and XML
//! serialization live behind the `export` feature.
//!
//! # Features
//!
//! - `export`: enable grid layout + exchange serialization (`archiweave::export`)

pub use archiweave_core::*;

#[cfg(feature = "export")]
pub mod export {
    pub use archiweave_export::ids::{IdMapper, sanitize_identifier};
    pub use archiweave_export::layout::{layout_view, layout_views};
    pub use archiweave_export::xml::serialize_model;
    pub use archiweave_export::{
        Error as ExportError, ExportOptions, LayoutOptions, export_views,
    };

    #[derive(Debug, thiserror::Error)]
    pub enum PipelineError {
        #[error(transparent)]
        Extract(#[from] archiweave_core::Error),
        #[error(transparent)]
        Export(#[from] archiweave_export::Error),
    }

    pub type Result<T> = std::result::Result<T, PipelineError>;

    /// What one full report export produced: the document plus everything that
    /// went wrong along the way.
    #[derive(Debug)]
    pub struct ExportOutcome {
        pub document: String,
        pub pages: Vec<archiweave_core::PageStatus>,
        pub warnings: Vec<archiweave_core::IngestWarning>,
    }

    /// Full pipeline helper (executor-free): ingests every page into a fresh
    /// session, drops relationships that never resolved, lays out and
    /// serializes the selected views.
    ///
    /// Pages that fail to extract are reported in the outcome and skipped; the
    /// call fails only when nothing usable was ingested.
    pub fn export_report_sync<'a, I>(
        pages: I,
        view_ids: &[String],
        layout_options: &LayoutOptions,
        export_options: &ExportOptions,
    ) -> Result<ExportOutcome>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut session = archiweave_core::Session::new();
        let statuses = session.ingest_pages_sync(pages);
        let warnings = session.finish();
        let mut graph = session.into_graph();
        let document = export_views(&mut graph, view_ids, layout_options, export_options)?;
        Ok(ExportOutcome {
            document,
            pages: statuses,
            warnings,
        })
    }

    pub async fn export_report<'a, I>(
        pages: I,
        view_ids: &[String],
        layout_options: &LayoutOptions,
        export_options: &ExportOptions,
    ) -> Result<ExportOutcome>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        export_report_sync(pages, view_ids, layout_options, export_options)
    }
}
