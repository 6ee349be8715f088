//! Request-level façade over the registry, ledger, disk and processors.
//!
//! Each operation resolves its handler first, so an unknown type is rejected
//! before any job exists.

use super::export::{DEFAULT_EXPORT_DIR, ExportArtifact, ExportGenerator};
use super::import::ImportProcessor;
use crate::io::formats::{is_accepted_mimetype, template_bytes};
use crate::models::{Job, JobId, JobOptions, JobQuery, NewJob, Page, Row};
use crate::registry::TypeRegistry;
use crate::storage::{Disk, Ledger};
use crate::{Error, Result};
use std::io::Write;
use std::sync::Arc;
use tracing::instrument;

/// Default directory for stored uploads.
pub const DEFAULT_IMPORT_DIR: &str = "ie/imports";

/// Directory and paging settings for the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Directory for stored uploads.
    pub import_dir: String,
    /// Directory for generated artifacts.
    pub export_dir: String,
    /// Page size used when a query leaves it at the default.
    pub per_page: u32,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            import_dir: DEFAULT_IMPORT_DIR.to_string(),
            export_dir: DEFAULT_EXPORT_DIR.to_string(),
            per_page: JobQuery::DEFAULT_PER_PAGE,
        }
    }
}

/// An uploaded file submitted for import.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// Logical type to import as.
    pub type_name: String,
    /// Client-facing file name.
    pub original_name: Option<String>,
    /// Declared MIME type, if the client sent one.
    pub mimetype: Option<String>,
    /// File content.
    pub bytes: Vec<u8>,
    /// Reference to the requesting user.
    pub owner: Option<String>,
}

impl ImportRequest {
    /// Creates a request for a type with the given content.
    #[must_use]
    pub fn new(type_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            type_name: type_name.into(),
            original_name: None,
            mimetype: None,
            bytes: bytes.into(),
            owner: None,
        }
    }

    /// Sets the client-facing file name.
    #[must_use]
    pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }

    /// Sets the declared MIME type.
    #[must_use]
    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = Some(mimetype.into());
        self
    }

    /// Sets the owner reference.
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }
}

/// Entry point for templates, imports, exports and job inspection.
pub struct ImportExportService {
    registry: Arc<TypeRegistry>,
    ledger: Arc<dyn Ledger>,
    disk: Arc<dyn Disk>,
    settings: ServiceSettings,
    processor: ImportProcessor,
    generator: ExportGenerator,
}

impl ImportExportService {
    /// Creates a service.
    #[must_use]
    pub fn new(
        registry: Arc<TypeRegistry>,
        ledger: Arc<dyn Ledger>,
        disk: Arc<dyn Disk>,
        settings: ServiceSettings,
    ) -> Self {
        let processor = ImportProcessor::new(Arc::clone(&ledger));
        let generator = ExportGenerator::new(Arc::clone(&ledger), Arc::clone(&disk))
            .with_export_dir(settings.export_dir.clone());
        Self {
            registry,
            ledger,
            disk,
            settings,
            processor,
            generator,
        }
    }

    /// Replaces the import processor (custom validator, progress callback).
    #[must_use]
    pub fn with_processor(mut self, processor: ImportProcessor) -> Self {
        self.processor = processor;
        self
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Returns the header-only template for an importable type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRegistered`] if no importer exists for the type.
    pub fn template(&self, type_name: &str) -> Result<Vec<u8>> {
        let importer = self.registry.resolve_importer(type_name)?;
        template_bytes(&importer.headers())
    }

    /// Stores an upload, records its job and runs the import to completion.
    ///
    /// Row-level and header problems are reported on the returned job.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No importer is registered for the type (no job is created)
    /// - The declared MIME type is not CSV or plain text (no job is created)
    /// - The upload cannot be stored or the ledger fails
    #[instrument(
        name = "tabport.service.submit_import",
        skip_all,
        fields(job.type_name = %request.type_name, size = request.bytes.len())
    )]
    pub fn submit_import(&self, request: ImportRequest) -> Result<Job> {
        let importer = self.registry.resolve_importer(&request.type_name)?;

        if let Some(mimetype) = request.mimetype.as_deref()
            && !is_accepted_mimetype(mimetype)
        {
            return Err(Error::InvalidInput(format!(
                "unsupported file type '{mimetype}', expected text/csv or text/plain"
            )));
        }

        let path = format!(
            "{}/{}.csv",
            self.settings.import_dir.trim_end_matches('/'),
            uuid::Uuid::new_v4()
        );
        let size = self.disk.write(&path, &request.bytes)?;

        let mut new_job = NewJob::import(&request.type_name, self.disk.name(), &path)
            .with_mimetype(request.mimetype)
            .with_size(size)
            .with_owner(request.owner);
        if let Some(name) = request.original_name {
            new_job = new_job.with_original_name(name);
        }
        let job = self.ledger.create_job(new_job)?;
        tracing::info!(job.id = %job.id, %path, "import job created");

        self.processor
            .process_from_disk(&job, importer.as_ref(), self.disk.as_ref())
    }

    /// Generates an export artifact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotRegistered`] before any job exists for an unknown
    /// type, or [`Error::ExportFailed`] if generation fails.
    pub fn export(
        &self,
        type_name: &str,
        filters: JobOptions,
        owner: Option<String>,
    ) -> Result<ExportArtifact> {
        let exporter = self.registry.resolve_exporter(type_name)?;
        self.generator
            .generate(type_name, exporter.as_ref(), filters, owner)
    }

    /// Streams an artifact to `writer` and applies its delivery policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be read or copied.
    pub fn deliver<W: Write + ?Sized>(&self, artifact: &ExportArtifact, writer: &mut W) -> Result<u64> {
        self.generator.deliver(artifact, writer)
    }

    /// Lists jobs, newest first.
    ///
    /// A query left at the default page size uses the configured one.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    pub fn jobs(&self, query: &JobQuery) -> Result<Page<Job>> {
        if query.per_page == JobQuery::DEFAULT_PER_PAGE
            && self.settings.per_page != JobQuery::DEFAULT_PER_PAGE
        {
            let query = query.clone().with_page(query.page, self.settings.per_page);
            return self.ledger.list_jobs(&query);
        }
        self.ledger.list_jobs(query)
    }

    /// Returns a job with its rows ordered by line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for unknown job IDs.
    pub fn show(&self, id: &JobId) -> Result<(Job, Vec<Row>)> {
        let job = self.ledger.get_job(id)?;
        let rows = self.ledger.rows_for_job(id)?;
        Ok((job, rows))
    }
}
