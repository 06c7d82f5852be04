//! The batch orchestrator.
//!
//! A run is strictly sequential:
//!
//! ```text
//! rename pass ─▶ discover ─▶ for each pending PDF:
//!                              extract ─▶ parse ─▶ write JSON ─▶ checkpoint ─▶ move
//!                            ─▶ combined JSON + CSV for this run's records
//! ```
//!
//! The checkpoint is persisted after every document, so killing the process
//! loses at most the document in flight. Per-document failures are recorded
//! and the batch moves on; the input stays where it is and is retried on the
//! next run.

use crate::checkpoint::CheckpointStore;
use crate::client::ExtractionClient;
use crate::config::{PipelineConfig, WorkspaceLayout};
use crate::error::{DocumentError, Pdf2DataError};
use crate::output::{self, Record, RunSummary};
use crate::pipeline::discover::{self, document_name};
use crate::pipeline::parse::{parse_response, Provenance};
use crate::pipeline::rename;
use crate::progress::{NoopProgressCallback, RunProgressCallback};
use crate::prompts::load_directive;
use crate::rename_log::RenameLog;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A target folder opened for processing.
///
/// Construction performs every setup check, so a `Pipeline` that exists
/// can always start working.
pub struct Pipeline {
    config: PipelineConfig,
    layout: WorkspaceLayout,
    directive: String,
    client: Arc<dyn ExtractionClient>,
    checkpoint: CheckpointStore,
}

impl Pipeline {
    /// Validate the target folder, load the directive and checkpoint, and
    /// create the output and processed folders.
    pub fn open(
        config: PipelineConfig,
        client: Arc<dyn ExtractionClient>,
    ) -> Result<Self, Pdf2DataError> {
        if !config.target_dir.is_dir() {
            return Err(Pdf2DataError::TargetNotFound {
                path: config.target_dir.clone(),
            });
        }

        let directive = load_directive(&config.prompt_file())?;
        let layout = config.layout();
        for dir in [&layout.output_dir, &layout.processed_dir] {
            std::fs::create_dir_all(dir).map_err(|source| Pdf2DataError::OutputWriteFailed {
                path: dir.clone(),
                source,
            })?;
        }
        let checkpoint = CheckpointStore::load(&layout.checkpoint_file)?;

        info!(
            "Opened {} (provider: {})",
            config.target_dir.display(),
            client.provider_id()
        );
        Ok(Self {
            config,
            layout,
            directive,
            client,
            checkpoint,
        })
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    pub fn directive(&self) -> &str {
        &self.directive
    }

    /// Run the filename-normalisation pass. Returns the number renamed.
    pub fn rename_inputs(&self) -> usize {
        let mut log = RenameLog::load(&self.layout.rename_log_file);
        rename::rename_inputs(
            &self.layout.input_dir,
            &self.layout.processed_dir,
            self.checkpoint.state(),
            &mut log,
        )
    }

    /// Inputs the next run would attempt, in order.
    pub fn pending(&self) -> Result<Vec<PathBuf>, Pdf2DataError> {
        let all = discover::list_pdfs(&self.layout.input_dir)?;
        Ok(discover::pending(
            &all,
            self.checkpoint.state(),
            self.config.max_documents,
        ))
    }

    /// Process every pending document once.
    ///
    /// Only setup problems and checkpoint write failures are returned as
    /// errors; everything else ends up in the checkpoint or the log.
    pub async fn run(&mut self) -> Result<RunSummary, Pdf2DataError> {
        let noop: Arc<dyn RunProgressCallback> = Arc::new(NoopProgressCallback);
        let progress = self.config.progress_callback.clone().unwrap_or(noop);
        let mut summary = RunSummary::default();

        if self.config.rename_inputs {
            info!("Normalising file names...");
            summary.renamed = self.rename_inputs();
        }

        let all = discover::list_pdfs(&self.layout.input_dir)?;
        summary.inputs_found = all.len();
        summary.already_processed = all
            .iter()
            .filter(|p| self.checkpoint.is_processed(&document_name(p)))
            .count();
        let pending =
            discover::pending(&all, self.checkpoint.state(), self.config.max_documents);
        summary.attempted = pending.len();

        info!(
            "Found {} PDFs: {} already processed, {} to process",
            summary.inputs_found,
            summary.already_processed,
            pending.len()
        );
        progress.on_run_start(pending.len(), all.len());

        let delay = Duration::from_millis(self.config.document_delay_ms);
        let total = pending.len();
        let mut run_records: Vec<Record> = Vec::new();

        for (i, pdf) in pending.iter().enumerate() {
            let index = i + 1;
            let name = document_name(pdf);
            info!("[{}/{}] {}", index, total, name);
            progress.on_document_start(index, total, &name);

            match self.extract_document(pdf, &name).await {
                Ok(records) => {
                    let count = records.len();
                    let out = self.layout.document_output(pdf);
                    match output::write_records(&out, &records) {
                        Ok(()) => debug!("Wrote {}", out.display()),
                        Err(e) => warn!("{}", e),
                    }
                    self.checkpoint.mark_processed(&name, count)?;
                    if let Err(e) = output::move_to_processed(pdf, &self.layout.processed_dir) {
                        warn!("{}", e);
                    }

                    info!("  ✓ {} records", count);
                    summary.succeeded += 1;
                    summary.records += count;
                    run_records.extend(records);
                    progress.on_document_complete(index, total, &name, count);
                }
                Err(e) => {
                    warn!("  ✗ {}: {}", name, e);
                    let message = e.to_string();
                    self.checkpoint.mark_failed(&name, &message)?;
                    summary.failed += 1;
                    progress.on_document_error(index, total, &name, &message);
                }
            }

            if index < total && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        if !run_records.is_empty() {
            self.write_aggregate(&run_records, &mut summary);
        }

        summary.remaining = match discover::list_pdfs(&self.layout.input_dir) {
            Ok(left) => discover::pending(&left, self.checkpoint.state(), None).len(),
            Err(e) => {
                warn!("Could not count remaining inputs: {}", e);
                0
            }
        };

        info!(
            "Run complete: {} succeeded, {} failed, {} remaining, {} records",
            summary.succeeded, summary.failed, summary.remaining, summary.records
        );
        progress.on_run_complete(summary.succeeded, summary.failed);
        Ok(summary)
    }

    async fn extract_document(&self, pdf: &Path, name: &str) -> Result<Vec<Record>, DocumentError> {
        let raw = self.client.extract(pdf, &self.directive).await?;

        if self.config.debug {
            let path = self.layout.debug_output(pdf);
            if let Err(e) = output::write_debug_reply(&path, &raw) {
                warn!("{}", e);
            }
        }

        if raw.trim().is_empty() {
            return Err(DocumentError::EmptyResponse);
        }

        let provenance = Provenance {
            source: name.to_string(),
            extracted_at: crate::now_timestamp(),
            provider: self.client.provider_id().to_string(),
        };
        parse_response(&raw, &provenance)
    }

    fn write_aggregate(&self, records: &[Record], summary: &mut RunSummary) {
        let combined = self.layout.combined_file();
        match output::write_records(&combined, records) {
            Ok(()) => {
                info!("Combined {} records into {}", records.len(), combined.display());
                summary.combined_file = Some(combined);
            }
            Err(e) => warn!("{}", e),
        }

        let export = self.layout.export_file();
        match output::export_csv(&export, records) {
            Ok(()) => {
                info!("Exported {}", export.display());
                summary.export_file = Some(export);
            }
            Err(e) => warn!("{}", e),
        }
    }
}

/// Open `config.target_dir` and run it once.
pub async fn run(
    config: PipelineConfig,
    client: Arc<dyn ExtractionClient>,
) -> Result<RunSummary, Pdf2DataError> {
    Pipeline::open(config, client)?.run().await
}
