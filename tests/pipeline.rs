//! Orchestrator integration tests.
//!
//! A scripted in-memory client stands in for the extraction service, so
//! these run offline. Inputs are placeholder files: the orchestrator never
//! opens them itself, and the rename pass treats unreadable PDFs as
//! "no DOI, no title".

use async_trait::async_trait;
use edgequake_pdf2data::{
    DocumentError, ExtractionClient, Pdf2DataError, Pipeline, PipelineConfig, Record,
    RunProgressCallback,
};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Replies keyed by input file name; unknown names get an empty array.
#[derive(Default)]
struct ScriptedClient {
    replies: HashMap<String, Result<String, DocumentError>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn reply(mut self, name: &str, body: &str) -> Self {
        self.replies.insert(name.into(), Ok(body.into()));
        self
    }

    fn fail(mut self, name: &str, err: DocumentError) -> Self {
        self.replies.insert(name.into(), Err(err));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExtractionClient for ScriptedClient {
    fn provider_id(&self) -> &str {
        "mock"
    }

    async fn extract(&self, pdf_path: &Path, _directive: &str) -> Result<String, DocumentError> {
        let name = pdf_path.file_name().unwrap().to_string_lossy().into_owned();
        self.calls.lock().unwrap().push(name.clone());
        self.replies
            .get(&name)
            .cloned()
            .unwrap_or_else(|| Ok("[]".into()))
    }
}

fn workspace(pdfs: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("extraction_prompt.txt"),
        "Extract every compound and its melting point.",
    )
    .unwrap();
    for name in pdfs {
        add_pdf(dir.path(), name);
    }
    dir
}

fn add_pdf(dir: &Path, name: &str) {
    std::fs::write(dir.join(name), b"%PDF-1.4 placeholder").unwrap();
}

fn config(dir: &Path) -> PipelineConfig {
    PipelineConfig::builder(dir)
        .rename_inputs(false)
        .document_delay_ms(0)
        .build()
        .unwrap()
}

fn read_json(path: PathBuf) -> Value {
    serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap()
}

fn records(path: PathBuf) -> Vec<Record> {
    serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap()
}

const THREE_RECORDS: &str = "Sure, here is the data:\n```json\n[\n  {\"compound\": \"A\", \"mp\": 120},\n  {\"compound\": \"B\", \"mp\": 98.5},\n  {\"compound\": \"C\", \"mp\": null}\n]\n```";

fn open_err(config: PipelineConfig, client: ScriptedClient) -> Pdf2DataError {
    match Pipeline::open(config, Arc::new(client)) {
        Ok(_) => panic!("expected a setup error"),
        Err(e) => e,
    }
}

// ── Run behaviour ────────────────────────────────────────────────────────────

#[tokio::test]
async fn success_and_timeout_in_one_batch() {
    let dir = workspace(&["a.pdf", "b.pdf"]);
    let client = Arc::new(
        ScriptedClient::default()
            .reply("a.pdf", THREE_RECORDS)
            .fail("b.pdf", DocumentError::Timeout { secs: 300 }),
    );

    let mut pipeline = Pipeline::open(config(dir.path()), client.clone()).unwrap();
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.records, 3);
    assert_eq!(summary.remaining, 1);

    let layout = pipeline.layout().clone();
    let checkpoint = read_json(layout.checkpoint_file.clone());
    assert_eq!(checkpoint["processed"], serde_json::json!(["a.pdf"]));
    assert_eq!(checkpoint["stats"]["a.pdf"]["num_records"], 3);
    let failed = checkpoint["failed"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["pdf"], "b.pdf");
    assert!(failed[0]["error"].as_str().unwrap().contains("timed out"));
    assert!(failed[0]["failed_at"].is_string());

    let combined = records(layout.combined_file());
    assert_eq!(combined.len(), 3);
    assert_eq!(combined[0]["source_pdf"], "a.pdf");
    assert_eq!(combined[0]["provider"], "mock");
    assert_eq!(combined[1]["mp"], 98.5);
    assert_eq!(records(layout.output_dir.join("a.json")).len(), 3);
    assert!(layout.export_file().exists());

    assert!(layout.processed_dir.join("a.pdf").exists());
    assert!(!dir.path().join("a.pdf").exists());
    assert!(dir.path().join("b.pdf").exists());
}

#[tokio::test]
async fn second_run_on_unchanged_folder_does_nothing() {
    let dir = workspace(&["a.pdf", "b.pdf"]);
    let client = Arc::new(
        ScriptedClient::default()
            .reply("a.pdf", r#"{"x": 1}"#)
            .reply("b.pdf", r#"[{"x": 2}]"#),
    );

    let first = edgequake_pdf2data::run(config(dir.path()), client.clone())
        .await
        .unwrap();
    assert_eq!(first.succeeded, 2);

    let second = edgequake_pdf2data::run(config(dir.path()), client.clone())
        .await
        .unwrap();
    assert_eq!(second.attempted, 0);
    assert_eq!(second.combined_file, None);
    assert_eq!(client.calls(), ["a.pdf", "b.pdf"]);
}

#[tokio::test]
async fn resumes_after_crash_between_documents() {
    let dir = workspace(&["a.pdf", "b.pdf"]);
    // Checkpoint committed for a.pdf, process killed before the move.
    std::fs::write(
        dir.path().join("pipeline_checkpoint.json"),
        r#"{"processed": ["a.pdf"], "failed": [],
            "stats": {"a.pdf": {"num_records": 3, "processed_at": "2024-01-01T00:00:00"}}}"#,
    )
    .unwrap();

    let client = Arc::new(ScriptedClient::default().reply("b.pdf", r#"[{"x": 1}]"#));
    let mut pipeline = Pipeline::open(config(dir.path()), client.clone()).unwrap();
    assert_eq!(pipeline.pending().unwrap().len(), 1);

    let summary = pipeline.run().await.unwrap();
    assert_eq!(client.calls(), ["b.pdf"]);
    assert_eq!(summary.already_processed, 1);
    assert_eq!(summary.remaining, 0);
    assert!(pipeline.checkpoint().is_processed("a.pdf"));
    assert!(pipeline.checkpoint().is_processed("b.pdf"));
}

#[tokio::test]
async fn max_documents_caps_one_run() {
    let dir = workspace(&["c.pdf", "a.pdf", "b.pdf"]);
    let client = Arc::new(
        ScriptedClient::default()
            .reply("a.pdf", r#"[{"n": 1}]"#)
            .reply("b.pdf", r#"[{"n": 2}]"#)
            .reply("c.pdf", r#"[{"n": 3}]"#),
    );
    let capped = || {
        PipelineConfig::builder(dir.path())
            .rename_inputs(false)
            .document_delay_ms(0)
            .max_documents(2)
            .build()
            .unwrap()
    };

    let first = edgequake_pdf2data::run(capped(), client.clone()).await.unwrap();
    assert_eq!(first.attempted, 2);
    assert_eq!(first.remaining, 1);
    assert_eq!(client.calls(), ["a.pdf", "b.pdf"]);

    let second = edgequake_pdf2data::run(capped(), client.clone()).await.unwrap();
    assert_eq!(second.attempted, 1);
    assert_eq!(client.calls(), ["a.pdf", "b.pdf", "c.pdf"]);
}

#[tokio::test]
async fn combined_artifact_holds_only_this_run() {
    let dir = workspace(&["a.pdf"]);
    let client = Arc::new(
        ScriptedClient::default()
            .reply("a.pdf", r#"[{"v": "old"}]"#)
            .reply("c.pdf", r#"[{"v": "new"}, {"v": "newer"}]"#),
    );
    edgequake_pdf2data::run(config(dir.path()), client.clone())
        .await
        .unwrap();

    add_pdf(dir.path(), "c.pdf");
    let summary = edgequake_pdf2data::run(config(dir.path()), client.clone())
        .await
        .unwrap();

    let combined = records(summary.combined_file.unwrap());
    assert_eq!(combined.len(), 2);
    assert!(combined.iter().all(|r| r["source_pdf"] == "c.pdf"));
}

#[tokio::test]
async fn malformed_reply_fails_document_and_keeps_debug_copy() {
    let dir = workspace(&["a.pdf"]);
    let client = Arc::new(ScriptedClient::default().reply("a.pdf", "No data found, sorry."));
    let config = PipelineConfig::builder(dir.path())
        .rename_inputs(false)
        .document_delay_ms(0)
        .debug(true)
        .build()
        .unwrap();

    let mut pipeline = Pipeline::open(config, client).unwrap();
    let summary = pipeline.run().await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.combined_file, None);

    let layout = pipeline.layout().clone();
    assert_eq!(
        std::fs::read_to_string(layout.output_dir.join("DEBUG_a.txt")).unwrap(),
        "No data found, sorry."
    );
    let failures: Vec<_> = pipeline.checkpoint().state().failures_for("a.pdf").collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].error.starts_with("malformed output"));
    assert!(dir.path().join("a.pdf").exists());
    assert!(!layout.output_dir.join("a.json").exists());
}

#[tokio::test]
async fn blank_reply_is_recorded_as_empty_response() {
    let dir = workspace(&["a.pdf"]);
    let client = Arc::new(ScriptedClient::default().reply("a.pdf", "  \n"));
    let mut pipeline = Pipeline::open(config(dir.path()), client).unwrap();
    pipeline.run().await.unwrap();

    let failures: Vec<_> = pipeline.checkpoint().state().failures_for("a.pdf").collect();
    assert_eq!(failures[0].error, "Empty response from API");
}

#[tokio::test]
async fn repeated_failures_are_all_kept_and_retried() {
    let dir = workspace(&["a.pdf"]);
    let client = Arc::new(ScriptedClient::default().fail(
        "a.pdf",
        DocumentError::ProcessingFailed {
            provider: "gemini".into(),
        },
    ));

    for _ in 0..2 {
        edgequake_pdf2data::run(config(dir.path()), client.clone())
            .await
            .unwrap();
    }

    assert_eq!(client.calls().len(), 2);
    let checkpoint = read_json(dir.path().join("pipeline_checkpoint.json"));
    let failed = checkpoint["failed"].as_array().unwrap();
    assert_eq!(failed.len(), 2);
    assert!(failed
        .iter()
        .all(|f| f["error"] == "gemini processing failed state"));
    assert_eq!(checkpoint["processed"], serde_json::json!([]));
}

#[derive(Default)]
struct Events {
    started: AtomicUsize,
    completed: AtomicUsize,
    errored: AtomicUsize,
    finished: AtomicUsize,
}

impl RunProgressCallback for Events {
    fn on_document_start(&self, _i: usize, _n: usize, _name: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_document_complete(&self, _i: usize, _n: usize, _name: &str, _records: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_document_error(&self, _i: usize, _n: usize, _name: &str, _error: &str) {
        self.errored.fetch_add(1, Ordering::SeqCst);
    }
    fn on_run_complete(&self, _succeeded: usize, _failed: usize) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn progress_events_follow_the_batch() {
    let dir = workspace(&["a.pdf", "b.pdf", "c.pdf"]);
    let events = Arc::new(Events::default());
    let client = Arc::new(
        ScriptedClient::default()
            .reply("a.pdf", r#"[{"x": 1}]"#)
            .fail("b.pdf", DocumentError::EmptyResponse)
            .reply("c.pdf", r#"{"x": 3}"#),
    );
    let config = PipelineConfig::builder(dir.path())
        .rename_inputs(false)
        .document_delay_ms(0)
        .progress_callback(events.clone())
        .build()
        .unwrap();

    edgequake_pdf2data::run(config, client).await.unwrap();
    assert_eq!(events.started.load(Ordering::SeqCst), 3);
    assert_eq!(events.completed.load(Ordering::SeqCst), 2);
    assert_eq!(events.errored.load(Ordering::SeqCst), 1);
    assert_eq!(events.finished.load(Ordering::SeqCst), 1);
}

// ── Rename pass ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn rename_pass_gives_unidentified_inputs_unique_names() {
    let dir = workspace(&["scan1.pdf", "scan2.pdf", "10.1000abc - Known.pdf"]);
    let client = Arc::new(ScriptedClient::default());
    let pipeline = Pipeline::open(config(dir.path()), client).unwrap();

    assert_eq!(pipeline.rename_inputs(), 2);
    assert!(dir.path().join("NO_DOI - Untitled.pdf").exists());
    assert!(dir.path().join("NO_DOI - Untitled (2).pdf").exists());
    assert!(dir.path().join("10.1000abc - Known.pdf").exists());
    assert!(!dir.path().join("scan1.pdf").exists());

    let log = read_json(dir.path().join("renamed_files.json"));
    assert_eq!(log["NO_DOI - Untitled.pdf"]["original_name"], "scan1.pdf");
    assert_eq!(log["NO_DOI - Untitled (2).pdf"]["original_name"], "scan2.pdf");
    assert!(log["NO_DOI - Untitled.pdf"]["doi"].is_null());

    // Canonical names are stable: a second pass renames nothing.
    assert_eq!(pipeline.rename_inputs(), 0);
}

#[tokio::test]
async fn run_renames_before_discovery() {
    let dir = workspace(&["scan.pdf"]);
    let client = Arc::new(ScriptedClient::default().reply("NO_DOI - Untitled.pdf", r#"[{"x": 1}]"#));
    let config = PipelineConfig::builder(dir.path())
        .document_delay_ms(0)
        .build()
        .unwrap();

    let summary = edgequake_pdf2data::run(config, client.clone()).await.unwrap();
    assert_eq!(summary.renamed, 1);
    assert_eq!(client.calls(), ["NO_DOI - Untitled.pdf"]);
    assert!(dir
        .path()
        .join("processed_pdfs")
        .join("NO_DOI - Untitled.pdf")
        .exists());
}

#[tokio::test]
async fn new_input_never_reuses_a_processed_name() {
    let dir = workspace(&["scan1.pdf"]);
    let client = Arc::new(
        ScriptedClient::default()
            .reply("NO_DOI - Untitled.pdf", r#"[{"x": 1}]"#)
            .reply("NO_DOI - Untitled (2).pdf", r#"[{"x": 2}]"#),
    );
    let renaming = || {
        PipelineConfig::builder(dir.path())
            .document_delay_ms(0)
            .build()
            .unwrap()
    };

    let first = edgequake_pdf2data::run(renaming(), client.clone()).await.unwrap();
    assert_eq!(first.succeeded, 1);
    assert!(dir
        .path()
        .join("processed_pdfs")
        .join("NO_DOI - Untitled.pdf")
        .exists());

    add_pdf(dir.path(), "scan2.pdf");
    let second = edgequake_pdf2data::run(renaming(), client.clone()).await.unwrap();
    assert_eq!(second.renamed, 1);
    assert_eq!(second.attempted, 1);
    assert_eq!(second.succeeded, 1);
    assert_eq!(second.remaining, 0);
    assert_eq!(
        client.calls(),
        ["NO_DOI - Untitled.pdf", "NO_DOI - Untitled (2).pdf"]
    );

    let log = read_json(dir.path().join("renamed_files.json"));
    assert_eq!(log["NO_DOI - Untitled (2).pdf"]["original_name"], "scan2.pdf");
}

// ── Setup errors ─────────────────────────────────────────────────────────────

#[test]
fn missing_target_is_fatal() {
    let dir = TempDir::new().unwrap();
    let err = open_err(config(&dir.path().join("nope")), ScriptedClient::default());
    assert!(matches!(err, Pdf2DataError::TargetNotFound { .. }));
}

#[test]
fn missing_or_empty_directive_is_fatal() {
    let dir = TempDir::new().unwrap();
    add_pdf(dir.path(), "a.pdf");
    let err = open_err(config(dir.path()), ScriptedClient::default());
    assert!(matches!(err, Pdf2DataError::PromptNotFound { .. }));

    std::fs::write(dir.path().join("extraction_prompt.txt"), "  \n").unwrap();
    let err = open_err(config(dir.path()), ScriptedClient::default());
    assert!(matches!(err, Pdf2DataError::PromptEmpty { .. }));
    assert!(err.is_setup());
}

#[test]
fn prompt_override_is_used() {
    let dir = workspace(&[]);
    let custom = dir.path().join("custom.txt");
    std::fs::write(&custom, "  Only the title.  ").unwrap();
    let config = PipelineConfig::builder(dir.path())
        .prompt_path(&custom)
        .build()
        .unwrap();
    let pipeline = Pipeline::open(config, Arc::new(ScriptedClient::default())).unwrap();
    assert_eq!(pipeline.directive(), "Only the title.");
}

#[test]
fn corrupt_checkpoint_is_fatal() {
    let dir = workspace(&["a.pdf"]);
    std::fs::write(dir.path().join("pipeline_checkpoint.json"), "{not json").unwrap();
    let err = open_err(config(dir.path()), ScriptedClient::default());
    assert!(matches!(err, Pdf2DataError::CheckpointCorrupt { .. }));
}
