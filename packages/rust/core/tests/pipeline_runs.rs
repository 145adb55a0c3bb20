//! End-to-end runs against a mock folder server.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rust_xlsxwriter::Workbook;
use sheetdrop_core::{FileOutcome, Pipeline, SilentProgress, Stage};
use sheetdrop_report::{PdfReport, ReportEmitter};
use sheetdrop_shared::{
    ExtractLayout, FetchSettings, FieldValue, FileIdentity, PipelineSettings, ReportSettings,
    ResolverSettings, Result, SheetdropError,
};
use sheetdrop_tracker::ProcessedSet;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const XLSX_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn settings(server: &MockServer, root: &Path) -> PipelineSettings {
    PipelineSettings {
        folder_url: Url::parse(&format!("{}/drive/folders/F1", server.uri())).unwrap(),
        processed_log: root.join("processed_files.txt"),
        keep_downloads: true,
        resolver: ResolverSettings {
            download_base: Url::parse(&format!("{}/uc", server.uri())).unwrap(),
            timeout_secs: 5,
        },
        fetch: FetchSettings {
            download_dir: root.join("downloads"),
            timeout_secs: 5,
            max_download_bytes: 5 * 1024 * 1024,
        },
        layout: ExtractLayout::default(),
        report: ReportSettings {
            title: "Executive Summary Dashboard".into(),
            reports_dir: root.join("reports"),
            max_columns_per_table: 4,
        },
    }
}

fn id(raw: &str) -> FileIdentity {
    FileIdentity::from_remote_id(raw).unwrap()
}

/// An "Overall Quad" workbook with `part` at data row 4 and `customer` at row 5.
fn quad_workbook(part: f64, customer: f64) -> Vec<u8> {
    let mut workbook = Workbook::new();
    {
        let ws = workbook.add_worksheet();
        ws.set_name("Overall Quad").unwrap();
        ws.write_string(0, 0, "Type").unwrap();
        ws.write_string(0, 1, "Count").unwrap();
        for row in 1..=6u32 {
            ws.write_string(row, 0, format!("row {}", row - 1)).unwrap();
            ws.write_number(row, 1, f64::from(row)).unwrap();
        }
        ws.write_number(5, 1, part).unwrap();
        ws.write_number(6, 1, customer).unwrap();
    }
    workbook.save_to_buffer().unwrap()
}

async fn mount_listing(server: &MockServer, ids: &[&str]) {
    let named: Vec<(&str, String)> = ids.iter().map(|id| (*id, format!("{id}.xlsx"))).collect();
    mount_named_listing(server, &named).await;
}

async fn mount_named_listing(server: &MockServer, entries: &[(&str, String)]) {
    let links: String = entries
        .iter()
        .map(|(id, name)| format!(r#"<a href="/file/d/{id}/view">{name}</a>"#))
        .collect();
    Mock::given(method("GET"))
        .and(path("/drive/folders/F1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(format!("<html><body>{links}</body></html>")),
        )
        .mount(server)
        .await;
}

async fn mount_workbook(server: &MockServer, id: &str, part: f64, customer: f64) {
    Mock::given(method("GET"))
        .and(path("/uc"))
        .and(query_param("id", id))
        .respond_with(ResponseTemplate::new(200).set_body_raw(quad_workbook(part, customer), XLSX_TYPE))
        .mount(server)
        .await;
}

/// Ids requested from the download endpoint, in order.
async fn downloads_requested(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/uc")
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "id")
                .map(|(_, v)| v.into_owned())
        })
        .collect()
}

/// Records every render and writes a stub document.
#[derive(Clone, Default)]
struct Recorder {
    calls: Arc<Mutex<Vec<(PathBuf, Vec<(String, FieldValue)>)>>>,
}

impl Recorder {
    fn calls(&self) -> Vec<(PathBuf, Vec<(String, FieldValue)>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ReportEmitter for Recorder {
    fn render(&self, _title: &str, rows: &[(String, FieldValue)], dest: &Path) -> Result<()> {
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(dest, b"%PDF-stub").unwrap();
        self.calls
            .lock()
            .unwrap()
            .push((dest.to_path_buf(), rows.to_vec()));
        Ok(())
    }
}

/// Fails every render, as if the process died before the report existed.
struct CrashingEmitter;

impl ReportEmitter for CrashingEmitter {
    fn render(&self, _title: &str, _rows: &[(String, FieldValue)], _dest: &Path) -> Result<()> {
        Err(SheetdropError::Render("simulated crash".into()))
    }
}

/// Renders a stub, then puts a directory where the processed-set file lives.
struct LogBlocker {
    log: PathBuf,
}

impl ReportEmitter for LogBlocker {
    fn render(&self, _title: &str, _rows: &[(String, FieldValue)], dest: &Path) -> Result<()> {
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(dest, b"%PDF-stub").unwrap();
        if self.log.is_file() {
            std::fs::remove_file(&self.log).unwrap();
        }
        std::fs::create_dir_all(&self.log).unwrap();
        Ok(())
    }
}

#[tokio::test]
async fn first_run_reports_every_file() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();
    mount_listing(&server, &["fileA", "fileB"]).await;
    mount_workbook(&server, "fileA", 10.4, 42.5).await;
    mount_workbook(&server, "fileB", 43.5, 7.0).await;

    let pipeline = Pipeline::new(settings(&server, root.path()), PdfReport::new(4)).unwrap();
    let summary = pipeline.run(&SilentProgress).await.unwrap();

    assert_eq!(summary.discovered, 2);
    assert_eq!(summary.committed(), 2);
    assert!(summary.is_success());

    for name in ["fileA.pdf", "fileB.pdf"] {
        let bytes = std::fs::read(root.path().join("reports").join(name)).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
    assert!(root.path().join("downloads").join("fileA.xlsx").exists());

    let processed = ProcessedSet::open(&root.path().join("processed_files.txt")).unwrap();
    assert!(processed.contains(&id("fileA")));
    assert!(processed.contains(&id("fileB")));
}

#[tokio::test]
async fn extracted_values_reach_the_emitter() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();
    mount_listing(&server, &["fileA"]).await;
    mount_workbook(&server, "fileA", 43.5, 42.5).await;

    let recorder = Recorder::default();
    let pipeline = Pipeline::new(settings(&server, root.path()), recorder.clone()).unwrap();
    pipeline.run(&SilentProgress).await.unwrap();

    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, root.path().join("reports").join("fileA.pdf"));
    assert_eq!(
        calls[0].1,
        vec![
            ("80 Customer".to_string(), FieldValue::Integer(42)),
            ("80 Part".to_string(), FieldValue::Integer(44)),
        ]
    );
}

#[tokio::test]
async fn second_run_is_a_no_op() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();
    mount_listing(&server, &["fileA", "fileB"]).await;
    mount_workbook(&server, "fileA", 1.0, 2.0).await;
    mount_workbook(&server, "fileB", 3.0, 4.0).await;

    let recorder = Recorder::default();
    let pipeline = Pipeline::new(settings(&server, root.path()), recorder.clone()).unwrap();

    pipeline.run(&SilentProgress).await.unwrap();
    let log_after_first = std::fs::read_to_string(root.path().join("processed_files.txt")).unwrap();

    let second = pipeline.run(&SilentProgress).await.unwrap();
    assert_eq!(second.skipped(), 2);
    assert_eq!(second.committed(), 0);

    assert_eq!(recorder.calls().len(), 2);
    assert_eq!(downloads_requested(&server).await, vec!["fileA", "fileB"]);
    assert_eq!(
        std::fs::read_to_string(root.path().join("processed_files.txt")).unwrap(),
        log_after_first
    );
}

#[tokio::test]
async fn only_new_files_are_processed_after_growth() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();
    mount_listing(&server, &["fileA", "fileB"]).await;
    mount_workbook(&server, "fileA", 1.0, 2.0).await;
    mount_workbook(&server, "fileB", 3.0, 4.0).await;

    let recorder = Recorder::default();
    let pipeline = Pipeline::new(settings(&server, root.path()), recorder.clone()).unwrap();
    pipeline.run(&SilentProgress).await.unwrap();

    // The new file is listed first, shifting the others' positions.
    server.reset().await;
    mount_listing(&server, &["fileC", "fileA", "fileB"]).await;
    mount_workbook(&server, "fileA", 1.0, 2.0).await;
    mount_workbook(&server, "fileB", 3.0, 4.0).await;
    mount_workbook(&server, "fileC", 5.0, 6.0).await;

    let summary = pipeline.run(&SilentProgress).await.unwrap();
    assert_eq!(summary.committed(), 1);
    assert_eq!(summary.skipped(), 2);
    assert!(matches!(
        summary.outcome(&id("fileC")),
        Some(FileOutcome::Committed { .. })
    ));
    assert_eq!(downloads_requested(&server).await, vec!["fileC"]);

    let dests: Vec<PathBuf> = recorder.calls().into_iter().map(|(dest, _)| dest).collect();
    assert_eq!(dests.len(), 3);
    assert_eq!(dests[2], root.path().join("reports").join("fileC.pdf"));
}

#[tokio::test]
async fn crash_before_report_leaves_file_eligible() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();
    mount_listing(&server, &["fileA"]).await;
    mount_workbook(&server, "fileA", 1.0, 2.0).await;

    let crashing = Pipeline::new(settings(&server, root.path()), CrashingEmitter).unwrap();
    let summary = crashing.run(&SilentProgress).await.unwrap();
    assert!(matches!(
        summary.outcome(&id("fileA")),
        Some(FileOutcome::Failed {
            stage: Stage::Reporting,
            ..
        })
    ));
    let processed = ProcessedSet::open(&root.path().join("processed_files.txt")).unwrap();
    assert!(!processed.contains(&id("fileA")));

    // Restart with a working emitter: the file is reported exactly once.
    let recorder = Recorder::default();
    let pipeline = Pipeline::new(settings(&server, root.path()), recorder.clone()).unwrap();
    let summary = pipeline.run(&SilentProgress).await.unwrap();
    assert_eq!(summary.committed(), 1);
    assert_eq!(recorder.calls().len(), 1);

    let processed = ProcessedSet::open(&root.path().join("processed_files.txt")).unwrap();
    assert!(processed.contains(&id("fileA")));
    assert_eq!(
        std::fs::read_to_string(root.path().join("processed_files.txt")).unwrap(),
        "fileA\n"
    );
}

#[tokio::test]
async fn unsupported_format_is_not_committed() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();
    mount_named_listing(
        &server,
        &[("notes", "Meeting notes".to_string()), ("fileB", "fileB.xlsx".to_string())],
    )
    .await;
    Mock::given(path("/uc"))
        .and(query_param("id", "notes"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.4 not a sheet", "application/pdf"))
        .mount(&server)
        .await;
    mount_workbook(&server, "fileB", 3.0, 4.0).await;

    let pipeline = Pipeline::new(settings(&server, root.path()), Recorder::default()).unwrap();
    let summary = pipeline.run(&SilentProgress).await.unwrap();

    match summary.outcome(&id("notes")) {
        Some(FileOutcome::Failed { stage, error }) => {
            assert_eq!(*stage, Stage::Extracting);
            assert!(matches!(error, SheetdropError::UnsupportedFormat { .. }));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!root.path().join("reports").join("notes.pdf").exists());
    assert!(matches!(
        summary.outcome(&id("fileB")),
        Some(FileOutcome::Committed { .. })
    ));

    let processed = ProcessedSet::open(&root.path().join("processed_files.txt")).unwrap();
    assert!(!processed.contains(&id("notes")));
    assert_eq!(processed.len(), 1);
}

#[tokio::test]
async fn fetch_failure_does_not_stop_the_run() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();
    mount_listing(&server, &["broken", "fileB"]).await;
    Mock::given(path("/uc"))
        .and(query_param("id", "broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_workbook(&server, "fileB", 3.0, 4.0).await;

    let pipeline = Pipeline::new(settings(&server, root.path()), Recorder::default()).unwrap();
    let summary = pipeline.run(&SilentProgress).await.unwrap();

    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.committed(), 1);
    assert!(matches!(
        summary.outcomes[0].1,
        FileOutcome::Failed {
            stage: Stage::Fetching,
            ..
        }
    ));
    assert!(!summary.is_success());
}

#[tokio::test]
async fn unreachable_folder_fails_the_run() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();
    Mock::given(path("/drive/folders/F1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let pipeline = Pipeline::new(settings(&server, root.path()), Recorder::default()).unwrap();
    let err = pipeline.run(&SilentProgress).await.unwrap_err();

    assert!(matches!(err, SheetdropError::Discovery(_)));
    assert!(err.is_run_fatal());
    assert!(!root.path().join("processed_files.txt").exists());
}

#[tokio::test]
async fn downloads_are_removed_when_not_kept() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();
    mount_listing(&server, &["fileA"]).await;
    mount_workbook(&server, "fileA", 1.0, 2.0).await;

    let mut settings = settings(&server, root.path());
    settings.keep_downloads = false;
    let pipeline = Pipeline::new(settings, Recorder::default()).unwrap();
    let summary = pipeline.run(&SilentProgress).await.unwrap();

    assert_eq!(summary.committed(), 1);
    assert!(!root.path().join("downloads").join("fileA.xlsx").exists());
}

#[tokio::test]
async fn failed_commit_stops_the_run() {
    let server = MockServer::start().await;
    let root = tempfile::tempdir().unwrap();
    mount_listing(&server, &["fileA", "fileB"]).await;
    mount_workbook(&server, "fileA", 1.0, 2.0).await;
    mount_workbook(&server, "fileB", 3.0, 4.0).await;

    let emitter = LogBlocker {
        log: root.path().join("processed_files.txt"),
    };
    let pipeline = Pipeline::new(settings(&server, root.path()), emitter).unwrap();
    let err = pipeline.run(&SilentProgress).await.unwrap_err();

    assert!(matches!(err, SheetdropError::TrackerIo { .. }));
    assert!(err.is_run_fatal());
    assert_eq!(downloads_requested(&server).await, vec!["fileA".to_string()]);
}
