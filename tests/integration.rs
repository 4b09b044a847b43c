//! End-to-end CLI tests.
//!
//! Each test runs the compiled `pdfqa` binary against a throwaway sandbox
//! (config, database, upload directory under a `TempDir`). Providers stay
//! disabled so no test touches the network; question answering itself is
//! covered by the engine's unit tests against in-process fakes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn pdfqa_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("pdfqa");
    path
}

/// Minimal valid single-page PDF whose text content is `phrase`.
/// Builds the body first, then an xref table with correct byte offsets so
/// pdf-extract can parse it.
fn minimal_pdf(phrase: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET\n", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(format!("4 0 obj << /Length {} >> stream\n", stream.len()).as_bytes());
    out.extend_from_slice(stream.as_bytes());
    out.extend_from_slice(b"endstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("config")).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/pdfqa.sqlite"

[storage]
upload_dir = "{root}/uploads"
max_upload_bytes = 4096

[server]
bind = "127.0.0.1:7431"
"#,
        root = root.display()
    );

    let config_path = root.join("config").join("pdfqa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_pdfqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = pdfqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run pdfqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Pull a `key: value` field out of CLI output.
fn output_field(stdout: &str, key: &str) -> String {
    stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix(key))
        .unwrap_or_else(|| panic!("no '{}' field in output: {}", key, stdout))
        .trim()
        .to_string()
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_pdfqa(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("pdfqa.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_pdfqa(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_pdfqa(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_invalid_config_rejected() {
    let (tmp, config_path) = setup_test_env();
    let mut content = fs::read_to_string(&config_path).unwrap();
    content.push_str("\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n");
    let bad_path = tmp.path().join("config").join("bad.toml");
    fs::write(&bad_path, content).unwrap();

    let (_, stderr, success) = run_pdfqa(&bad_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "stderr: {}", stderr);
}

#[test]
fn test_upload_list_get_delete_flow() {
    let (tmp, config_path) = setup_test_env();
    run_pdfqa(&config_path, &["init"]);

    let pdf_path = tmp.path().join("france.pdf");
    fs::write(&pdf_path, minimal_pdf("Paris is the capital of France")).unwrap();

    // Upload
    let (stdout, stderr, success) =
        run_pdfqa(&config_path, &["upload", pdf_path.to_str().unwrap()]);
    assert!(success, "upload failed: {}{}", stdout, stderr);
    assert!(stdout.contains("Paris is the capital of France"));
    let id = output_field(&stdout, "id:");
    let stored = output_field(&stdout, "stored:");
    assert!(Path::new(&stored).exists());
    assert!(stored.contains("uploads"));

    // List shows the document
    let (stdout, _, success) = run_pdfqa(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains(&id));
    assert!(stdout.contains("1 document(s)"));

    // Get shows metadata, no questions yet
    let (stdout, _, success) = run_pdfqa(&config_path, &["get", &id]);
    assert!(success);
    assert_eq!(output_field(&stdout, "filename:"), "france.pdf");
    assert!(stdout.contains("0 question(s)"));

    let (stdout, _, success) = run_pdfqa(&config_path, &["questions", &id]);
    assert!(success);
    assert!(stdout.contains("No questions asked yet."));

    // Delete removes the record and the stored file
    let (stdout, _, success) = run_pdfqa(&config_path, &["delete", &id]);
    assert!(success);
    assert!(stdout.contains("Deleted:"));
    assert!(!Path::new(&stored).exists());

    let (stdout, _, _) = run_pdfqa(&config_path, &["list"]);
    assert!(stdout.contains("No documents uploaded yet."));
}

#[test]
fn test_upload_rejects_non_pdf_extension() {
    let (tmp, config_path) = setup_test_env();
    run_pdfqa(&config_path, &["init"]);

    let txt_path = tmp.path().join("notes.txt");
    fs::write(&txt_path, "plain text").unwrap();

    let (_, stderr, success) = run_pdfqa(&config_path, &["upload", txt_path.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("PDF"), "stderr: {}", stderr);
}

#[test]
fn test_upload_rejects_unparseable_pdf() {
    let (tmp, config_path) = setup_test_env();
    run_pdfqa(&config_path, &["init"]);

    let fake_path = tmp.path().join("fake.pdf");
    fs::write(&fake_path, "this is not a pdf at all").unwrap();

    let (_, _, success) = run_pdfqa(&config_path, &["upload", fake_path.to_str().unwrap()]);
    assert!(!success);

    // The rejected file must not linger in the upload directory.
    let uploads = tmp.path().join("uploads");
    let leftover = uploads
        .read_dir()
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftover, 0);
}

#[test]
fn test_upload_rejects_oversized_file() {
    let (tmp, config_path) = setup_test_env();
    run_pdfqa(&config_path, &["init"]);

    // Over the 4096-byte limit in the sandbox config.
    let big_path = tmp.path().join("big.pdf");
    fs::write(&big_path, vec![b'x'; 8192]).unwrap();

    let (_, stderr, success) = run_pdfqa(&config_path, &["upload", big_path.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("limit"), "stderr: {}", stderr);
}

#[test]
fn test_ask_requires_configured_providers() {
    let (tmp, config_path) = setup_test_env();
    run_pdfqa(&config_path, &["init"]);

    let pdf_path = tmp.path().join("doc.pdf");
    fs::write(&pdf_path, minimal_pdf("Some content")).unwrap();
    let (stdout, _, _) = run_pdfqa(&config_path, &["upload", pdf_path.to_str().unwrap()]);
    let id = output_field(&stdout, "id:");

    let (_, stderr, success) = run_pdfqa(&config_path, &["ask", &id, "What is this?"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);
}

#[test]
fn test_unknown_document_id_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_pdfqa(&config_path, &["init"]);

    for cmd in ["get", "delete", "questions"] {
        let (_, stderr, success) = run_pdfqa(&config_path, &[cmd, "no-such-id"]);
        assert!(!success, "{} should fail for an unknown id", cmd);
        assert!(stderr.contains("not found"), "stderr: {}", stderr);
    }
}
