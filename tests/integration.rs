use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn vmig_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_vmig"))
}

fn setup_vault() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let vault = tmp.path().join("vault");
    fs::create_dir_all(vault.join("attachments")).unwrap();
    fs::create_dir_all(vault.join(".obsidian")).unwrap();

    fs::write(vault.join("attachments/diagram.png"), b"not really a png").unwrap();
    fs::write(
        vault.join("alpha.md"),
        "---\ntitle: Alpha Document\ntags: [rust, cli]\n---\n\n# Alpha\n\nSee ![[diagram.png]] below.\n",
    )
    .unwrap();
    fs::write(
        vault.join("beta.md"),
        "- first\n- second\n  - nested\n\n```rust\nfn main() {}\n```\n",
    )
    .unwrap();
    fs::write(vault.join(".obsidian/workspace.md"), "ignored").unwrap();
    tmp
}

fn run_vmig(root: &Path, args: &[&str]) -> Output {
    Command::new(vmig_binary())
        .args(["--config", root.join("missing.toml").to_str().unwrap()])
        .args(args)
        .env_remove("NOTION_TOKEN")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run vmig")
}

fn read_report(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_dry_run_writes_report() {
    let tmp = setup_vault();
    let vault = tmp.path().join("vault");
    let report_path = tmp.path().join("out/report.json");

    let output = run_vmig(
        tmp.path(),
        &[
            "migrate",
            "--dry-run",
            "--progress",
            "off",
            "--vault",
            vault.to_str().unwrap(),
            "--output",
            report_path.to_str().unwrap(),
        ],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("dry run"));

    let report = read_report(&report_path);
    let summary = &report["migration_summary"];
    assert_eq!(summary["dry_run"], true);
    assert_eq!(summary["successful_pages"], 2);
    assert_eq!(summary["failed_pages"], 0);
    assert_eq!(summary["total_assets"], 1);
    assert_eq!(summary["successful_uploads"], 1);

    let pages = report["migrated_pages"].as_array().unwrap();
    assert_eq!(pages.len(), 2);
    assert!(pages.iter().all(|p| p["page_id"] == "dry-run-page-id"));
    assert!(pages.iter().any(|p| p["title"] == "Alpha Document"));
    assert_eq!(report["uploaded_assets"]["diagram.png"], "dry-run-upload-0");
}

#[test]
fn test_dry_run_exits_nonzero_on_failed_page() {
    let tmp = setup_vault();
    let vault = tmp.path().join("vault");
    fs::write(vault.join("broken.md"), [0xff, 0xfe, 0x00]).unwrap();
    let report_path = tmp.path().join("report.json");

    let output = run_vmig(
        tmp.path(),
        &[
            "migrate",
            "--dry-run",
            "--progress",
            "off",
            "--vault",
            vault.to_str().unwrap(),
            "--output",
            report_path.to_str().unwrap(),
        ],
    );
    assert_eq!(output.status.code(), Some(1));

    let report = read_report(&report_path);
    assert_eq!(report["migration_summary"]["failed_pages"], 1);
    assert_eq!(report["migration_summary"]["successful_pages"], 2);
    let failed = report["failed_files"].as_array().unwrap();
    assert!(failed[0].as_str().unwrap().ends_with("broken.md"));
}

#[test]
fn test_migrate_requires_token() {
    let tmp = setup_vault();
    let vault = tmp.path().join("vault");
    let output = run_vmig(
        tmp.path(),
        &[
            "migrate",
            "--vault",
            vault.to_str().unwrap(),
            "--database",
            "db-1",
        ],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("token"), "stderr: {}", stderr);
}

#[test]
fn test_missing_config_without_vault_fails() {
    let tmp = TempDir::new().unwrap();
    let output = run_vmig(tmp.path(), &["migrate", "--dry-run"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[test]
fn test_config_file_drives_dry_run() {
    let tmp = setup_vault();
    let vault = tmp.path().join("vault");
    let config_path = tmp.path().join("vmig.toml");
    fs::write(
        &config_path,
        format!(
            "[notion]\ndatabase_id = \"db-1\"\n\n[vault]\nroot = \"{}\"\nexclude_globs = [\"beta.md\"]\n",
            vault.display()
        ),
    )
    .unwrap();
    let report_path = tmp.path().join("report.json");

    let output = Command::new(vmig_binary())
        .args([
            "--config",
            config_path.to_str().unwrap(),
            "migrate",
            "--dry-run",
            "--progress",
            "off",
            "--output",
            report_path.to_str().unwrap(),
        ])
        .env_remove("NOTION_TOKEN")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report = read_report(&report_path);
    assert_eq!(report["migration_summary"]["total_pages_processed"], 1);
    assert_eq!(report["migrated_pages"][0]["title"], "Alpha Document");
}

#[test]
fn test_init_writes_sample_and_refuses_overwrite() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("conf/vmig.toml");

    let output = run_vmig(tmp.path(), &["init", path.to_str().unwrap()]);
    assert!(output.status.success());
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("[notion]"));
    assert!(content.contains("[upload]"));

    let again = run_vmig(tmp.path(), &["init", path.to_str().unwrap()]);
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("Refusing to overwrite"));
}

#[test]
fn test_completions() {
    let tmp = TempDir::new().unwrap();
    let output = run_vmig(tmp.path(), &["completions", "bash"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("vmig"));
    assert!(stdout.contains("migrate"));
}
