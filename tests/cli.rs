/*!
 * End-to-end runs of the repopacker binary
 */

use std::fs;
use std::process::Command;

use tempfile::tempdir;

fn repopacker() -> Command {
    Command::new(env!("CARGO_BIN_EXE_repopacker"))
}

#[test]
fn test_packs_project_to_output_file() {
    let project = tempdir().unwrap();
    fs::create_dir(project.path().join("src")).unwrap();
    fs::write(project.path().join("src").join("main.txt"), "hello").unwrap();
    fs::write(project.path().join("src").join("bin.dat"), [0u8, 1, 2, 3]).unwrap();
    fs::write(project.path().join(".gitignore"), "*.dat\n").unwrap();
    let output_file = project.path().join("packed.xml");

    let status = repopacker()
        .args(["--quiet", "--no-history", "-o"])
        .arg(&output_file)
        .arg(project.path())
        .status()
        .unwrap();
    assert!(status.success());

    let xml = fs::read_to_string(&output_file).unwrap();
    assert!(xml.starts_with("<packed_repository"));
    assert!(xml.contains("<file path=\"src/main.txt\">"));
    assert!(xml.contains("hello"));
    assert!(!xml.contains("bin.dat"));
    assert!(!xml.contains("packed.xml"));
    assert!(xml.contains("<metrics files=\"1\" bytes=\"5\" skipped=\"0\"/>"));
}

#[test]
fn test_select_patterns_limit_output() {
    let project = tempdir().unwrap();
    fs::write(project.path().join("keep.md"), "# keep").unwrap();
    fs::write(project.path().join("other.txt"), "other").unwrap();

    let output = repopacker()
        .args(["--quiet", "--no-history", "--select", "*.md"])
        .arg(project.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("keep.md"));
    assert!(!stdout.contains("other.txt"));
}

#[test]
fn test_history_records_opened_roots() {
    let project = tempdir().unwrap();
    fs::write(project.path().join("a.txt"), "a").unwrap();
    let state = tempdir().unwrap();
    let history_file = state.path().join("recent.json");

    let status = repopacker()
        .arg("--quiet")
        .arg("--history-file")
        .arg(&history_file)
        .arg(project.path())
        .output()
        .unwrap()
        .status;
    assert!(status.success());

    let listing = repopacker()
        .arg("--recent")
        .arg("--history-file")
        .arg(&history_file)
        .output()
        .unwrap();
    assert!(listing.status.success());
    let stdout = String::from_utf8(listing.stdout).unwrap();
    let root = fs::canonicalize(project.path()).unwrap();
    assert!(stdout.contains(&root.display().to_string()));
}

#[test]
fn test_missing_directory_fails() {
    let project = tempdir().unwrap();
    let status = repopacker()
        .args(["--quiet", "--no-history"])
        .arg(project.path().join("missing"))
        .status()
        .unwrap();
    assert!(!status.success());
}
