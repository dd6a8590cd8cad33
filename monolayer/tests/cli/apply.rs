use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use tempfile::TempDir;

//--------------------------------------------------------------------------------------------------
// Function: Helper
//--------------------------------------------------------------------------------------------------

/// Runs the `monolayer` binary from `dir` with the given root filesystem and arguments
fn run_monolayer(dir: &Path, rootfs: Option<&Path>, args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_monolayer"));
    command.current_dir(dir).args(args).env_remove("MONOLAYER_ROOTFS");

    if let Some(rootfs) = rootfs {
        command.env("MONOLAYER_ROOTFS", rootfs);
    }

    command.output().expect("Failed to run monolayer")
}

/// Writes an uncompressed layer that deletes `old` and adds `new`
fn write_layer(dir: &Path) -> PathBuf {
    let path = dir.join("layer.tar");
    let mut builder = tar::Builder::new(fs::File::create(&path).unwrap());

    for (name, content) in [(".wh.old", ""), ("new", "new content")] {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, name, content.as_bytes())
            .unwrap();
    }

    builder.finish().unwrap();
    path
}

/// Creates a scratch directory holding an empty-ish root filesystem
fn create_rootfs() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let rootfs = temp_dir.path().join("rootfs");
    fs::create_dir_all(&rootfs).unwrap();
    fs::write(rootfs.join("old"), "old content").unwrap();
    (temp_dir, rootfs)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[test]
fn test_cli_apply_layer_succeeds() {
    let (temp_dir, rootfs) = create_rootfs();
    let layer = write_layer(temp_dir.path());

    let output = run_monolayer(temp_dir.path(), Some(&rootfs), &[layer.to_str().unwrap()]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(!rootfs.join("old").exists());
    assert_eq!(fs::read_to_string(rootfs.join("new")).unwrap(), "new content");
}

#[test]
fn test_cli_reads_rootfs_from_dotenv() {
    let (temp_dir, rootfs) = create_rootfs();
    write_layer(temp_dir.path());
    fs::write(
        temp_dir.path().join(".env"),
        format!("MONOLAYER_ROOTFS={}\n", rootfs.display()),
    )
    .unwrap();

    let output = run_monolayer(temp_dir.path(), None, &["layer.tar"]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(rootfs.join("new").exists());
}

#[test]
fn test_cli_usage_errors_abort() {
    let (temp_dir, rootfs) = create_rootfs();

    let none = run_monolayer(temp_dir.path(), Some(&rootfs), &[]);
    assert_eq!(none.status.code(), Some(255));

    let two = run_monolayer(temp_dir.path(), Some(&rootfs), &["a.tar", "b.tar"]);
    assert_eq!(two.status.code(), Some(255));
}

#[test]
fn test_cli_help_and_version_succeed() {
    let (temp_dir, _rootfs) = create_rootfs();

    let help = run_monolayer(temp_dir.path(), None, &["--help"]);
    assert_eq!(help.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&help.stdout).contains("LAYER"));

    let version = run_monolayer(temp_dir.path(), None, &["--version"]);
    assert_eq!(version.status.code(), Some(0));
}

#[test]
fn test_cli_precondition_failures_abort() {
    let (temp_dir, rootfs) = create_rootfs();
    let layer = write_layer(temp_dir.path());
    let layer = layer.to_str().unwrap();

    // Root filesystem not configured
    let unset = run_monolayer(temp_dir.path(), None, &[layer]);
    assert_eq!(unset.status.code(), Some(255));

    // Root filesystem missing
    let missing_root = temp_dir.path().join("missing");
    let missing = run_monolayer(temp_dir.path(), Some(&missing_root), &[layer]);
    assert_eq!(missing.status.code(), Some(255));

    // Layer missing
    let no_layer = run_monolayer(temp_dir.path(), Some(&rootfs), &["missing.tar"]);
    assert_eq!(no_layer.status.code(), Some(255));
    assert!(rootfs.join("old").exists());
}

#[test]
fn test_cli_malformed_layer_aborts() {
    let (temp_dir, rootfs) = create_rootfs();
    let path = temp_dir.path().join("bad.tar");
    let mut builder = tar::Builder::new(fs::File::create(&path).unwrap());
    let mut header = tar::Header::new_gnu();
    header.set_size(0);
    header.set_mode(0o644);
    builder
        .append_data(&mut header, ".wh..wh..opq", &[][..])
        .unwrap();
    builder.finish().unwrap();
    drop(builder);

    let output = run_monolayer(temp_dir.path(), Some(&rootfs), &["bad.tar"]);
    assert_eq!(output.status.code(), Some(255));
    assert!(String::from_utf8_lossy(&output.stderr).contains("whiteout pass failed"));
    assert!(rootfs.join("old").exists());
}
