use assert_cmd::cargo::cargo_bin_cmd;
use std::error::Error;
use std::fs;
use tempfile::tempdir;

#[test]
fn single_file_is_rejected_before_upload() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let dat = dir.path().join("100.dat");
    fs::write(&dat, [0u8; 16])?;
    let mut cmd = cargo_bin_cmd!("ecga");
    // nothing listens on port 9; a request would fail with a network error instead
    cmd.env("ECGA_STATE_DIR", dir.path())
        .args(["--server", "http://127.0.0.1:9", "analyze"])
        .arg(&dat);
    let out = cmd.assert().failure().get_output().clone();
    let stderr = String::from_utf8(out.stderr)?;
    assert!(stderr.contains("Please select .dat + .hea files"), "{stderr}");
    assert!(!stderr.contains("Network error."));
    assert!(!dir.path().join("state.json").exists());
    Ok(())
}

#[test]
fn no_files_is_rejected() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let mut cmd = cargo_bin_cmd!("ecga");
    cmd.env("ECGA_STATE_DIR", dir.path())
        .args(["--server", "http://127.0.0.1:9", "analyze"]);
    let out = cmd.assert().failure().get_output().clone();
    assert!(String::from_utf8(out.stderr)?.contains("got 0, need at least 2"));
    Ok(())
}

#[test]
fn unreachable_server_is_a_network_error() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let dat = dir.path().join("100.dat");
    let hea = dir.path().join("100.hea");
    fs::write(&dat, [0u8; 16])?;
    fs::write(&hea, "100 1 360 8\n")?;
    let mut cmd = cargo_bin_cmd!("ecga");
    cmd.env("ECGA_STATE_DIR", dir.path())
        .args(["--server", "http://127.0.0.1:9", "analyze"])
        .arg(&dat)
        .arg(&hea);
    let out = cmd.assert().failure().get_output().clone();
    assert!(String::from_utf8(out.stderr)?.contains("Network error."));
    assert!(!dir.path().join("state.json").exists());
    Ok(())
}
