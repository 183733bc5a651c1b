use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use std::error::Error;
use std::fs;
use tempfile::tempdir;

fn state_json(stdout: &[u8]) -> Result<Value, Box<dyn Error>> {
    let text = String::from_utf8(stdout.to_vec())?;
    let start = text.find('{').ok_or("no JSON in output")?;
    Ok(serde_json::from_str(&text[start..])?)
}

#[test]
fn fresh_state_uses_default_average() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let mut cmd = cargo_bin_cmd!("ecga");
    cmd.env("ECGA_STATE_DIR", dir.path()).arg("state");
    let out = cmd.assert().success().get_output().stdout.clone();
    let state = state_json(&out)?;
    assert_eq!(state["avg_proc_time_s"], 5.0);
    assert_eq!(state["dark_mode"], false);
    assert_eq!(state["version"], 1);
    Ok(())
}

#[test]
fn unusable_stored_average_falls_back() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("state.json"), r#"{"avg_proc_time_s": 0}"#)?;
    let mut cmd = cargo_bin_cmd!("ecga");
    cmd.env("ECGA_STATE_DIR", dir.path()).arg("state");
    let out = cmd.assert().success().get_output().stdout.clone();
    assert_eq!(state_json(&out)?["avg_proc_time_s"], 5.0);
    Ok(())
}

#[test]
fn dark_mode_preference_persists() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let mut prefs = cargo_bin_cmd!("ecga");
    prefs
        .env("ECGA_STATE_DIR", dir.path())
        .args(["prefs", "--dark-mode", "on"]);
    prefs.assert().success();

    let mut cmd = cargo_bin_cmd!("ecga");
    cmd.env("ECGA_STATE_DIR", dir.path()).arg("state");
    let out = cmd.assert().success().get_output().stdout.clone();
    let state = state_json(&out)?;
    assert_eq!(state["dark_mode"], true);
    assert_eq!(state["avg_proc_time_s"], 5.0);
    Ok(())
}
