//! CLI error specs
//!
//! Verify usage errors exit non-zero with a useful message.

use crate::prelude::*;

#[test]
fn journal_source_is_required() {
    let temp = Project::empty();

    temp.dtx()
        .args(&["journal", "dump"])
        .fails()
        .stderr_has("--dir");
}

#[test]
fn dir_and_config_conflict() {
    let temp = Project::empty();
    let config = temp.file("dtx.toml", "");

    temp.journal_cmd("dump")
        .arg("--config")
        .arg(config.to_string_lossy().as_ref())
        .fails()
        .stderr_has("cannot be used with");
}

#[test]
fn unknown_checksum_is_rejected() {
    let temp = Project::empty();

    temp.journal_cmd("verify")
        .args(&["--checksum", "md5"])
        .fails()
        .stderr_has("md5");
}

#[test]
fn invalid_config_file_is_reported() {
    let temp = Project::empty();
    let config = temp.file("dtx.toml", "[journal]\nprefix = \"\"\n");

    temp.dtx()
        .args(&["journal", "last-tx", "--config"])
        .arg(config.to_string_lossy().as_ref())
        .fails()
        .stderr_has("prefix must not be empty");
}
