//! CLI help specs
//!
//! Verify help and version output.

use crate::prelude::*;

#[test]
fn help_names_the_journal_command() {
    let temp = Project::empty();

    temp.dtx()
        .args(&["--help"])
        .passes()
        .stdout_has("journal");
}

#[test]
fn journal_help_lists_subcommands() {
    let temp = Project::empty();

    temp.dtx()
        .args(&["journal", "--help"])
        .passes()
        .stdout_has("dump")
        .stdout_has("last-tx")
        .stdout_has("verify")
        .stdout_has("repair");
}

#[test]
fn version_is_printed() {
    let temp = Project::empty();

    temp.dtx()
        .args(&["--version"])
        .passes()
        .stdout_has("dtx");
}
