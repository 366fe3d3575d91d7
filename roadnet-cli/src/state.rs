//! `state` command: print the persisted sync cursors.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use roadnet_core::CursorStore;
use serde::{Deserialize, Serialize};

use crate::{ARG_DATABASE, CliError, DEFAULT_DATABASE, open_existing_store, write_json};

/// CLI arguments for the `state` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Print the sync cursor of every dataset as JSON")]
#[ortho_config(prefix = "ROADNET")]
pub(crate) struct StateArgs {
    /// Path to the SQLite database (default `roadnet.db`).
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

pub(crate) fn run_state(args: StateArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let merged = args.load_and_merge().map_err(CliError::Configuration)?;
    let database = merged
        .database
        .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE));
    run_state_with(&database, writer)
}

pub(crate) fn run_state_with(
    database: &Utf8Path,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let store = open_existing_store(database)?;
    let cursors = store.list_cursors().map_err(CliError::ReadState)?;
    write_json(writer, &cursors)
}
