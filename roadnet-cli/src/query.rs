//! `query` command: print the viewport FeatureCollection.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use roadnet_core::{BoundingBox, ViewportConfig, ViewportQueryEngine};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_BBOX, ARG_DATABASE, ARG_DENSE_THRESHOLD, ARG_HARD_CAP, CliError, DEFAULT_DATABASE,
    ENV_QUERY_BBOX, open_existing_store, write_json,
};

/// CLI arguments for the `query` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Print the active segments intersecting a bounding box as a \
                 GeoJSON FeatureCollection. Dense viewports are reduced to \
                 centroid points and viewports above the hard cap return no \
                 features.",
    about = "Query the replica for a viewport"
)]
#[ortho_config(prefix = "ROADNET")]
pub(crate) struct QueryArgs {
    /// Bounding box as `minX,minY,maxX,maxY`.
    #[arg(long = ARG_BBOX, value_name = "minX,minY,maxX,maxY", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) bbox: Option<String>,
    /// Path to the SQLite database (default `roadnet.db`).
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Result count above which features are reduced to centroids.
    #[arg(long = ARG_DENSE_THRESHOLD, value_name = "count")]
    #[serde(default)]
    pub(crate) dense_threshold: Option<usize>,
    /// Result count above which no features are returned. Without
    /// `--dense-threshold` the default threshold is lowered to fit under it.
    #[arg(long = ARG_HARD_CAP, value_name = "count")]
    #[serde(default)]
    pub(crate) hard_cap: Option<usize>,
}

impl QueryArgs {
    fn into_config(self) -> Result<QueryConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        QueryConfig::try_from(merged)
    }
}

/// Resolved `query` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QueryConfig {
    pub(crate) database: Utf8PathBuf,
    pub(crate) bbox: BoundingBox,
    pub(crate) viewport: ViewportConfig,
}

impl TryFrom<QueryArgs> for QueryConfig {
    type Error = CliError;

    fn try_from(args: QueryArgs) -> Result<Self, Self::Error> {
        let raw_bbox = args.bbox.ok_or(CliError::MissingArgument {
            field: ARG_BBOX,
            env: ENV_QUERY_BBOX,
        })?;
        let bbox = parse_bbox(&raw_bbox)?;

        // A lone cap below the default threshold pulls the threshold down
        // with it; explicit values are validated as given.
        let defaults = ViewportConfig::default();
        let hard_cap = args.hard_cap.unwrap_or(defaults.hard_cap());
        let dense_threshold = args
            .dense_threshold
            .unwrap_or_else(|| defaults.dense_threshold().min(hard_cap));
        let viewport = ViewportConfig::new(dense_threshold, hard_cap)?;

        Ok(Self {
            database: args
                .database
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE)),
            bbox,
            viewport,
        })
    }
}

/// Parse `minX,minY,maxX,maxY` into a validated bounding box.
pub(crate) fn parse_bbox(value: &str) -> Result<BoundingBox, CliError> {
    let malformed = || CliError::MalformedBoundingBox {
        value: value.to_owned(),
    };
    let numbers = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| malformed())?;
    match numbers.as_slice() {
        &[min_x, min_y, max_x, max_y] => Ok(BoundingBox::new(min_x, min_y, max_x, max_y)?),
        _ => Err(malformed()),
    }
}

pub(crate) fn run_query(args: QueryArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    run_query_with(&config, writer)
}

pub(crate) fn run_query_with(config: &QueryConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    let store = open_existing_store(&config.database)?;
    let features = ViewportQueryEngine::new(store, config.viewport).query(&config.bbox)?;
    log::info!("viewport returned {} features", features.len());
    write_json(writer, &features)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<QueryConfig, CliError> {
    let merged = QueryArgs::merge_from_layers(layers).map_err(CliError::from)?;
    QueryConfig::try_from(merged)
}
