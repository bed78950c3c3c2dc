pub mod anomaly;
pub mod engine;
pub mod error;
pub mod geo;
pub mod model;
pub mod output;
pub mod quality;
pub mod store;
pub mod track;
pub mod validate;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use clap::{value_parser, Arg, ArgAction, Command};
use log::{info, warn};

use crate::error::EngineError;

#[derive(Debug)]
pub struct Config {
    pub paths: Vec<String>,
    pub out_dir: PathBuf,
    pub threads: Option<usize>,
    pub as_of: Option<NaiveDateTime>,
    pub dry_run: bool,
}

fn parse_as_of(raw: &str) -> std::result::Result<NaiveDateTime, EngineError> {
    model::parse_timestamp(raw).ok_or_else(|| EngineError::InvalidTimestamp(raw.to_string()))
}

pub fn command() -> Command {
    Command::new("sea_track")
        .version("0.1")
        .about("clean AIS position reports [csv], rebuild vessel tracks and flag anomalies")
        .arg(
            Arg::new("paths")
                .short('f')
                .long("file-path")
                .action(ArgAction::Append)
                .required(true)
                .help("get file path to parse"),
        )
        .arg(
            Arg::new("out_dir")
                .short('o')
                .long("out-dir")
                .default_value("out")
                .value_parser(value_parser!(PathBuf))
                .help("directory the cleaned positions, track points and anomalies are published to"),
        )
        .arg(
            Arg::new("threads")
                .short('j')
                .long("threads")
                .value_parser(value_parser!(usize))
                .help("worker threads, defaults to one per core"),
        )
        .arg(
            Arg::new("as_of")
                .long("as-of")
                .value_parser(parse_as_of)
                .help("timestamp stamped on anomalies, defaults to now (UTC)"),
        )
        .arg(
            Arg::new("dry_run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("compute and log the run summary without publishing"),
        )
}

pub fn get_arg() -> Result<Config> {
    config_from(command().get_matches())
}

fn config_from(matches: clap::ArgMatches) -> Result<Config> {
    let paths = matches
        .get_many::<String>("paths")
        .unwrap_or_default()
        .cloned()
        .collect::<Vec<String>>();
    let out_dir = matches
        .get_one::<PathBuf>("out_dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("out"));

    Ok(Config {
        paths,
        out_dir,
        threads: matches.get_one::<usize>("threads").copied(),
        as_of: matches.get_one::<NaiveDateTime>("as_of").copied(),
        dry_run: matches.get_flag("dry_run"),
    })
}

pub fn run(config: Config) -> Result<()> {
    info!("config is {:?}", config);

    if let Some(threads) = config.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure worker pool")?;
    }

    let reports = output::load_reports(&config.paths)?;
    let as_of = config.as_of.unwrap_or_else(|| Utc::now().naive_utc());
    let result = engine::run_batch(&reports, as_of).context("run failed, previous outputs left untouched")?;

    if config.dry_run {
        warn!("dry run, nothing published");
        return Ok(());
    }
    output::publish(&config.out_dir, &result)
        .with_context(|| format!("failed to publish to {}", config.out_dir.display()))?;
    Ok(())
}
