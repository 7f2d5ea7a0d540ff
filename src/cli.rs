use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::api::PostId;
use crate::route;

pub const USAGE: &str = "coachfeed: read and discuss a coaching feed post from the terminal.

Usage: coachfeed [OPTIONS] <ROUTE>

  <ROUTE>              Post to open: 42, /post/42 or post/42
  --config <PATH>      Read configuration from PATH
  --offline            Browse built-in sample data instead of the API
  --version, -V        Show version and exit
  --help,    -h        Show this help message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Version,
    Help,
    Open(OpenArgs),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenArgs {
    pub post_id: PostId,
    pub config_file: Option<PathBuf>,
    pub offline: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("missing post route")]
    MissingRoute,
    #[error("unexpected argument {0:?}")]
    Unexpected(String),
    #[error("--config requires a path")]
    MissingConfigPath,
}

pub fn parse<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut route_arg: Option<String> = None;
    let mut config_file = None;
    let mut offline = false;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => return Ok(Command::Version),
            "--help" | "-h" => return Ok(Command::Help),
            "--offline" => offline = true,
            "--config" => match args.next() {
                Some(path) => config_file = Some(PathBuf::from(path)),
                None => bail!(UsageError::MissingConfigPath),
            },
            other if other.starts_with("--") => bail!(UsageError::Unexpected(other.to_string())),
            _ => {
                if route_arg.is_some() {
                    bail!(UsageError::Unexpected(arg));
                }
                route_arg = Some(arg);
            }
        }
    }

    let Some(route_arg) = route_arg else {
        bail!(UsageError::MissingRoute);
    };
    let post_id = route::parse_post_id(&route_arg)?;
    Ok(Command::Open(OpenArgs {
        post_id,
        config_file,
        offline,
    }))
}
