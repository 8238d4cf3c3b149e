use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    fs, io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8989;

/// An external program with argument templates.
///
/// Arguments may contain `{source}`, `{stem}`, `{collada}`, `{model_json}`
/// and `{actions}`, substituted per cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub source: PathBuf,
    pub debounce_ms: u64,
    /// Writes the collada file and the actions JSON.
    pub export: CommandSpec,
    /// Writes the geometry JSON from the collada file.
    pub geometry: Option<CommandSpec>,
    pub animation: Option<CommandSpec>,
    pub convert_on_start: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            source: PathBuf::from("model.blend"),
            debounce_ms: 100,
            export: CommandSpec::new(
                "blender",
                [
                    "{source}",
                    "--background",
                    "--python",
                    "ik2fk.py",
                    "--python",
                    "actions-to-json.py",
                    "--python",
                    "blender-to-dae.py",
                    "--",
                    "{actions}",
                    "{collada}",
                ],
            ),
            geometry: Some(CommandSpec::new(
                "sh",
                [
                    "-c",
                    "node ./node_modules/collada-dae-parser/bin/dae2json.js < '{collada}' > '{model_json}'",
                ],
            )),
            animation: None,
            convert_on_start: false,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|err| ConfigError::Read(path.into(), err))?;
        serde_json::from_str(&text).map_err(|err| ConfigError::Parse(path.into(), err))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read(PathBuf, io::Error),
    Parse(PathBuf, serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(path, err) => write!(f, "Failed to read {}: {}", path.display(), err),
            Self::Parse(path, err) => write!(f, "Bad config {}: {}", path.display(), err),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read(_, err) => Some(err),
            Self::Parse(_, err) => Some(err),
        }
    }
}

/// Watches a model source file and pushes every converted reload to the
/// connected viewers.
#[derive(Debug, Parser)]
#[command(name = "rigview-server", version)]
pub struct Args {
    /// JSON config file; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Address of the reload websocket
    #[arg(long)]
    pub listen: Option<SocketAddr>,
    /// Model source file to watch
    #[arg(long)]
    pub source: Option<PathBuf>,
    /// Convert once at startup, before any change
    #[arg(long)]
    pub convert_on_start: bool,
}

impl Args {
    pub fn load_config(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(source) = &self.source {
            config.source.clone_from(source);
        }
        config.convert_on_start |= self.convert_on_start;
        Ok(config)
    }
}
