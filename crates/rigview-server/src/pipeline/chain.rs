use std::{
    ffi::OsString,
    fmt::{self, Display, Formatter},
    path::{Path, PathBuf},
    process::Stdio,
};

use futures::{future::BoxFuture, FutureExt};
use log::debug;
use tokio::{fs, process::Command};

use crate::config::{CommandSpec, ServerConfig};

use super::{barrier::Generation, error::PipelineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Export,
    Geometry,
    Animation,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Export => write!(f, "export"),
            Stage::Geometry => write!(f, "geometry"),
            Stage::Animation => write!(f, "animation"),
        }
    }
}

/// The external tools that turn the watched source into the two payloads.
///
/// `export` runs first; the two conversions then run concurrently and each
/// yields its payload as JSON text.
pub trait ExportChain: Send + Sync + 'static {
    fn export(&self, generation: Generation) -> BoxFuture<'_, Result<(), PipelineError>>;

    fn convert_geometry(&self, generation: Generation)
        -> BoxFuture<'_, Result<String, PipelineError>>;

    fn convert_animation(
        &self,
        generation: Generation,
    ) -> BoxFuture<'_, Result<String, PipelineError>>;
}

/// Files derived from the source path: `<stem>.dae`, `<stem>.json` and
/// `<stem>-actions.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub source: PathBuf,
    pub stem: PathBuf,
    pub collada: PathBuf,
    pub model_json: PathBuf,
    pub actions: PathBuf,
}

fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut path = OsString::from(stem.as_os_str());
    path.push(suffix);
    PathBuf::from(path)
}

impl ExportPaths {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let stem = source.with_extension("");
        Self {
            collada: with_suffix(&stem, ".dae"),
            model_json: with_suffix(&stem, ".json"),
            actions: with_suffix(&stem, "-actions.json"),
            stem,
            source,
        }
    }

    pub fn substitute(&self, template: &str) -> String {
        template
            .replace("{source}", &self.source.display().to_string())
            .replace("{stem}", &self.stem.display().to_string())
            .replace("{collada}", &self.collada.display().to_string())
            .replace("{model_json}", &self.model_json.display().to_string())
            .replace("{actions}", &self.actions.display().to_string())
    }
}

/// Runs the configured commands and reads their output files.
#[derive(Debug, Clone)]
pub struct CommandChain {
    paths: ExportPaths,
    export: CommandSpec,
    geometry: Option<CommandSpec>,
    animation: Option<CommandSpec>,
}

impl CommandChain {
    pub fn new(
        paths: ExportPaths,
        export: CommandSpec,
        geometry: Option<CommandSpec>,
        animation: Option<CommandSpec>,
    ) -> Self {
        Self {
            paths,
            export,
            geometry,
            animation,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            ExportPaths::new(&config.source),
            config.export.clone(),
            config.geometry.clone(),
            config.animation.clone(),
        )
    }

    async fn run(
        &self,
        generation: Generation,
        stage: Stage,
        command: &CommandSpec,
    ) -> Result<(), PipelineError> {
        let args: Vec<String> = command
            .args
            .iter()
            .map(|arg| self.paths.substitute(arg))
            .collect();
        debug!(
            "Cycle {} {} stage: {} {:?}",
            generation, stage, command.program, args
        );
        let output = Command::new(&command.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| PipelineError::Spawn {
                stage,
                program: command.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(PipelineError::ToolFailed {
                stage,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    async fn convert(
        &self,
        generation: Generation,
        stage: Stage,
        command: Option<&CommandSpec>,
        output: &Path,
    ) -> Result<String, PipelineError> {
        if let Some(command) = command {
            self.run(generation, stage, command).await?;
        }
        fs::read_to_string(output)
            .await
            .map_err(|source| PipelineError::Read {
                stage,
                path: output.to_path_buf(),
                source,
            })
    }
}

impl ExportChain for CommandChain {
    fn export(&self, generation: Generation) -> BoxFuture<'_, Result<(), PipelineError>> {
        self.run(generation, Stage::Export, &self.export).boxed()
    }

    fn convert_geometry(
        &self,
        generation: Generation,
    ) -> BoxFuture<'_, Result<String, PipelineError>> {
        self.convert(
            generation,
            Stage::Geometry,
            self.geometry.as_ref(),
            &self.paths.model_json,
        )
        .boxed()
    }

    fn convert_animation(
        &self,
        generation: Generation,
    ) -> BoxFuture<'_, Result<String, PipelineError>> {
        self.convert(
            generation,
            Stage::Animation,
            self.animation.as_ref(),
            &self.paths.actions,
        )
        .boxed()
    }
}
