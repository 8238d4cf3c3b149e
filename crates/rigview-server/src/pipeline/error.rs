use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io,
    path::PathBuf,
    process::ExitStatus,
};

use rigview_asset::error::PayloadError;

use super::chain::Stage;

/// Why a conversion cycle was aborted.
#[derive(Debug)]
pub enum PipelineError {
    Spawn {
        stage: Stage,
        program: String,
        source: io::Error,
    },
    ToolFailed {
        stage: Stage,
        status: ExitStatus,
        stderr: String,
    },
    Read {
        stage: Stage,
        path: PathBuf,
        source: io::Error,
    },
    Payload(PayloadError),
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn {
                stage,
                program,
                source,
            } => write!(f, "Failed to start {} for {} stage: {}", program, stage, source),
            Self::ToolFailed {
                stage,
                status,
                stderr,
            } => {
                write!(f, "{} stage exited with {}", stage, status)?;
                if !stderr.is_empty() {
                    write!(f, ": {}", stderr)?;
                }
                Ok(())
            }
            Self::Read {
                stage,
                path,
                source,
            } => write!(
                f,
                "Failed to read {} output {}: {}",
                stage,
                path.display(),
                source
            ),
            Self::Payload(err) => write!(f, "Malformed payload: {}", err),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn { source, .. } | Self::Read { source, .. } => Some(source),
            Self::Payload(err) => Some(err),
            Self::ToolFailed { .. } => None,
        }
    }
}

impl From<PayloadError> for PipelineError {
    fn from(value: PayloadError) -> Self {
        Self::Payload(value)
    }
}
