use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

#[derive(Debug)]
pub enum PayloadError {
    Json(serde_json::Error),
    JointCount {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    JointIndex {
        vertex: usize,
        joint: u32,
    },
    IndexOutOfRange {
        attribute: &'static str,
        index: u32,
        len: usize,
    },
    CornerCount {
        positions: usize,
        normals: usize,
        uvs: usize,
    },
    KeyframeTime {
        action: String,
        time: String,
    },
    DuplicateKeyframe {
        action: String,
        time: f32,
    },
}

impl Display for PayloadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(err) => write!(f, "Bad payload json: {}", err),
            Self::JointCount {
                what,
                expected,
                found,
            } => write!(f, "Expected {} joints in {}, found {}", expected, what, found),
            Self::JointIndex { vertex, joint } => {
                write!(f, "Vertex {} is influenced by unknown joint {}", vertex, joint)
            }
            Self::IndexOutOfRange {
                attribute,
                index,
                len,
            } => write!(
                f,
                "Index {} out of range for {} with {} entries",
                index, attribute, len
            ),
            Self::CornerCount {
                positions,
                normals,
                uvs,
            } => write!(
                f,
                "Bad triangle corners: {} position, {} normal and {} uv indices",
                positions, normals, uvs
            ),
            Self::KeyframeTime { action, time } => {
                write!(f, "Bad keyframe time \"{}\" in action {}", time, action)
            }
            Self::DuplicateKeyframe { action, time } => {
                write!(f, "Duplicate keyframe at {}s in action {}", time, action)
            }
        }
    }
}

impl Error for PayloadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PayloadError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
