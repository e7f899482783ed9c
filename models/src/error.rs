use std::{
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
};

use nn::NnErr;

/// All errors that can occur while loading a run configuration or its data.
#[derive(Debug)]
pub enum ConfigErr {
    /// A file couldn't be read.
    Io { path: PathBuf, source: io::Error },
    /// A file isn't valid JSON for the expected layout.
    Json(serde_json::Error),
    /// The configuration parsed but describes an impossible run.
    Invalid(String),
    /// The data described by the configuration was rejected.
    Dataset(NnErr),
}

impl Display for ConfigErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "can't read {}: {source}", path.display()),
            Self::Json(e) => write!(f, "invalid JSON: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
            Self::Dataset(e) => write!(f, "invalid data: {e}"),
        }
    }
}

impl Error for ConfigErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(e) => Some(e),
            Self::Dataset(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigErr {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<NnErr> for ConfigErr {
    fn from(e: NnErr) -> Self {
        Self::Dataset(e)
    }
}
