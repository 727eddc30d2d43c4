use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("missing required session parameter: {0}")]
    MissingParameter(&'static str),

    #[error("auto-save directory {}: {source}", path.display())]
    AutoSaveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
