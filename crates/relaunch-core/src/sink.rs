use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;

/// Log file that receives a launched child's stdout and stderr
///
/// The file is created or truncated when the sink is opened. Converting it into
/// [`Stdio`] pairs hands the only open handles to the child, so the launcher
/// keeps nothing open once the spawn call returns.
#[derive(Debug)]
pub struct LogSink {
    path: PathBuf,
    file: File,
}

impl LogSink {
    /// Create or truncate the log file at `path`
    ///
    /// The parent directory must already exist.
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("cannot open log file {}: {e}", path.display()),
            )
        })?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Split into stdout and stderr redirections sharing one file offset
    pub fn into_stdio(self) -> std::io::Result<(Stdio, Stdio)> {
        let err = self.file.try_clone()?;
        Ok((Stdio::from(self.file), Stdio::from(err)))
    }
}
