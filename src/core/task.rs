use std::path::{Path, PathBuf};

/// A pending directory, not yet scanned. Owned by exactly one worker's
/// queue, one in-flight `WORK_REPLY`, or the walker invocation currently
/// consuming it — never more than one of these at a time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirTask(PathBuf);

impl DirTask {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub fn into_path(self) -> PathBuf {
        self.0
    }
}

impl From<PathBuf> for DirTask {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<DirTask> for PathBuf {
    fn from(task: DirTask) -> Self {
        task.0
    }
}

impl std::fmt::Display for DirTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
