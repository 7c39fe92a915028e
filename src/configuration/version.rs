use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const GIT_DIRECTORY: &str = ".git";

#[derive(Error, Debug)]
pub enum VcsError {
    #[error("cannot read head of branch '{branch}' at {}: {source}", path.display())]
    ReadRef {
        branch: String,
        path: PathBuf,
        source: io::Error,
    },
    #[error("head of branch '{branch}' at {} is empty", path.display())]
    EmptyRef { branch: String, path: PathBuf },
}

/// Path of the branch head reference inside the project's git metadata.
pub fn head_ref_path(root: &Path, branch: &str) -> PathBuf {
    root.join(GIT_DIRECTORY).join("refs").join("heads").join(branch)
}

/// Reads the commit hash the given branch currently points at.
///
/// This reads the loose ref file directly; no git process is spawned.
pub fn resolve_commit(root: &Path, branch: &str) -> Result<String, VcsError> {
    let path = head_ref_path(root, branch);

    let content = std::fs::read_to_string(&path).map_err(|source| VcsError::ReadRef {
        branch: branch.to_string(),
        path: path.clone(),
        source,
    })?;

    let commit = content.trim();
    if commit.is_empty() {
        return Err(VcsError::EmptyRef {
            branch: branch.to_string(),
            path,
        });
    }

    Ok(commit.to_string())
}

/// Names a deployable artifact after the branch and commit it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildIdentifier {
    pub branch: String,
    pub commit_hash: String,
}

impl BuildIdentifier {
    pub fn new(branch: impl Into<String>, commit_hash: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            commit_hash: commit_hash.into(),
        }
    }

    pub fn resolve(root: &Path, branch: &str) -> Result<Self, VcsError> {
        Ok(Self::new(branch, resolve_commit(root, branch)?))
    }

    /// Application version label, `{branch}-{commit}`.
    pub fn version(&self) -> String {
        format!("{}-{}", self.branch, self.commit_hash)
    }

    /// Object key of the uploaded archive.
    pub fn key(&self) -> String {
        format!("{}.zip", self.version())
    }
}

impl Display for BuildIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.branch, self.commit_hash)
    }
}
