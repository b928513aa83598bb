// Off-site copies of the saved submissions.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{info, warn};
use snafu::{prelude::*, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ArchiveError {
    #[snafu(display("Could not copy {} to {}: {}", path, target, source))]
    Copy {
        source: std::io::Error,
        path: String,
        target: String,
    },
    #[snafu(display("Could not run git {}: {}", step, source))]
    GitLaunch {
        source: std::io::Error,
        step: String,
    },
    #[snafu(display("git {} failed: {}", step, stderr))]
    GitFailed { step: String, stderr: String },
    #[snafu(display("{} is not a file", path))]
    NotAFile { path: String },
}

/// A place where a submission file is copied after it has been saved locally.
pub trait ArchiveSink {
    fn name(&self) -> String;

    fn archive(&self, path: &Path) -> Result<(), ArchiveError>;
}

/// Keeps the local file only.
pub struct NoArchive;

impl ArchiveSink for NoArchive {
    fn name(&self) -> String {
        "none".to_string()
    }

    fn archive(&self, _path: &Path) -> Result<(), ArchiveError> {
        Ok(())
    }
}

/// Copies the file into a backup directory.
pub struct DirectoryArchive {
    pub dir: PathBuf,
}

impl ArchiveSink for DirectoryArchive {
    fn name(&self) -> String {
        format!("directory {}", self.dir.display())
    }

    fn archive(&self, path: &Path) -> Result<(), ArchiveError> {
        let file_name = path.file_name().context(NotAFileSnafu {
            path: path.display().to_string(),
        })?;
        let target = self.dir.join(file_name);
        let ctx = || CopySnafu {
            path: path.display().to_string(),
            target: target.display().to_string(),
        };
        fs::create_dir_all(&self.dir).with_context(|_| ctx())?;
        fs::copy(path, &target).with_context(|_| ctx())?;
        Ok(())
    }
}

/// Adds and commits the file in a git repository.
pub struct GitArchive {
    pub repo: PathBuf,
}

impl GitArchive {
    fn git(&self, step: &str, args: &[&str]) -> Result<(), ArchiveError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo)
            .args(args)
            .output()
            .context(GitLaunchSnafu { step })?;
        ensure!(
            output.status.success(),
            GitFailedSnafu {
                step,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
        );
        Ok(())
    }
}

impl ArchiveSink for GitArchive {
    fn name(&self) -> String {
        format!("git repository {}", self.repo.display())
    }

    fn archive(&self, path: &Path) -> Result<(), ArchiveError> {
        let file = path.display().to_string();
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file.clone());
        let message = format!("Add Delphi submission {}", file_name);
        self.git("add", &["add", file.as_str()])?;
        self.git(
            "commit",
            &["commit", "-m", message.as_str(), "--", file.as_str()],
        )?;
        Ok(())
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ArchiveKind {
    None,
    Directory(PathBuf),
    Git(PathBuf),
}

impl ArchiveKind {
    pub fn sink(&self) -> Box<dyn ArchiveSink> {
        match self {
            ArchiveKind::None => Box::new(NoArchive),
            ArchiveKind::Directory(dir) => Box::new(DirectoryArchive { dir: dir.clone() }),
            ArchiveKind::Git(repo) => Box::new(GitArchive { repo: repo.clone() }),
        }
    }
}

/// Archives a saved submission. A failure is returned as a warning message.
pub fn archive_submission(sink: &dyn ArchiveSink, path: &Path) -> Option<String> {
    match sink.archive(path) {
        Ok(()) => {
            info!("Archived {:?} to {}", path, sink.name());
            None
        }
        Err(e) => {
            let msg = format!(
                "Submission saved to {} but not archived to {}: {}",
                path.display(),
                sink.name(),
                e
            );
            warn!("{}", msg);
            Some(msg)
        }
    }
}
