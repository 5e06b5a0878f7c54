//! Scratch directory holding the files handed to the editor.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Directory name under the system temp directory; the user follows it.
pub const SCRATCH_DIR_NAME: &str = "shell-rewrite-edit";

/// Prefix of every scratch file; the owning process id follows it.
const FILE_PREFIX: &str = "edit-";

/// Where edit sessions put their temporary files.
///
/// Files are named `edit-<pid>-<random>.js` so that shells running side by
/// side never collide, and so files left behind by a killed shell can be
/// recognised and removed by the next one.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Use `path` as the scratch directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<system temp>/shell-rewrite-edit-<user>`.
    pub fn default_location() -> Self {
        Self::new(std::env::temp_dir().join(format!("{}-{}", SCRATCH_DIR_NAME, user_tag())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory if it is missing, readable by the owner only.
    ///
    /// On Unix an existing directory must be a real directory owned by the
    /// current user; group and other permissions are removed from it.
    pub fn ensure(&self) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::{DirBuilderExt, MetadataExt, PermissionsExt};
            std::fs::DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(&self.path)?;

            let metadata = std::fs::symlink_metadata(&self.path)?;
            if !metadata.is_dir() {
                return Err(io::Error::other(format!(
                    "{} is not a directory",
                    self.path.display()
                )));
            }
            // SAFETY: getuid has no preconditions and cannot fail.
            let uid = unsafe { libc::getuid() };
            if metadata.uid() != uid {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!(
                        "scratch directory {} is owned by uid {}, not {}",
                        self.path.display(),
                        metadata.uid(),
                        uid
                    ),
                ));
            }
            if metadata.mode() & 0o077 != 0 {
                warn!(
                    path = %self.path.display(),
                    mode = %format_args!("{:o}", metadata.mode() & 0o777),
                    "restricting scratch directory to its owner"
                );
                std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o700))?;
            }
            Ok(())
        }
        #[cfg(not(unix))]
        {
            std::fs::create_dir_all(&self.path)
        }
    }

    /// Create a scratch file holding `content`.
    ///
    /// The file is deleted when the returned handle is dropped.
    pub fn create_file(&self, content: &str) -> io::Result<NamedTempFile> {
        self.ensure()?;
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}{}-", FILE_PREFIX, std::process::id()))
            .suffix(".js")
            .tempfile_in(&self.path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        debug!(path = %file.path().display(), bytes = content.len(), "created scratch file");
        Ok(file)
    }

    /// Remove files left behind by shells that are no longer running.
    ///
    /// Returns the number of files removed. A missing directory is not an
    /// error.
    pub fn sweep_stale(&self) -> usize {
        let entries = match std::fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read scratch directory");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(pid) = name.to_str().and_then(pid_from_name) else {
                continue;
            };
            if pid == std::process::id() || !is_stale(pid, &entry) {
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "could not remove stale scratch file")
                }
            }
        }
        if removed > 0 {
            debug!(removed, "swept stale scratch files");
        }
        removed
    }
}

#[cfg(unix)]
fn user_tag() -> String {
    // SAFETY: getuid has no preconditions and cannot fail.
    unsafe { libc::getuid() }.to_string()
}

#[cfg(not(unix))]
fn user_tag() -> String {
    std::env::var("USERNAME").unwrap_or_else(|_| "default".to_string())
}

/// The process id embedded in a scratch file name.
pub fn pid_from_name(name: &str) -> Option<u32> {
    name.strip_prefix(FILE_PREFIX)?
        .split('-')
        .next()?
        .parse()
        .ok()
}

#[cfg(unix)]
fn is_stale(pid: u32, _entry: &std::fs::DirEntry) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return true;
    };
    // Signal 0 only checks whether the process exists.
    let alive = unsafe { libc::kill(pid, 0) } == 0
        || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM);
    !alive
}

#[cfg(not(unix))]
fn is_stale(_pid: u32, entry: &std::fs::DirEntry) -> bool {
    const MAX_AGE: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);
    entry
        .metadata()
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age > MAX_AGE)
}
