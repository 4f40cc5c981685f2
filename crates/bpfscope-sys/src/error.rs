use std::path::PathBuf;

fn strerror(errno: &i32) -> String {
    std::io::Error::from_raw_os_error(*errno).to_string()
}

/// Errors from kernel and host calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SysError {
    /// A syscall failed with the given errno.
    #[error("{}", strerror(.0))]
    Errno(i32),

    /// A host file (sysfs, procfs) could not be read or understood.
    #[error("{path}: {reason}")]
    Host { path: PathBuf, reason: String },
}

impl SysError {
    /// Capture `errno` from the last failed libc call.
    pub fn last_os_error() -> Self {
        Self::from(std::io::Error::last_os_error())
    }

    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Errno(e) => Some(*e),
            Self::Host { .. } => None,
        }
    }

    /// `ENOENT`: no such object, or no more ids/keys.
    pub fn is_not_found(&self) -> bool {
        self.errno() == Some(libc::ENOENT)
    }

    /// `EPERM`.
    pub fn is_permission_denied(&self) -> bool {
        self.errno() == Some(libc::EPERM)
    }

    /// `EEXIST`.
    pub fn is_exists(&self) -> bool {
        self.errno() == Some(libc::EEXIST)
    }
}

impl From<std::io::Error> for SysError {
    fn from(e: std::io::Error) -> Self {
        Self::Errno(e.raw_os_error().unwrap_or(libc::EIO))
    }
}

/// Result alias for kernel calls.
pub type SysResult<T> = Result<T, SysError>;
