//! Interpreter availability checking.

use std::fmt;
use std::path::{Path, PathBuf};

/// Whether the configured interpreter can be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpreterStatus {
    /// Interpreter found at `path`.
    Available { interpreter: String, path: PathBuf },

    /// Interpreter not found on `PATH` (or at the given absolute path).
    Missing {
        interpreter: String,
        install_hint: String,
    },
}

impl InterpreterStatus {
    /// Check if the interpreter is available.
    pub fn is_available(&self) -> bool {
        matches!(self, InterpreterStatus::Available { .. })
    }

    /// Get the install hint if the interpreter is missing.
    pub fn install_hint(&self) -> Option<&str> {
        match self {
            InterpreterStatus::Missing { install_hint, .. } => Some(install_hint),
            _ => None,
        }
    }

    /// Locate `interpreter` using the process `PATH`.
    pub fn detect(interpreter: &str) -> Self {
        Self::detect_in(interpreter, std::env::var_os("PATH").as_deref())
    }

    /// Locate `interpreter` using an explicit search path.
    ///
    /// Names containing a path separator are checked directly.
    pub fn detect_in(interpreter: &str, search_path: Option<&std::ffi::OsStr>) -> Self {
        let direct = Path::new(interpreter);
        let found = if direct.components().count() > 1 {
            Some(direct.to_path_buf()).filter(|p| is_executable(p))
        } else {
            search_path.and_then(|paths| {
                std::env::split_paths(paths)
                    .map(|dir| dir.join(interpreter))
                    .find(|candidate| is_executable(candidate))
            })
        };

        match found {
            Some(path) => InterpreterStatus::Available {
                interpreter: interpreter.to_string(),
                path,
            },
            None => InterpreterStatus::Missing {
                interpreter: interpreter.to_string(),
                install_hint: format!(
                    "Targets are executed with '{interpreter}'.\n\
                     Install it or point [execution] interpreter at an absolute path:\n\
                     \n\
                       Ubuntu/Debian: sudo apt-get install php-cli\n\
                       Fedora:        sudo dnf install php-cli\n\
                       Alpine:        sudo apk add php\n\
                     \n\
                     Static HTML targets can use [execution] runner = \"static\" instead."
                ),
            },
        }
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

impl fmt::Display for InterpreterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpreterStatus::Available { interpreter, path } => {
                write!(f, "Interpreter '{interpreter}' available ({})", path.display())
            }
            InterpreterStatus::Missing {
                interpreter,
                install_hint,
            } => {
                write!(f, "Interpreter '{interpreter}' unavailable\n\n{install_hint}")
            }
        }
    }
}
