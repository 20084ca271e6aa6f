//! Failure classification and dependency healing.

use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use pyo3::exceptions::{PyImportError, PyNameError};
use pyo3::prelude::*;
use tracing::{debug, warn};

use super::env::BindingEnv;

/// Classified execution failure. `MissingBinding` and `MissingPackage` are
/// recoverable; everything else is terminal for the current call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecFailure {
    /// Symbol importable from the module search path but not yet bound.
    MissingBinding(String),
    /// Module not resolvable locally; must be fetched from the registry.
    MissingPackage(String),
    Fatal(String),
}

/// Classify a raised failure by the resolvability of the offending symbol.
///
/// The symbol name comes from structured exception metadata (`NameError.name`,
/// `ImportError.name`), never from slicing the rendered message. A failure
/// without usable metadata, or one whose symbol is already bound, is fatal.
pub fn classify(py: Python<'_>, err: &PyErr, env: &BindingEnv) -> ExecFailure {
    // PyImportError also matches ModuleNotFoundError, its subclass.
    if !err.is_instance_of::<PyNameError>(py) && !err.is_instance_of::<PyImportError>(py) {
        return ExecFailure::Fatal(err.to_string());
    }
    let Some(name) = failing_name(py, err) else {
        return ExecFailure::Fatal(err.to_string());
    };
    if env.contains(py, &name) {
        return ExecFailure::Fatal(err.to_string());
    }
    if importable(py, &name) {
        ExecFailure::MissingBinding(name)
    } else {
        ExecFailure::MissingPackage(name)
    }
}

fn failing_name(py: Python<'_>, err: &PyErr) -> Option<String> {
    let name = err.value_bound(py).getattr("name").ok()?;
    name.extract::<Option<String>>()
        .ok()
        .flatten()
        .filter(|n| !n.is_empty())
}

/// Side-effect-free probe of the interpreter's module search path.
pub fn importable(py: Python<'_>, name: &str) -> bool {
    let util = match py.import_bound("importlib.util") {
        Ok(m) => m,
        Err(_) => return false,
    };
    // find_spec itself raises for some malformed names; those are not importable
    match util.call_method1("find_spec", (name,)) {
        Ok(spec) => !spec.is_none(),
        Err(_) => false,
    }
}

/// Import the named module through the standard resolution mechanism and
/// insert it into the bindings under that name.
pub fn resolve_missing_binding(py: Python<'_>, name: &str, env: &BindingEnv) -> PyResult<()> {
    let module = py.import_bound(name)?;
    env.insert(py, name, module.as_any())
}

/// External package installer, invoked as a blocking subprocess. The program
/// and argument prefix are configurable; the package name is appended.
#[derive(Debug, Clone)]
pub struct PackageInstaller {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl Default for PackageInstaller {
    fn default() -> Self {
        Self::pip(Duration::from_secs(300))
    }
}

impl PackageInstaller {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self { program: program.into(), args, timeout }
    }

    pub fn pip(timeout: Duration) -> Self {
        Self::new(
            "python3",
            vec!["-m".into(), "pip".into(), "install".into()],
            timeout,
        )
    }

    /// Make the named package importable. Checks the search path first, so a
    /// package already present under a different import name than expected is
    /// resolved without touching the installer. Returns false when the
    /// installer exits non-zero, cannot be spawned, or overruns its deadline;
    /// the caller must treat the dependency as unresolvable for this attempt.
    pub fn resolve(&self, name: &str) -> bool {
        if Python::with_gil(|py| importable(py, name)) {
            debug!(module = %name, "package already importable, skipping install");
            return true;
        }
        self.install(name)
    }

    fn install(&self, name: &str) -> bool {
        debug!(module = %name, program = %self.program, "installing package");
        // Installer stdout/stderr are not surfaced to the caller.
        let mut child = match Command::new(&self.program)
            .args(&self.args)
            .arg(name)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(c) => c,
            Err(e) => {
                warn!(module = %name, error = %e, "failed to spawn installer");
                return false;
            }
        };

        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return status.success(),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        warn!(module = %name, "installer deadline exceeded, killing");
                        let _ = child.kill();
                        let _ = child.wait();
                        return false;
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    warn!(module = %name, error = %e, "failed to wait on installer");
                    return false;
                }
            }
        }
    }
}
