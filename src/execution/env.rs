//! Persistent binding environment backed by the embedded interpreter.

use std::path::Path;

use anyhow::{Context, Result};
use pyo3::prelude::*;
use pyo3::types::PyDict;

/// Symbol the hardware bootstrap binds the Micro-Manager core handle under.
pub const HARDWARE_SYMBOL: &str = "mmc";

/// One engine's symbol table. Created once per engine instance and passed to
/// every execution; bindings accumulate across code units by design, so a
/// later unit can observe, use, or corrupt state left by an earlier one.
pub struct BindingEnv {
    table: Py<PyDict>,
}

impl BindingEnv {
    pub fn new() -> Self {
        Python::with_gil(|py| Self { table: PyDict::new_bound(py).unbind() })
    }

    /// Run the bootstrap unit once against the fresh table. An empty unit is
    /// a valid bootstrap (bench and test use).
    pub fn bootstrap(&self, unit: &str) -> Result<()> {
        if unit.trim().is_empty() {
            return Ok(());
        }
        Python::with_gil(|py| self.execute(py, unit)).context("bootstrap unit failed")
    }

    /// Run a code unit with the table as globals. Top-level assignments are
    /// durable mutations visible to all future executions.
    pub fn execute(&self, py: Python<'_>, code: &str) -> PyResult<()> {
        py.run_bound(code, Some(self.table.bind(py)), None)
    }

    pub fn contains(&self, py: Python<'_>, name: &str) -> bool {
        self.table.bind(py).contains(name).unwrap_or(false)
    }

    pub fn insert(&self, py: Python<'_>, name: &str, value: &Bound<'_, PyAny>) -> PyResult<()> {
        self.table.bind(py).set_item(name, value)
    }
}

/// Bootstrap unit that establishes the Micro-Manager core handle and loads
/// the named hardware configuration into it.
pub fn hardware_bootstrap(cfg_path: &Path) -> String {
    let path = cfg_path
        .display()
        .to_string()
        .replace('\\', "\\\\")
        .replace('\'', "\\'");
    format!(
        "from pymmcore_plus import CMMCorePlus\n\
         {HARDWARE_SYMBOL} = CMMCorePlus().instance()\n\
         {HARDWARE_SYMBOL}.loadSystemConfiguration(fileName='{path}')"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_survive_between_executions() {
        let env = BindingEnv::new();
        Python::with_gil(|py| {
            env.execute(py, "y = 5").unwrap();
            env.execute(py, "z = y + 1").unwrap();
        });
        assert!(Python::with_gil(|py| env.contains(py, "z")));
    }

    #[test]
    fn rebinding_overwrites() {
        let env = BindingEnv::new();
        Python::with_gil(|py| {
            env.execute(py, "y = 1").unwrap();
            env.execute(py, "y = 2").unwrap();
            env.execute(py, "assert y == 2").unwrap();
        });
    }

    #[test]
    fn bootstrap_failure_is_an_error() {
        let env = BindingEnv::new();
        assert!(env.bootstrap("raise RuntimeError('no hardware')").is_err());
    }

    #[test]
    fn hardware_bootstrap_quotes_path() {
        let unit = hardware_bootstrap(Path::new("/data/it's.cfg"));
        assert!(unit.contains("fileName='/data/it\\'s.cfg'"));
        assert!(unit.contains("mmc = CMMCorePlus().instance()"));
    }
}
