//! Scoped redirection of the interpreter's stdout into a buffer.

use pyo3::prelude::*;

/// Replaces `sys.stdout` with an in-memory `io.StringIO` for the duration of
/// one execution attempt. Dropping the guard restores the original stream on
/// every exit path, including fatal failures mid-attempt.
pub struct CapturedStdout {
    original: PyObject,
    buffer: PyObject,
}

impl CapturedStdout {
    pub fn redirect(py: Python<'_>) -> PyResult<Self> {
        let sys = py.import_bound("sys")?;
        let buffer = py.import_bound("io")?.getattr("StringIO")?.call0()?;
        let original = sys.getattr("stdout")?;
        sys.setattr("stdout", &buffer)?;
        Ok(Self {
            original: original.unbind(),
            buffer: buffer.unbind(),
        })
    }

    /// Buffer contents so far, trimmed of surrounding whitespace.
    pub fn contents(&self, py: Python<'_>) -> PyResult<String> {
        let text: String = self.buffer.bind(py).call_method0("getvalue")?.extract()?;
        Ok(text.trim().to_string())
    }
}

impl Drop for CapturedStdout {
    fn drop(&mut self) {
        Python::with_gil(|py| {
            if let Ok(sys) = py.import_bound("sys") {
                let _ = sys.setattr("stdout", self.original.bind(py));
            }
        });
    }
}
