//! Tool loader: turns a tool file into an invocable handle.

use std::path::Path;

use tracing::{debug, instrument};

use super::error::ToolError;
use super::handle::ToolHandle;
use super::native;
use super::script::ScriptHandle;
use crate::domains::catalog::{ToolType, classify};

/// Produce a handle for the tool file at `path`, dispatched on its type.
///
/// Native plugins are opened and their entry points resolved immediately.
/// Scripts are only checked for existence; they are interpreted at execution
/// time.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_handler(path: &Path) -> Result<ToolHandle, ToolError> {
    let handle = match classify::tool_type(path) {
        ToolType::NativePlugin => ToolHandle::Native(native::load(path)?),
        ToolType::InterpretedScript => ToolHandle::Script(ScriptHandle::open(path)?),
        unsupported @ ToolType::Unknown => return Err(ToolError::UnsupportedType(unsupported)),
    };

    debug!("Loaded {} tool handle", handle.kind());
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_script_handler() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("analyze.py");
        fs::write(&path, "print('{}')\n").unwrap();

        let handle = load_handler(&path).unwrap();
        match handle {
            ToolHandle::Script(script) => assert_eq!(script.path(), path.as_path()),
            ToolHandle::Native(_) => panic!("expected a script handle"),
        }
    }

    #[test]
    fn test_load_unknown_type() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.sh");
        fs::write(&path, "echo hi\n").unwrap();

        let err = load_handler(&path).err().unwrap();
        assert!(matches!(err, ToolError::UnsupportedType(ToolType::Unknown)));
        assert!(err.to_string().contains("Unsupported tool type"));
    }

    #[test]
    fn test_load_broken_native() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calc.so");
        fs::write(&path, b"\x7fELF not really").unwrap();

        assert!(matches!(load_handler(&path), Err(ToolError::Load { .. })));
    }
}
