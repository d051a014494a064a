//! Native plugin binding.
//!
//! A native tool is a shared library exporting three C-ABI symbols:
//!
//! ```c
//! uint32_t mcp_tool_abi_version(void);
//! int32_t  mcp_tool_execute(const uint8_t *input, size_t input_len, PluginBuffer *out);
//! void     mcp_tool_free(PluginBuffer buf);
//! ```
//!
//! `mcp_tool_execute` returns 0 on success with the output bytes in `out`, or
//! a non-zero status with an error message in `out`. Either way the host
//! hands the buffer back through `mcp_tool_free`.

use std::path::Path;
use std::ptr;

use libloading::Library;
use tracing::debug;

use super::error::ToolError;
use super::handle::NativeHandle;

/// ABI revision the host understands.
pub const ABI_VERSION: u32 = 1;

const ABI_VERSION_SYMBOL: &[u8] = b"mcp_tool_abi_version\0";
const EXECUTE_SYMBOL: &[u8] = b"mcp_tool_execute\0";
const FREE_SYMBOL: &[u8] = b"mcp_tool_free\0";

/// Byte buffer owned by the plugin.
#[repr(C)]
#[derive(Debug)]
pub struct PluginBuffer {
    pub ptr: *mut u8,
    pub len: usize,
    pub cap: usize,
}

impl PluginBuffer {
    fn empty() -> Self {
        Self {
            ptr: ptr::null_mut(),
            len: 0,
            cap: 0,
        }
    }
}

type AbiVersionFn = unsafe extern "C" fn() -> u32;
type ExecuteFn = unsafe extern "C" fn(*const u8, usize, *mut PluginBuffer) -> i32;
type FreeFn = unsafe extern "C" fn(PluginBuffer);

/// A loaded plugin library and its resolved entry points.
struct NativePlugin {
    execute: ExecuteFn,
    free: FreeFn,
    // Keeps the code behind the function pointers mapped.
    _library: Library,
}

impl NativePlugin {
    fn open(path: &Path) -> Result<Self, ToolError> {
        // SAFETY: loading a library runs its initialisers. Tools are trusted
        // by whoever places them in the tools directory.
        let library = unsafe { Library::new(path) }.map_err(|e| ToolError::load(path, e))?;

        let (version, execute, free) = unsafe {
            let version = library
                .get::<AbiVersionFn>(ABI_VERSION_SYMBOL)
                .map_err(|e| ToolError::load(path, e))?;
            let execute = library
                .get::<ExecuteFn>(EXECUTE_SYMBOL)
                .map_err(|e| ToolError::load(path, e))?;
            let free = library
                .get::<FreeFn>(FREE_SYMBOL)
                .map_err(|e| ToolError::load(path, e))?;
            (*version, *execute, *free)
        };

        let found = unsafe { version() };
        if found != ABI_VERSION {
            return Err(ToolError::load(
                path,
                format!("plugin ABI version {found}, expected {ABI_VERSION}"),
            ));
        }

        Ok(Self {
            execute,
            free,
            _library: library,
        })
    }

    fn call(&self, input: &[u8]) -> Result<Vec<u8>, String> {
        let mut out = PluginBuffer::empty();
        // SAFETY: the plugin contract guarantees `out` is either left empty
        // or filled with `len` readable bytes that stay valid until freed.
        let (status, bytes) = unsafe {
            let status = (self.execute)(input.as_ptr(), input.len(), &mut out);
            let bytes = if out.ptr.is_null() {
                Vec::new()
            } else {
                std::slice::from_raw_parts(out.ptr, out.len).to_vec()
            };
            (self.free)(out);
            (status, bytes)
        };

        if status == 0 {
            Ok(bytes)
        } else {
            Err(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

/// Load the plugin at `path` and expose it as a [`NativeHandle`].
pub fn load(path: &Path) -> Result<NativeHandle, ToolError> {
    let plugin = NativePlugin::open(path)?;
    debug!("Resolved native entry points in {}", path.display());
    Ok(NativeHandle::from_fn(move |input| plugin.call(input)))
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_library() {
        let result = load(Path::new("/nonexistent/plugin.so"));
        assert!(matches!(result, Err(ToolError::Load { .. })));
    }

    #[test]
    fn test_load_garbage_library() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.so");
        fs::write(&path, b"this is not an ELF object").unwrap();

        let result = load(&path);
        assert!(matches!(result, Err(ToolError::Load { .. })));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_load_library_without_entry_points() {
        let result = load(Path::new("libm.so.6"));
        match result {
            Err(ToolError::Load { reason, .. }) => {
                assert!(reason.contains("mcp_tool_abi_version"), "{reason}")
            }
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("libm loaded as a tool"),
        }
    }

    #[cfg(unix)]
    mod compiled {
        use super::super::fixtures::{ECHO, FAILING, FUTURE_ABI, NO_EXECUTE, build_plugin};
        use super::*;
        use std::time::Duration;

        #[tokio::test]
        async fn test_echo_plugin_round_trip() {
            let dir = TempDir::new().unwrap();
            let Some(path) = build_plugin(dir.path(), "echo", ECHO) else {
                return;
            };

            let handle = load(&path).unwrap();
            let output = handle
                .call(br#"{"a":1}"#, Duration::from_secs(5))
                .await
                .unwrap();
            assert_eq!(output, br#"{"a":1}"#);

            let empty = handle.call(b"", Duration::from_secs(5)).await.unwrap();
            assert!(empty.is_empty());
        }

        #[tokio::test]
        async fn test_plugin_error_status_carries_message() {
            let dir = TempDir::new().unwrap();
            let Some(path) = build_plugin(dir.path(), "failing", FAILING) else {
                return;
            };

            let err = load(&path)
                .unwrap()
                .call(b"{}", Duration::from_secs(5))
                .await
                .unwrap_err();
            assert!(matches!(err, ToolError::ExecutionFailed(ref m) if m == "bad expression"));
        }

        #[test]
        fn test_abi_version_mismatch_rejected() {
            let dir = TempDir::new().unwrap();
            let Some(path) = build_plugin(dir.path(), "future", FUTURE_ABI) else {
                return;
            };

            match load(&path) {
                Err(ToolError::Load { reason, .. }) => {
                    assert!(reason.contains("ABI version 2"), "{reason}")
                }
                _ => panic!("expected an ABI mismatch"),
            }
        }

        #[test]
        fn test_missing_execute_symbol_rejected() {
            let dir = TempDir::new().unwrap();
            let Some(path) = build_plugin(dir.path(), "partial", NO_EXECUTE) else {
                return;
            };

            match load(&path) {
                Err(ToolError::Load { reason, .. }) => {
                    assert!(reason.contains("mcp_tool_execute"), "{reason}")
                }
                _ => panic!("expected a missing symbol error"),
            }
        }
    }
}
