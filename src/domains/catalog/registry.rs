//! The live catalog of resources and tools.
//!
//! One reader/writer lock guards both maps. Writers hold it only to insert or
//! remove an `Arc`; tool loading happens before the lock is taken, so a slow
//! plugin never stalls readers.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::{info, instrument};

use super::descriptor::{ResourceDescriptor, ToolDescriptor};
use crate::domains::tools::{ToolError, ToolHandle, load_handler};

#[derive(Default)]
struct Entries {
    resources: HashMap<String, Arc<ResourceDescriptor>>,
    tools: HashMap<String, Arc<ToolDescriptor>>,
}

/// Concurrency-safe registry of resources and tools.
///
/// Resource and tool names live in separate namespaces. Registering an
/// existing name replaces the previous descriptor wholesale.
#[derive(Default)]
pub struct Catalog {
    entries: RwLock<Entries>,
}

/// Serializable snapshot of the whole catalog, without tool handles.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogExport {
    pub resources: BTreeMap<String, ResourceDescriptor>,
    pub tools: BTreeMap<String, ToolDescriptor>,
    pub counts: CatalogCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub resources: usize,
    pub tools: usize,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a half-written entry
    // behind (every write is a single insert or remove), so poisoning is
    // ignored.
    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    /// Classify and insert (or replace) a resource.
    pub fn register_resource(
        &self,
        name: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> Arc<ResourceDescriptor> {
        let descriptor = Arc::new(ResourceDescriptor::new(name, file_path));
        self.write()
            .resources
            .insert(descriptor.name.clone(), Arc::clone(&descriptor));

        info!(
            "Registered resource: {} ({:?}) at {}",
            descriptor.name,
            descriptor.resource_type,
            descriptor.file_path.display()
        );
        descriptor
    }

    /// Remove a resource. Absent names are ignored.
    pub fn unregister_resource(&self, name: &str) -> bool {
        let removed = self.write().resources.remove(name).is_some();
        if removed {
            info!("Unregistered resource: {}", name);
        }
        removed
    }

    pub fn get_resource(&self, name: &str) -> Option<Arc<ResourceDescriptor>> {
        self.read().resources.get(name).cloned()
    }

    /// Snapshot of all resources, in no particular order.
    pub fn list_resources(&self) -> Vec<Arc<ResourceDescriptor>> {
        self.read().resources.values().cloned().collect()
    }

    pub fn resource_names(&self) -> Vec<String> {
        self.read().resources.keys().cloned().collect()
    }

    pub fn resource_count(&self) -> usize {
        self.read().resources.len()
    }

    // ------------------------------------------------------------------
    // Tools
    // ------------------------------------------------------------------

    /// Load the tool at `file_path` and insert (or replace) it.
    ///
    /// On failure nothing is inserted and any existing entry under `name`
    /// is left untouched.
    #[instrument(skip_all, fields(tool = tracing::field::Empty))]
    pub fn register_tool(
        &self,
        name: impl Into<String>,
        file_path: impl AsRef<Path>,
        description: impl Into<String>,
    ) -> Result<Arc<ToolDescriptor>, ToolError> {
        let name = name.into();
        tracing::Span::current().record("tool", name.as_str());
        let file_path = file_path.as_ref();

        let handle = load_handler(file_path)?;
        Ok(self.insert_tool(ToolDescriptor::new(name, description, file_path, handle)))
    }

    /// Insert a tool whose handle was built by the caller.
    pub fn register_tool_handle(
        &self,
        name: impl Into<String>,
        file_path: impl Into<PathBuf>,
        description: impl Into<String>,
        handle: ToolHandle,
    ) -> Arc<ToolDescriptor> {
        self.insert_tool(ToolDescriptor::new(name, description, file_path, handle))
    }

    fn insert_tool(&self, descriptor: ToolDescriptor) -> Arc<ToolDescriptor> {
        let descriptor = Arc::new(descriptor);
        self.write()
            .tools
            .insert(descriptor.name.clone(), Arc::clone(&descriptor));

        info!(
            "Registered tool: {} ({}) at {}",
            descriptor.name,
            descriptor.tool_type,
            descriptor.file_path.display()
        );
        descriptor
    }

    /// Remove a tool. Absent names are ignored.
    pub fn unregister_tool(&self, name: &str) -> bool {
        let removed = self.write().tools.remove(name).is_some();
        if removed {
            info!("Unregistered tool: {}", name);
        }
        removed
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<ToolDescriptor>> {
        self.read().tools.get(name).cloned()
    }

    /// Snapshot of all tools, in no particular order.
    pub fn list_tools(&self) -> Vec<Arc<ToolDescriptor>> {
        self.read().tools.values().cloned().collect()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.read().tools.keys().cloned().collect()
    }

    pub fn tool_count(&self) -> usize {
        self.read().tools.len()
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    pub fn counts(&self) -> CatalogCounts {
        let entries = self.read();
        CatalogCounts {
            resources: entries.resources.len(),
            tools: entries.tools.len(),
        }
    }

    /// Consistent snapshot of every descriptor plus counts.
    pub fn export_registry(&self) -> CatalogExport {
        let entries = self.read();
        let resources: BTreeMap<_, _> = entries
            .resources
            .iter()
            .map(|(name, r)| (name.clone(), ResourceDescriptor::clone(r)))
            .collect();
        let tools: BTreeMap<_, _> = entries
            .tools
            .iter()
            .map(|(name, t)| (name.clone(), ToolDescriptor::clone(t)))
            .collect();

        CatalogExport {
            counts: CatalogCounts {
                resources: resources.len(),
                tools: tools.len(),
            },
            resources,
            tools,
        }
    }

    /// The export snapshot rendered as pretty-printed JSON.
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.export_registry())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::catalog::{ResourceType, ToolType};
    use crate::domains::tools::NativeHandle;
    use std::fs;
    use std::thread;
    use tempfile::TempDir;

    fn echo_handle() -> ToolHandle {
        ToolHandle::Native(NativeHandle::from_fn(|input| Ok(input.to_vec())))
    }

    #[test]
    fn test_register_and_get_resource() {
        let catalog = Catalog::new();
        let cases = [
            ("data.json", ResourceType::File, "application/json"),
            ("conf.yaml", ResourceType::File, "application/x-yaml"),
            ("conf.yml", ResourceType::File, "application/x-yaml"),
            ("feed.xml", ResourceType::File, "application/xml"),
            ("notes.md", ResourceType::File, "text/markdown"),
            ("readme.txt", ResourceType::File, "text/plain"),
            ("table.csv", ResourceType::File, "text/csv"),
            ("schema.sql", ResourceType::Database, "text/sql"),
        ];

        for (file, resource_type, mime) in cases {
            let name = file.split('.').next().unwrap();
            catalog.register_resource(name, format!("/srv/resources/{file}"));

            let resource = catalog.get_resource(name).unwrap();
            assert_eq!(resource.name, name);
            assert_eq!(resource.resource_type, resource_type, "{file}");
            assert_eq!(resource.mime_type, mime, "{file}");
        }
        assert_eq!(catalog.resource_count(), cases.len());
    }

    #[test]
    fn test_register_resource_overwrites() {
        let catalog = Catalog::new();
        catalog.register_resource("report", "/a/report.csv");
        catalog.register_resource("report", "/b/report.json");

        let resource = catalog.get_resource("report").unwrap();
        assert_eq!(resource.file_path, PathBuf::from("/b/report.json"));
        assert_eq!(resource.mime_type, "application/json");
        assert_eq!(catalog.resource_count(), 1);
    }

    #[test]
    fn test_unregister_absent_is_noop() {
        let catalog = Catalog::new();
        assert!(!catalog.unregister_resource("ghost"));
        assert!(!catalog.unregister_tool("ghost"));
        assert_eq!(catalog.counts(), CatalogCounts { resources: 0, tools: 0 });
    }

    #[test]
    fn test_resource_and_tool_namespaces_are_independent() {
        let catalog = Catalog::new();
        catalog.register_resource("shared", "/r/shared.txt");
        catalog.register_tool_handle("shared", "/t/shared.so", "tool", echo_handle());

        assert!(catalog.unregister_resource("shared"));
        assert!(catalog.get_resource("shared").is_none());
        assert!(catalog.get_tool("shared").is_some());
    }

    #[test]
    fn test_register_script_tool() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("analyze.py");
        fs::write(&path, "print('{}')\n").unwrap();

        let tool = catalog_with(&[]).register_tool("analyze", &path, "Analyzer");
        let tool = tool.unwrap();
        assert_eq!(tool.tool_type, ToolType::InterpretedScript);
        assert_eq!(tool.description, "Analyzer");
        assert_eq!(tool.handle.kind(), "script");
    }

    #[test]
    fn test_failed_tool_load_leaves_catalog_unchanged() {
        let dir = TempDir::new().unwrap();
        let broken = dir.path().join("calc.so");
        fs::write(&broken, b"not a shared object").unwrap();
        let unknown = dir.path().join("calc.rb");
        fs::write(&unknown, b"puts 1").unwrap();

        let catalog = catalog_with(&["calc"]);
        let before = catalog.get_tool("calc").unwrap();

        assert!(matches!(
            catalog.register_tool("calc", &broken, "calc"),
            Err(ToolError::Load { .. })
        ));
        assert!(matches!(
            catalog.register_tool("calc", &unknown, "calc"),
            Err(ToolError::UnsupportedType(ToolType::Unknown))
        ));

        assert_eq!(catalog.tool_count(), 1);
        let after = catalog.get_tool("calc").unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[cfg(unix)]
    #[test]
    fn test_plugin_missing_entry_point_leaves_catalog_unchanged() {
        use crate::domains::tools::native::fixtures::{NO_EXECUTE, build_plugin};

        let dir = TempDir::new().unwrap();
        let Some(partial) = build_plugin(dir.path(), "calc", NO_EXECUTE) else {
            return;
        };

        let catalog = catalog_with(&["calc"]);
        let before = catalog.get_tool("calc").unwrap();

        let err = catalog.register_tool("calc", &partial, "calc").err().unwrap();
        assert!(matches!(err, ToolError::Load { .. }));
        assert_eq!(catalog.tool_count(), 1);
        assert!(Arc::ptr_eq(&before, &catalog.get_tool("calc").unwrap()));
    }

    #[test]
    fn test_list_is_a_snapshot() {
        let catalog = catalog_with(&["a", "b"]);
        let listed = catalog.list_tools();
        catalog.unregister_tool("a");

        assert_eq!(listed.len(), 2);
        assert_eq!(catalog.list_tools().len(), 1);
        let mut names = catalog.tool_names();
        names.sort();
        assert_eq!(names, vec!["b".to_string()]);
    }

    #[test]
    fn test_export_registry() {
        let catalog = catalog_with(&["calc"]);
        catalog.register_resource("notes", "/r/notes.md");

        let export = serde_json::to_value(catalog.export_registry()).unwrap();
        assert_eq!(export["counts"]["resources"], 1);
        assert_eq!(export["counts"]["tools"], 1);
        assert_eq!(export["resources"]["notes"]["mime_type"], "text/markdown");
        assert_eq!(export["tools"]["calc"]["type"], "native_plugin");
        assert!(export["tools"]["calc"].get("handle").is_none());

        let json = catalog.export_json().unwrap();
        assert!(json.contains("\"counts\""));
    }

    #[test]
    fn test_concurrent_readers_see_whole_descriptors() {
        let catalog = Arc::new(Catalog::new());
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let catalog = Arc::clone(&catalog);
                thread::spawn(move || {
                    for i in 0..200 {
                        let name = format!("item{}", i % 10);
                        if (i + w) % 3 == 0 {
                            catalog.unregister_resource(&name);
                        } else {
                            let ext = if w % 2 == 0 { "json" } else { "sql" };
                            catalog.register_resource(&name, format!("/w{w}/{name}.{ext}"));
                        }
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let catalog = Arc::clone(&catalog);
                thread::spawn(move || {
                    for _ in 0..200 {
                        for resource in catalog.list_resources() {
                            let expected = ResourceDescriptor::new(
                                resource.name.clone(),
                                resource.file_path.clone(),
                            );
                            assert_eq!(*resource, expected);
                            assert!(resource.file_path.to_string_lossy().contains(&resource.name));
                        }
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.join().unwrap();
        }
        assert!(catalog.resource_count() <= 10);
    }

    fn catalog_with(tools: &[&str]) -> Catalog {
        let catalog = Catalog::new();
        for name in tools {
            catalog.register_tool_handle(*name, format!("/t/{name}.so"), "test tool", echo_handle());
        }
        catalog
    }
}
