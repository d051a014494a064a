//! Translation of raw `notify` events into catalog-relevant changes.

use std::path::PathBuf;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};

/// A filesystem change as the synchronizer understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsChange {
    Created,
    Written,
    Removed,
    /// The path was renamed away. The new name, if watched, arrives as a
    /// separate `Created`.
    Renamed,
}

/// Split one `notify` event into per-path changes.
///
/// Metadata-only and access events produce nothing.
pub fn changes(event: &Event) -> Vec<(FsChange, PathBuf)> {
    let all = |change: FsChange| {
        event
            .paths
            .iter()
            .map(|path| (change, path.clone()))
            .collect::<Vec<_>>()
    };

    match event.kind {
        EventKind::Create(_) => all(FsChange::Created),
        EventKind::Remove(_) => all(FsChange::Removed),
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            all(FsChange::Written)
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => all(FsChange::Renamed),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => all(FsChange::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.iter();
            let mut out = Vec::with_capacity(2);
            if let Some(from) = paths.next() {
                out.push((FsChange::Renamed, from.clone()));
            }
            if let Some(to) = paths.next() {
                out.push((FsChange::Created, to.clone()));
            }
            out
        }
        // Backends that cannot tell the two sides apart: whichever side
        // still exists is the new name.
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|path| {
                let change = if path.exists() {
                    FsChange::Created
                } else {
                    FsChange::Renamed
                };
                (change, path.clone())
            })
            .collect(),
        _ => Vec::new(),
    }
}
