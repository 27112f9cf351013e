use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Allow-list of directories a session may be started in.
///
/// Backed by a JSON file `{"workspaces": ["/path", ...]}` maintained by an
/// external workspace CRUD layer; this side only reads it. A missing,
/// unreadable or empty file allows nothing.
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    path: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct WorkspacesFile {
    #[serde(default)]
    workspaces: Vec<PathBuf>,
}

impl WorkspaceStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn allowed_roots(&self) -> Vec<PathBuf> {
        let Ok(raw) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        serde_json::from_str::<WorkspacesFile>(&raw)
            .map(|f| f.workspaces)
            .unwrap_or_default()
    }

    /// True iff `target` is one of the allowed roots or lives underneath
    /// one of them.
    pub fn is_allowed(&self, target: &Path) -> bool {
        let roots = self.allowed_roots();
        if roots.is_empty() {
            return false;
        }

        let target = normalize(target);
        roots.iter().any(|root| {
            let root = normalize(root);
            target == root || target.starts_with(&root)
        })
    }
}

fn normalize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
