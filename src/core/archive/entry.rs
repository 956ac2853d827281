use super::{Archive, DirId};
use crate::codec::CodecRegistry;
use serde::{Deserialize, Serialize};

/// Flat view of one directory or file in an archive
///
/// # Examples
///
/// ```rust
/// use huffpack::{Archive, CodecRegistry};
///
/// let mut archive = Archive::new();
/// let root = archive.root();
/// archive.add_directory(root, "docs");
///
/// for entry in archive.entries(&CodecRegistry::default()) {
///     assert!(entry.is_dir);
///     assert_eq!(entry.path, "docs");
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    /// Full path below the root (e.g., "docs/drafts/plan.txt")
    pub path: String,

    /// Just the name (e.g., "plan.txt" or "drafts")
    pub name: String,

    /// Parent directory path; empty for entries directly under the root
    pub parent: String,

    pub is_dir: bool,

    /// Uncoded size; for directories the sum of everything below them
    pub size: u64,

    /// Codec identifier (None for directories)
    pub codec_id: Option<u64>,

    /// Codec display name, if the codec is known
    pub codec_name: Option<String>,
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

impl Archive {
    /// Every directory and file below the root, in container order
    pub fn entries(&self, registry: &CodecRegistry) -> Vec<Entry> {
        let mut entries = Vec::new();
        self.collect_entries(self.root(), "", registry, &mut entries);
        entries
    }

    fn collect_entries(
        &self,
        id: DirId,
        parent: &str,
        registry: &CodecRegistry,
        out: &mut Vec<Entry>,
    ) {
        let dir = self.directory(id);
        for &sub in dir.subdirectories() {
            let name = self.directory(sub).name();
            let path = join(parent, name);
            out.push(Entry {
                path: path.clone(),
                name: name.to_string(),
                parent: parent.to_string(),
                is_dir: true,
                size: self.directory_size(sub),
                codec_id: None,
                codec_name: None,
            });
            self.collect_entries(sub, &path, registry, out);
        }
        for file in dir.files() {
            out.push(Entry {
                path: join(parent, file.name()),
                name: file.name().to_string(),
                parent: parent.to_string(),
                is_dir: false,
                size: file.size(),
                codec_id: Some(file.codec_id()),
                codec_name: registry.name_of(file.codec_id()).map(str::to_string),
            });
        }
    }
}
