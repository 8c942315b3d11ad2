//! # Project Layout
//!
//! Where an installed pack lands inside a project:
//!
//! ```text
//! skills/<skill>/<rest>   → .claude/skills/<skill>/<rest>
//! commands/<name>.md      → .claude/commands/<name>.md
//! protocols/<name>.md     → .claude/protocols/<name>.md
//! anything else           → .claude/packs/<slug>/<path>
//! ```
//!
//! Bookkeeping lives in the pack directory next to the routed files.
//! Paths are handled as `/`-separated strings relative to the project root
//! so the same strings can go into `.gitignore` and install records.

use std::path::{Path, PathBuf};

use packreg_core::{LogicalPath, PackSlug};

pub const CLAUDE_DIR: &str = ".claude";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const LICENSE_FILE: &str = ".license.json";
pub const INSTALL_RECORD_FILE: &str = ".install.json";
pub const REGISTRY_FILE: &str = ".registry.json";

/// File names the installer owns inside a pack directory.
const RESERVED: [&str; 3] = [MANIFEST_FILE, LICENSE_FILE, INSTALL_RECORD_FILE];

#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Project-relative directory holding all installed packs.
    pub fn packs_rel() -> String {
        format!("{CLAUDE_DIR}/packs")
    }

    pub fn pack_rel(slug: &PackSlug) -> String {
        format!("{}/{slug}", Self::packs_rel())
    }

    pub fn packs_dir(&self) -> PathBuf {
        self.resolve(&Self::packs_rel())
    }

    pub fn pack_dir(&self, slug: &PackSlug) -> PathBuf {
        self.resolve(&Self::pack_rel(slug))
    }

    pub fn manifest_path(&self, slug: &PackSlug) -> PathBuf {
        self.pack_dir(slug).join(MANIFEST_FILE)
    }

    pub fn license_path(&self, slug: &PackSlug) -> PathBuf {
        self.pack_dir(slug).join(LICENSE_FILE)
    }

    pub fn install_record_path(&self, slug: &PackSlug) -> PathBuf {
        self.pack_dir(slug).join(INSTALL_RECORD_FILE)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.packs_dir().join(REGISTRY_FILE)
    }

    pub fn gitignore_path(&self) -> PathBuf {
        self.root.join(".gitignore")
    }

    /// Absolute path of a project-relative `/`-separated path.
    pub fn resolve(&self, rel: &str) -> PathBuf {
        rel.split('/').fold(self.root.clone(), |p, seg| p.join(seg))
    }

    /// Project-relative target of a pack file.
    pub fn route(slug: &PackSlug, path: &LogicalPath) -> String {
        let segments: Vec<&str> = path.segments().collect();
        let is_md = path.extension().as_deref() == Some("md");
        match segments.as_slice() {
            ["skills", _, _, ..] => format!("{CLAUDE_DIR}/{}", path.as_str()),
            ["commands" | "protocols", _] if is_md => format!("{CLAUDE_DIR}/{}", path.as_str()),
            _ => format!("{}/{}", Self::pack_rel(slug), path.as_str()),
        }
    }

    /// Whether `rel` would overwrite one of the installer's own files.
    pub fn is_reserved(slug: &PackSlug, rel: &str) -> bool {
        let pack = Self::pack_rel(slug);
        RESERVED
            .iter()
            .any(|name| rel == format!("{pack}/{name}"))
    }

    /// Whether `rel` lies inside the pack directory.
    pub fn in_pack_dir(slug: &PackSlug, rel: &str) -> bool {
        rel.starts_with(&format!("{}/", Self::pack_rel(slug)))
    }
}
