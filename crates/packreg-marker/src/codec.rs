//! Marker encoding, parsing and verification.

use packreg_core::{content_hash, LogicalPath, PackSlug, SemVer, CONTENT_HASH_LEN};

const MANAGED_KEY: &str = "@pack-managed: true";
const NOTICE: &str = "Installed by packreg. Do not edit: changes to this file are detected.";
const FIELD_SEP: &str = " | ";

// ─── Comment Styles ──────────────────────────────────────────────────

/// Comment syntax used for a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentStyle {
    /// `<!-- ... -->`, for Markdown.
    Html,
    /// `# ...`, for YAML and TOML.
    Hash,
}

impl CommentStyle {
    fn open(&self) -> &'static str {
        match self {
            Self::Html => "<!-- ",
            Self::Hash => "# ",
        }
    }

    fn close(&self) -> &'static str {
        match self {
            Self::Html => " -->",
            Self::Hash => "",
        }
    }

    fn line(&self, body: &str) -> String {
        format!("{}{}{}\n", self.open(), body, self.close())
    }

    fn notice_line(&self) -> String {
        self.line(NOTICE)
    }
}

/// Comment style for a path, or `None` when the file must stay unmarked.
///
/// Only documentation and structured-config formats are marked. JSON has
/// no comment syntax; binaries and source files would be corrupted or
/// change meaning.
pub fn comment_style(path: &LogicalPath) -> Option<CommentStyle> {
    match path.extension()?.as_str() {
        "md" | "markdown" | "mdx" => Some(CommentStyle::Html),
        "yaml" | "yml" | "toml" => Some(CommentStyle::Hash),
        _ => None,
    }
}

pub fn should_mark(path: &LogicalPath) -> bool {
    comment_style(path).is_some()
}

// ─── Marker ──────────────────────────────────────────────────────────

/// A parsed provenance marker.
///
/// `pack` and `version` are returned as written. They are not covered by
/// `hash` and must not be trusted for anything beyond display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceMarker {
    pub style: CommentStyle,
    pub pack: String,
    pub version: String,
    /// 16-hex fingerprint of the body below the marker.
    pub hash: String,
}

/// Outcome of [`check_integrity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityStatus {
    /// Marker present and body matches its hash.
    Intact(ProvenanceMarker),
    /// Marker present but the body (or the hash field) was changed.
    Modified { expected: String, actual: String },
    /// No parseable marker.
    Unmarked,
}

impl IntegrityStatus {
    pub fn is_intact(&self) -> bool {
        matches!(self, Self::Intact(_))
    }
}

/// Prepend a marker to `content` if `path` is eligible; otherwise return
/// `content` unchanged.
pub fn add_marker(content: &[u8], pack: &PackSlug, version: &SemVer, path: &LogicalPath) -> Vec<u8> {
    let Some(style) = comment_style(path) else {
        return content.to_vec();
    };
    let header = style.line(&format!(
        "{MANAGED_KEY}{FIELD_SEP}pack: {pack}{FIELD_SEP}version: {version}{FIELD_SEP}hash: {}",
        content_hash(content)
    ));
    let notice = style.notice_line();
    let mut out = Vec::with_capacity(header.len() + notice.len() + content.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(notice.as_bytes());
    out.extend_from_slice(content);
    out
}

pub fn has_marker(content: &[u8]) -> bool {
    split_marker(content).is_some()
}

/// Parse the leading marker. Never panics; `None` when absent or malformed.
pub fn extract_marker(content: &[u8]) -> Option<ProvenanceMarker> {
    split_marker(content).map(|(marker, _)| marker)
}

/// Strip exactly the marker lines. Content without a marker is returned
/// unchanged.
pub fn remove_marker(content: &[u8]) -> &[u8] {
    match split_marker(content) {
        Some((_, body_start)) => &content[body_start..],
        None => content,
    }
}

/// True iff a marker is present and the body hashes to its `hash` field.
pub fn verify_integrity(content: &[u8]) -> bool {
    check_integrity(content).is_intact()
}

pub fn check_integrity(content: &[u8]) -> IntegrityStatus {
    let Some((marker, body_start)) = split_marker(content) else {
        return IntegrityStatus::Unmarked;
    };
    let actual = content_hash(&content[body_start..]);
    if actual == marker.hash {
        IntegrityStatus::Intact(marker)
    } else {
        IntegrityStatus::Modified {
            expected: marker.hash,
            actual,
        }
    }
}

// ─── Parsing ─────────────────────────────────────────────────────────

/// Split a marked file into its marker and the offset where the body starts.
fn split_marker(content: &[u8]) -> Option<(ProvenanceMarker, usize)> {
    let (first, rest_start) = take_line(content, 0)?;
    let style = if first.starts_with(CommentStyle::Html.open()) {
        CommentStyle::Html
    } else if first.starts_with(CommentStyle::Hash.open()) {
        CommentStyle::Hash
    } else {
        return None;
    };
    let body = first
        .strip_prefix(style.open())?
        .strip_suffix(style.close())?;
    let marker = parse_fields(body, style)?;

    let (second, body_start) = take_line(content, rest_start)?;
    if style.notice_line().strip_suffix('\n') != Some(second) {
        return None;
    }
    Some((marker, body_start))
}

/// Read one `\n`-terminated UTF-8 line starting at `start`. Returns the
/// line without its newline and the offset just past it.
fn take_line(content: &[u8], start: usize) -> Option<(&str, usize)> {
    let rest = content.get(start..)?;
    let nl = rest.iter().position(|b| *b == b'\n')?;
    let line = std::str::from_utf8(&rest[..nl]).ok()?;
    Some((line, start + nl + 1))
}

fn parse_fields(body: &str, style: CommentStyle) -> Option<ProvenanceMarker> {
    let mut fields = body.split(FIELD_SEP);
    if fields.next()? != MANAGED_KEY {
        return None;
    }
    let pack = fields.next()?.strip_prefix("pack: ")?;
    let version = fields.next()?.strip_prefix("version: ")?;
    let hash = fields.next()?.strip_prefix("hash: ")?;
    if fields.next().is_some() || pack.is_empty() || version.is_empty() {
        return None;
    }
    if hash.len() != CONTENT_HASH_LEN
        || !hash.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return None;
    }
    Some(ProvenanceMarker {
        style,
        pack: pack.to_string(),
        version: version.to_string(),
        hash: hash.to_string(),
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn marked_path() -> impl Strategy<Value = LogicalPath> {
        prop_oneof![
            Just("skills/demo/SKILL.md"),
            Just("commands/run.mdx"),
            Just("protocols/flow.yaml"),
            Just("config/settings.toml"),
        ]
        .prop_map(|p| LogicalPath::parse(p).unwrap())
    }

    fn version() -> impl Strategy<Value = SemVer> {
        (0u64..20, 0u64..20, 0u64..20).prop_map(|(a, b, c)| SemVer::new(a, b, c))
    }

    proptest! {
        /// Stripping a freshly added marker restores the original bytes.
        #[test]
        fn remove_inverts_add(
            content in prop::collection::vec(any::<u8>(), 0..512),
            path in marked_path(),
            version in version(),
        ) {
            let slug = PackSlug::parse("demo-pack").unwrap();
            let marked = add_marker(&content, &slug, &version, &path);
            prop_assert!(has_marker(&marked));
            prop_assert!(verify_integrity(&marked));
            prop_assert_eq!(remove_marker(&marked), &content[..]);
        }

        /// Changing any single body byte is detected.
        #[test]
        fn body_mutation_is_detected(
            content in prop::collection::vec(any::<u8>(), 1..512),
            index in any::<prop::sample::Index>(),
            flip in 1u8..=255,
            path in marked_path(),
        ) {
            let slug = PackSlug::parse("demo-pack").unwrap();
            let marked = add_marker(&content, &slug, &SemVer::new(1, 2, 3), &path);
            let body_start = marked.len() - content.len();
            let mut tampered = marked.clone();
            let i = body_start + index.index(content.len());
            tampered[i] ^= flip;
            prop_assert!(!verify_integrity(&tampered));
        }

        /// Parsing arbitrary input never panics.
        #[test]
        fn extract_never_panics(content in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = extract_marker(&content);
            let _ = check_integrity(&content);
        }
    }
}
