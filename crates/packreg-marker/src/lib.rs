//! # packreg-marker — Provenance Marker Codec
//!
//! Installed text artifacts carry a two-line comment header that records
//! which pack and version produced them, plus a 16-hex fingerprint of the
//! content below the header:
//!
//! ```text
//! <!-- @pack-managed: true | pack: demo | version: 1.0.0 | hash: 0123456789abcdef -->
//! <!-- Installed by packreg. Do not edit: changes to this file are detected. -->
//! ...original content...
//! ```
//!
//! Markdown uses the HTML comment style; YAML and TOML use `#`. Every
//! other file type, including JSON, is left unmarked.
//!
//! All operations are pure and never panic on malformed input. Only the
//! body is fingerprinted, so the `pack` and `version` fields can be edited
//! without failing verification; treat them as labels, not evidence.

pub mod codec;

pub use codec::{
    add_marker, check_integrity, comment_style, extract_marker, has_marker, remove_marker,
    should_mark, verify_integrity, CommentStyle, IntegrityStatus, ProvenanceMarker,
};
pub use packreg_core::content_hash;
