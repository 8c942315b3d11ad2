//! # `.gitignore` Sections
//!
//! Each installed pack owns one delimited block:
//!
//! ```text
//! # >>> packreg: demo
//! .claude/packs/demo/
//! .claude/skills/review/SKILL.md
//! # <<< packreg: demo
//! ```
//!
//! Entries already present anywhere in the file are not repeated, so
//! adding the same entries twice leaves the file unchanged. Lines outside
//! the block are never touched.

pub fn section_begin(slug: &str) -> String {
    format!("# >>> packreg: {slug}")
}

pub fn section_end(slug: &str) -> String {
    format!("# <<< packreg: {slug}")
}

/// Add `entries` to `slug`'s section, creating the section at the end of
/// the file if needed.
pub fn add_entries(existing: &str, slug: &str, entries: &[String]) -> String {
    let present: std::collections::HashSet<&str> = existing.lines().map(str::trim).collect();
    let mut new: Vec<&str> = Vec::new();
    for e in entries {
        let e = e.trim();
        if !e.is_empty() && !present.contains(e) && !new.contains(&e) {
            new.push(e);
        }
    }
    if new.is_empty() {
        return existing.to_string();
    }

    let begin = section_begin(slug);
    let end = section_end(slug);
    let lines: Vec<&str> = existing.lines().collect();
    let section = lines.iter().position(|l| l.trim() == begin).and_then(|start| {
        lines[start..]
            .iter()
            .position(|l| l.trim() == end)
            .map(|offset| start + offset)
    });

    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + new.len() + 3);
    match section {
        Some(end_idx) => {
            out.extend_from_slice(&lines[..end_idx]);
            out.extend(new.iter().copied());
            out.extend_from_slice(&lines[end_idx..]);
        }
        None => {
            out.extend_from_slice(&lines);
            if out.last().is_some_and(|l| !l.trim().is_empty()) {
                out.push("");
            }
            out.push(&begin);
            out.extend(new.iter().copied());
            out.push(&end);
        }
    }
    join_lines(&out)
}

/// Remove `slug`'s section. Files without the section come back unchanged.
pub fn remove_section(existing: &str, slug: &str) -> String {
    let begin = section_begin(slug);
    let end = section_end(slug);
    let mut out: Vec<&str> = Vec::new();
    let mut inside = false;
    let mut removed = false;
    for line in existing.lines() {
        let t = line.trim();
        if !inside && t == begin {
            inside = true;
            removed = true;
            continue;
        }
        if inside {
            if t == end {
                inside = false;
            }
            continue;
        }
        out.push(line);
    }
    if !removed {
        return existing.to_string();
    }
    while out.last().is_some_and(|l| l.trim().is_empty()) {
        out.pop();
    }
    join_lines(&out)
}

/// Entries currently listed in `slug`'s section.
pub fn section_entries(existing: &str, slug: &str) -> Vec<String> {
    let begin = section_begin(slug);
    let end = section_end(slug);
    existing
        .lines()
        .map(str::trim)
        .skip_while(|l| *l != begin)
        .skip(1)
        .take_while(|l| *l != end)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

fn join_lines(lines: &[&str]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut s = lines.join("\n");
    s.push('\n');
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn creates_section_after_existing_content() {
        let out = add_entries("target/\n", "demo", &entries(&[".claude/packs/demo/"]));
        assert_eq!(
            out,
            "target/\n\n# >>> packreg: demo\n.claude/packs/demo/\n# <<< packreg: demo\n"
        );
    }

    #[test]
    fn creates_file_from_nothing() {
        let out = add_entries("", "demo", &entries(&["a"]));
        assert_eq!(out, "# >>> packreg: demo\na\n# <<< packreg: demo\n");
    }

    #[test]
    fn is_idempotent() {
        let e = entries(&[".claude/packs/demo/", ".claude/commands/ship.md"]);
        let once = add_entries("node_modules/\n", "demo", &e);
        let twice = add_entries(&once, "demo", &e);
        assert_eq!(once, twice);
    }

    #[test]
    fn skips_entries_present_elsewhere() {
        let out = add_entries(".claude/\n", "demo", &entries(&[".claude/", "b"]));
        assert_eq!(section_entries(&out, "demo"), vec!["b"]);
        assert_eq!(out.matches(".claude/\n").count(), 1);
    }

    #[test]
    fn appends_inside_existing_section() {
        let first = add_entries("", "demo", &entries(&["a"]));
        let with_other = add_entries(&first, "other", &entries(&["x"]));
        let out = add_entries(&with_other, "demo", &entries(&["b"]));
        assert_eq!(section_entries(&out, "demo"), vec!["a", "b"]);
        assert_eq!(section_entries(&out, "other"), vec!["x"]);
    }

    #[test]
    fn remove_leaves_other_lines_alone() {
        let base = "target/\n";
        let with = add_entries(base, "demo", &entries(&["a", "b"]));
        let with_other = add_entries(&with, "other", &entries(&["x"]));
        let out = remove_section(&with_other, "demo");
        assert!(!out.contains("packreg: demo"));
        assert!(out.starts_with("target/\n"));
        assert_eq!(section_entries(&out, "other"), vec!["x"]);

        assert_eq!(remove_section(&with, "demo"), base);
        assert_eq!(remove_section(base, "demo"), base);
    }
}
