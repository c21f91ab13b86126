//! Per-file splitting and line accounting for unified diffs.

use crate::data::bundle::FileChangeRecord;

/// Marker that begins a per-file section in unified diff output.
const FILE_DIFF_MARKER: &str = "diff --git a/";

/// A per-file slice of a unified diff.
#[derive(Debug, Clone)]
pub struct FileDiff {
    /// Path of the file (extracted from the `b/` side of `diff --git a/... b/...`).
    pub path: String,
    /// Raw text of this file's diff (header + all hunks).
    pub content: String,
}

impl FileDiff {
    /// Lines added by this file's hunks, without the leading `+`.
    pub fn added_lines(&self) -> impl Iterator<Item = &str> {
        self.hunk_lines()
            .filter_map(|line| line.strip_prefix('+'))
    }

    /// Summarizes the section as a [`FileChangeRecord`].
    #[must_use]
    pub fn to_record(&self) -> FileChangeRecord {
        let mut added_lines = 0;
        let mut removed_lines = 0;
        for line in self.hunk_lines() {
            if line.starts_with('+') {
                added_lines += 1;
            } else if line.starts_with('-') {
                removed_lines += 1;
            }
        }

        FileChangeRecord {
            path: self.path.clone(),
            status: self.status().to_string(),
            added_lines,
            removed_lines,
        }
    }

    /// Git status code derived from the extended header lines.
    fn status(&self) -> &'static str {
        for line in self.header_lines() {
            if line.starts_with("new file mode") {
                return "A";
            }
            if line.starts_with("deleted file mode") {
                return "D";
            }
            if line.starts_with("rename from") {
                return "R";
            }
        }
        "M"
    }

    /// Lines before the first hunk.
    fn header_lines(&self) -> impl Iterator<Item = &str> {
        self.content.lines().take_while(|line| !line.starts_with("@@"))
    }

    /// Lines from the first hunk onwards, excluding `@@` markers.
    fn hunk_lines(&self) -> impl Iterator<Item = &str> {
        self.content
            .lines()
            .skip_while(|line| !line.starts_with("@@"))
            .filter(|line| !line.starts_with("@@"))
    }
}

/// Splits a flat unified diff at `diff --git a/` boundaries.
///
/// Returns one [`FileDiff`] for each file section found in the input.
/// An empty or whitespace-only input returns an empty `Vec`.
pub fn split_by_file(diff: &str) -> Vec<FileDiff> {
    let mut positions = Vec::new();

    if diff.starts_with(FILE_DIFF_MARKER) {
        positions.push(0);
    }
    let search = format!("\n{FILE_DIFF_MARKER}");
    let mut start = 0;
    while let Some(pos) = diff[start..].find(&search) {
        // +1 to skip the newline; the section starts at `diff`.
        positions.push(start + pos + 1);
        start = start + pos + 1;
    }

    positions
        .iter()
        .enumerate()
        .map(|(i, &pos)| {
            let end = positions.get(i + 1).copied().unwrap_or(diff.len());
            let content = &diff[pos..end];
            let first_line = content.lines().next().unwrap_or("");
            FileDiff {
                path: extract_path_from_diff_header(first_line),
                content: content.to_string(),
            }
        })
        .collect()
}

/// Parses a unified diff into per-file change records.
pub fn parse_file_changes(diff: &str) -> Vec<FileChangeRecord> {
    split_by_file(diff).iter().map(FileDiff::to_record).collect()
}

/// Extracts the file path from the `b/` side of a `diff --git` header line.
fn extract_path_from_diff_header(header_line: &str) -> String {
    // Last " b/" so paths containing spaces still resolve.
    if let Some(b_pos) = header_line.rfind(" b/") {
        header_line[b_pos + 3..].to_string()
    } else {
        header_line
            .strip_prefix(FILE_DIFF_MARKER)
            .unwrap_or(header_line)
            .to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const TWO_FILE_DIFF: &str = "\
diff --git a/src/lib.rs b/src/lib.rs
index abc1234..def5678 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,3 +1,4 @@
 use std::fmt;
-use std::io;
+use std::io::{self, Read};
+use std::path::Path;
 fn main() {}
diff --git a/src/new.rs b/src/new.rs
new file mode 100644
index 0000000..1111111
--- /dev/null
+++ b/src/new.rs
@@ -0,0 +1,2 @@
+pub fn hello() {}
+pub fn world() {}
";

    #[test]
    fn split_empty_input() {
        assert!(split_by_file("").is_empty());
        assert!(split_by_file("   \n").is_empty());
    }

    #[test]
    fn split_extracts_paths() {
        let files = split_by_file(TWO_FILE_DIFF);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "src/lib.rs");
        assert_eq!(files[1].path, "src/new.rs");
        assert!(files[1].content.starts_with("diff --git a/src/new.rs"));
    }

    #[test]
    fn records_count_lines_excluding_headers() {
        let records = parse_file_changes(TWO_FILE_DIFF);
        assert_eq!(records[0].added_lines, 2);
        assert_eq!(records[0].removed_lines, 1);
        assert_eq!(records[0].status, "M");
        assert_eq!(records[1].added_lines, 2);
        assert_eq!(records[1].removed_lines, 0);
        assert_eq!(records[1].status, "A");
    }

    #[test]
    fn deleted_and_renamed_status() {
        let diff = "\
diff --git a/old.rs b/old.rs
deleted file mode 100644
--- a/old.rs
+++ /dev/null
@@ -1 +0,0 @@
-gone
diff --git a/a.rs b/b.rs
similarity index 100%
rename from a.rs
rename to b.rs
";
        let records = parse_file_changes(diff);
        assert_eq!(records[0].status, "D");
        assert_eq!(records[0].removed_lines, 1);
        assert_eq!(records[1].status, "R");
        assert_eq!(records[1].path, "b.rs");
        assert_eq!(records[1].added_lines + records[1].removed_lines, 0);
    }

    #[test]
    fn added_lines_strip_prefix() {
        let files = split_by_file(TWO_FILE_DIFF);
        let added: Vec<&str> = files[1].added_lines().collect();
        assert_eq!(added, vec!["pub fn hello() {}", "pub fn world() {}"]);
    }

    #[test]
    fn path_with_spaces() {
        let files = split_by_file("diff --git a/my file.rs b/my file.rs\n");
        assert_eq!(files[0].path, "my file.rs");
    }
}
