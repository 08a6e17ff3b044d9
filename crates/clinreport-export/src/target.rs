// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Export destinations and file-name sanitising.

use std::path::{Path, PathBuf};

const FALLBACK_NAME: &str = "report";
const MAX_NAME_CHARS: usize = 120;

/// Where an export bundle is written: `<directory>/<base>.pdf` and
/// `<directory>/<base>.zip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    directory: PathBuf,
    base_name: String,
}

impl ExportTarget {
    /// The base name is sanitised; see [`sanitize_file_stem`].
    pub fn new(directory: impl Into<PathBuf>, base_name: &str) -> Self {
        Self {
            directory: directory.into(),
            base_name: sanitize_file_stem(base_name, FALLBACK_NAME),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn pdf_path(&self) -> PathBuf {
        self.directory.join(format!("{}.pdf", self.base_name))
    }

    pub fn archive_path(&self) -> PathBuf {
        self.directory.join(format!("{}.zip", self.base_name))
    }
}

/// Make `name` safe as a file stem on every mainstream filesystem.
///
/// Reserved and control characters become `_`, runs of whitespace collapse
/// to one `_`, leading and trailing dots and underscores are trimmed and the
/// result is capped at 120 characters. An empty result becomes `fallback`.
pub fn sanitize_file_stem(name: &str, fallback: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_gap = false;
    for c in name.chars() {
        if c.is_whitespace() {
            pending_gap = !out.is_empty();
            continue;
        }
        if pending_gap {
            out.push('_');
            pending_gap = false;
        }
        let reserved = matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*');
        out.push(if reserved || c.is_control() { '_' } else { c });
    }
    let trimmed: String = out
        .trim_matches(|c| c == '.' || c == '_')
        .chars()
        .take(MAX_NAME_CHARS)
        .collect();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Acme Foods 2026", "Acme_Foods_2026")]
    #[case("  spaced   out  ", "spaced_out")]
    #[case("a/b\\c:d", "a_b_c_d")]
    #[case("report?.pdf", "report_.pdf")]
    #[case("..hidden..", "hidden")]
    #[case("", "report")]
    #[case("***", "report")]
    #[case("Audiometría Planta Norte", "Audiometría_Planta_Norte")]
    fn sanitizes_names(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_file_stem(input, "report"), expected);
    }

    #[test]
    fn long_names_are_capped() {
        assert_eq!(sanitize_file_stem(&"x".repeat(500), "report").len(), 120);
    }

    #[test]
    fn target_paths_share_the_base_name() {
        let target = ExportTarget::new("/tmp/out", "Study: North");
        assert_eq!(target.pdf_path(), PathBuf::from("/tmp/out/Study__North.pdf"));
        assert_eq!(target.archive_path(), PathBuf::from("/tmp/out/Study__North.zip"));
    }
}
