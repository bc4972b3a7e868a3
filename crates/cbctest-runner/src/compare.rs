//! Golden snapshot comparison.

use similar::{ChangeTag, TextDiff};

/// Lines of unchanged context around each hunk.
const CONTEXT_LINES: usize = 3;

/// Details of a snapshot mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Unified diff from the golden text to the captured text.
    pub diff: String,
    /// Lines present only in the captured text.
    pub added: usize,
    /// Lines present only in the golden text.
    pub removed: usize,
}

/// Result of holding captured output against a golden snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    /// Texts are identical.
    Match,
    /// Texts differ.
    Mismatch(Mismatch),
}

impl Comparison {
    /// Whether the texts were identical.
    #[must_use]
    pub const fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Compares `captured` against `golden` by exact text equality, producing a
/// line-based unified diff on mismatch.
#[must_use]
pub fn compare(golden: &str, captured: &str) -> Comparison {
    if golden == captured {
        return Comparison::Match;
    }

    let diff = TextDiff::from_lines(golden, captured);
    let (mut added, mut removed) = (0, 0);
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }
    let unified = diff
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header("expected", "actual")
        .to_string();

    Comparison::Mismatch(Mismatch {
        diff: unified,
        added,
        removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed_lines(diff: &str) -> Vec<&str> {
        diff.lines()
            .filter(|l| {
                (l.starts_with('+') && !l.starts_with("+++"))
                    || (l.starts_with('-') && !l.starts_with("---"))
            })
            .collect()
    }

    #[test]
    fn identical_text_matches() {
        assert!(compare("OK\nExited with 0\n", "OK\nExited with 0\n").is_match());
    }

    #[test]
    fn extra_line_is_one_line_addition() {
        let Comparison::Mismatch(m) =
            compare("OK\nExited with 0\n", "OK\nextra text\nExited with 0\n")
        else {
            panic!("expected mismatch");
        };
        assert_eq!((m.added, m.removed), (1, 0));
        assert_eq!(changed_lines(&m.diff), vec!["+extra text"]);
        assert!(m.diff.starts_with("--- expected\n+++ actual\n"));
    }

    #[test]
    fn empty_golden_shows_everything_added() {
        let captured = "Warning: no vendor\nExited with 1\n";
        let Comparison::Mismatch(m) = compare("", captured) else {
            panic!("expected mismatch");
        };
        assert_eq!((m.added, m.removed), (2, 0));
        assert_eq!(
            changed_lines(&m.diff),
            vec!["+Warning: no vendor", "+Exited with 1"]
        );
    }

    #[test]
    fn changed_exit_code_is_replacement() {
        let Comparison::Mismatch(m) = compare("Exited with 0\n", "Exited with 1\n") else {
            panic!("expected mismatch");
        };
        assert_eq!((m.added, m.removed), (1, 1));
    }

    #[test]
    fn whitespace_differences_are_significant() {
        assert!(!compare("OK\n", "OK \n").is_match());
        assert!(!compare("OK\n", "OK").is_match());
    }
}
