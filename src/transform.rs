//! The three line transforms behind the `comment`, `uncomment` and `htitle` commands.
//!
//! Lines are handled as raw bytes so input in any ASCII-compatible encoding
//! passes through untouched.

use crate::config::DEFAULT_COMMENT;
use crate::traits::LineOperation;
use crate::Settings;

/// Adds the comment prefix to the start of every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct Commenter;

/// Removes every occurrence of the comment prefix, wherever it appears in the line.
#[derive(Debug, Default, Clone, Copy)]
pub struct Uncommenter;

/// Centers each non-blank line between runs of the filler character.
#[derive(Debug, Default, Clone, Copy)]
pub struct TitleRule;

impl LineOperation for Commenter {
    fn apply(&self, line: &[u8], settings: &Settings) -> Vec<u8> {
        let mut out = Vec::with_capacity(settings.prefix.len() + line.len());
        out.extend_from_slice(settings.prefix.as_bytes());
        out.extend_from_slice(line);
        out
    }
}

impl LineOperation for Uncommenter {
    fn apply(&self, line: &[u8], settings: &Settings) -> Vec<u8> {
        remove_all(line, settings.prefix.as_bytes())
    }
}

/// Drops every non-overlapping occurrence of `needle`, scanning left to right.
fn remove_all(line: &[u8], needle: &[u8]) -> Vec<u8> {
    if needle.is_empty() {
        return line.to_vec();
    }

    let mut out = Vec::with_capacity(line.len());
    let mut rest = line;
    while let Some(&byte) = rest.first() {
        if rest.starts_with(needle) {
            rest = &rest[needle.len()..];
        } else {
            out.push(byte);
            rest = &rest[1..];
        }
    }
    out
}

impl LineOperation for TitleRule {
    /// Blank lines pass through untouched. Otherwise the whole line is the title:
    /// a run containing a non-whitespace character always stretches from the
    /// first character to the last.
    ///
    /// The width budget subtracts the configured prefix, but the rendered line
    /// always starts with [`DEFAULT_COMMENT`].
    fn apply(&self, line: &[u8], settings: &Settings) -> Vec<u8> {
        if line.iter().all(|b| b.is_ascii_whitespace()) {
            return line.to_vec();
        }

        let (left, right) = title_sides(line, settings);
        let filler = settings.filler.to_string();

        let mut out = Vec::with_capacity(
            DEFAULT_COMMENT.len() + (left + right) * filler.len() + line.len() + 2,
        );
        out.extend_from_slice(DEFAULT_COMMENT.as_bytes());
        out.extend_from_slice(filler.repeat(left).as_bytes());
        out.push(b' ');
        out.extend_from_slice(line);
        out.push(b' ');
        out.extend_from_slice(filler.repeat(right).as_bytes());
        out
    }
}

/// Computes how many filler characters go left and right of `line`.
///
/// Counts are measured in characters; a byte that is not valid UTF-8 counts
/// as one character. A long title can push either side below zero, in which
/// case no filler is emitted on that side.
pub fn title_sides(line: &[u8], settings: &Settings) -> (usize, usize) {
    let text_len = char_count(&String::from_utf8_lossy(line));
    let width = i64::try_from(settings.rule_width).unwrap_or(i64::MAX);
    let prefix_len = char_count(&settings.prefix);

    let side = (width / 2 - text_len / 2).saturating_sub(prefix_len);
    let left = side;
    let mut right = side;
    if text_len % 2 == 1 {
        right = right.saturating_sub(1);
    }

    (clamp_count(left), clamp_count(right))
}

fn char_count(text: &str) -> i64 {
    i64::try_from(text.chars().count()).unwrap_or(i64::MAX)
}

fn clamp_count(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}
