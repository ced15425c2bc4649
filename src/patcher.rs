//! # Patch Engine
//!
//! Applies a unified diff to a file with an all-or-nothing outcome. The
//! pre-patch content is backed up before any mutation, so a byte-identical
//! recovery copy exists even when the patch itself later fails. The target
//! is only ever overwritten with a fully verified patch result.

use crate::workspace;
use anyhow::{Context, Result};
use console::style;
use once_cell::sync::Lazy;
use regex::Regex;
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

static HUNK_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("hunk header regex"));

#[derive(Debug, PartialEq)]
enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

#[derive(Debug)]
struct Hunk {
    old_start: usize,
    lines: Vec<HunkLine>,
}

pub struct Patcher {
    root: PathBuf,
    backup_dir: PathBuf,
}

impl Patcher {
    pub fn new(root: PathBuf) -> Self {
        let backup_dir = root.join(".tern").join("backups");
        Self { root, backup_dir }
    }

    /// Applies `diff_text` to the file at `relative` (project-relative).
    ///
    /// Returns `Ok(true)` on success, `Ok(false)` when a hunk's context
    /// cannot be located (the file is left untouched), and an error when
    /// there is no base file to patch or a path escapes the root.
    pub fn apply_patch(&self, relative: &str, diff_text: &str) -> Result<bool> {
        let path = workspace::resolve(&self.root, relative)?;
        let original = fs::read_to_string(&path)
            .with_context(|| format!("cannot patch '{relative}': no readable base file"))?;

        self.create_backup(relative, &original)?;

        match patch_content(&original, diff_text) {
            Some(patched) => {
                fs::write(&path, patched)
                    .with_context(|| format!("failed to write patched '{relative}'"))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Dry run for the approval preview: computes the patched content and
    /// renders a styled diff without touching the file.
    pub fn preview(&self, relative: &str, diff_text: &str) -> Result<String> {
        let path = workspace::resolve(&self.root, relative)?;
        let original = fs::read_to_string(&path)
            .with_context(|| format!("cannot preview patch for '{relative}': no readable base file"))?;

        let patched = match patch_content(&original, diff_text) {
            Some(patched) => patched,
            None => return Ok(format!("Patch does not apply cleanly to '{relative}'.")),
        };

        let diff = TextDiff::from_lines(&original, &patched);
        let mut rendered = Vec::new();
        for change in diff.iter_all_changes() {
            let line = change.value().trim_end_matches('\n');
            match change.tag() {
                ChangeTag::Delete => rendered.push(style(format!("- {line}")).red().to_string()),
                ChangeTag::Insert => rendered.push(style(format!("+ {line}")).green().to_string()),
                ChangeTag::Equal => rendered.push(format!("  {line}")),
            }
        }
        Ok(rendered.join("\n"))
    }

    fn create_backup(&self, relative: &str, content: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.backup_dir)
            .with_context(|| "failed to create backup directory")?;

        let safe_name: String = relative
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let backup_path = self.backup_dir.join(format!("{safe_name}_{timestamp}.bak"));

        fs::write(&backup_path, content)
            .with_context(|| format!("failed to write backup for '{relative}'"))?;
        Ok(backup_path)
    }

    pub fn backup_dir(&self) -> &PathBuf {
        &self.backup_dir
    }
}

/// Applies a unified diff to `original`, returning `None` when any hunk's
/// context cannot be located.
fn patch_content(original: &str, diff_text: &str) -> Option<String> {
    let hunks = parse_unified_diff(diff_text)?;
    if hunks.is_empty() {
        return None;
    }

    let had_trailing_newline = original.ends_with('\n');
    let mut old_lines: Vec<&str> = original.split('\n').collect();
    if had_trailing_newline {
        old_lines.pop();
    }

    let mut patched: Vec<String> = Vec::new();
    let mut cursor = 0usize;
    // Tracks how far earlier hunks shifted the file relative to the
    // positions the diff headers claim.
    let mut offset = 0isize;

    for hunk in &hunks {
        let expected: Vec<&str> = hunk
            .lines
            .iter()
            .filter_map(|line| match line {
                HunkLine::Context(text) | HunkLine::Remove(text) => Some(text.as_str()),
                HunkLine::Add(_) => None,
            })
            .collect();

        let declared = (hunk.old_start as isize - 1 + offset).max(0) as usize;
        let position = locate_hunk(&old_lines, &expected, declared, cursor)?;

        // Copy untouched lines up to the hunk.
        for line in &old_lines[cursor..position] {
            patched.push((*line).to_string());
        }
        cursor = position;

        for line in &hunk.lines {
            match line {
                HunkLine::Context(text) => {
                    patched.push(text.clone());
                    cursor += 1;
                }
                HunkLine::Remove(_) => {
                    cursor += 1;
                }
                HunkLine::Add(text) => {
                    patched.push(text.clone());
                }
            }
        }

        let removed = expected.len() as isize;
        let added = hunk
            .lines
            .iter()
            .filter(|l| !matches!(l, HunkLine::Remove(_)))
            .count() as isize;
        offset += added - removed;
    }

    for line in &old_lines[cursor..] {
        patched.push((*line).to_string());
    }

    let mut result = patched.join("\n");
    if had_trailing_newline {
        result.push('\n');
    }
    Some(result)
}

/// Finds where a hunk's expected lines occur: the declared position first,
/// then a forward scan from the last applied hunk.
fn locate_hunk(lines: &[&str], expected: &[&str], declared: usize, cursor: usize) -> Option<usize> {
    if expected.is_empty() {
        return Some(declared.max(cursor).min(lines.len()));
    }
    if declared >= cursor && matches_at(lines, expected, declared) {
        return Some(declared);
    }
    (cursor..=lines.len().saturating_sub(expected.len()))
        .find(|&candidate| matches_at(lines, expected, candidate))
}

fn matches_at(lines: &[&str], expected: &[&str], position: usize) -> bool {
    if position + expected.len() > lines.len() {
        return false;
    }
    expected
        .iter()
        .zip(&lines[position..position + expected.len()])
        .all(|(want, have)| want == have)
}

/// Parses unified diff text into hunks. File headers (`---`/`+++`) and
/// "no newline" markers are tolerated and skipped.
fn parse_unified_diff(diff_text: &str) -> Option<Vec<Hunk>> {
    let mut hunks: Vec<Hunk> = Vec::new();
    let mut current: Option<Hunk> = None;

    for line in diff_text.lines() {
        if let Some(captures) = HUNK_HEADER.captures(line) {
            if let Some(done) = current.take() {
                hunks.push(done);
            }
            let old_start: usize = captures.get(1)?.as_str().parse().ok()?;
            current = Some(Hunk {
                old_start,
                lines: Vec::new(),
            });
            continue;
        }

        if line.starts_with("--- ") || line.starts_with("+++ ") || line.starts_with("diff ") {
            continue;
        }
        if line.starts_with('\\') {
            // "\ No newline at end of file"
            continue;
        }

        let Some(hunk) = current.as_mut() else {
            // Free text before the first hunk header is ignored.
            continue;
        };

        if let Some(rest) = line.strip_prefix('+') {
            hunk.lines.push(HunkLine::Add(rest.to_string()));
        } else if let Some(rest) = line.strip_prefix('-') {
            hunk.lines.push(HunkLine::Remove(rest.to_string()));
        } else if let Some(rest) = line.strip_prefix(' ') {
            hunk.lines.push(HunkLine::Context(rest.to_string()));
        } else if line.is_empty() {
            // Some emitters drop the leading space on blank context lines.
            hunk.lines.push(HunkLine::Context(String::new()));
        } else {
            return None;
        }
    }

    if let Some(done) = current.take() {
        hunks.push(done);
    }
    Some(hunks)
}
