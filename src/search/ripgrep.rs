//! `rg --json` backend: one external process per root, parsed as a stream.

use std::io::{BufRead, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::debug;

use crate::error::FilterError;
use crate::resolve_path;

use super::{preview_line, sort_matches, ContentMatch, RootQuery, RootSearchOutcome, RootSearcher};

/// One line of `rg --json` output. Only `match` messages carry hits.
#[derive(Deserialize)]
struct RgMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct RgMatchData {
    path: RgText,
    #[serde(default)]
    lines: Option<RgText>,
    #[serde(default)]
    line_number: Option<u64>,
    #[serde(default)]
    submatches: Vec<RgSubmatch>,
}

/// rg encodes non-UTF8 data as `{"bytes": "<base64>"}`; such paths are skipped.
#[derive(Deserialize)]
struct RgText {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct RgSubmatch {
    #[serde(default)]
    start: u64,
}

/// Runs ripgrep in each root with smart-case fixed-string matching.
#[derive(Clone, Debug)]
pub struct RipgrepSearcher {
    program: PathBuf,
}

impl Default for RipgrepSearcher {
    fn default() -> Self {
        Self { program: PathBuf::from("rg") }
    }
}

impl RipgrepSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific ripgrep binary instead of `rg` from `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    fn command(&self, root: &Path, query: &RootQuery<'_>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--json", "--line-number", "--column", "--smart-case", "--fixed-strings"]);
        if !query.skip_gitignored {
            cmd.arg("--no-ignore");
        }
        if query.show_hidden {
            cmd.arg("--hidden");
        }
        // `--` so queries starting with '-' are not read as flags
        cmd.arg("--").arg(query.text).arg(".");
        cmd.current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

/// Parse one `rg --json` line into a match rooted at `root`.
///
/// Returns `None` for non-match messages, malformed lines, and paths that
/// escape the root.
pub(crate) fn parse_match_line(line: &str, root: &Path) -> Option<ContentMatch> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let message: RgMessage = serde_json::from_str(line).ok()?;
    if message.kind != "match" {
        return None;
    }
    let data: RgMatchData = serde_json::from_value(message.data).ok()?;
    let relative = PathBuf::from(data.path.text?);
    if relative.is_absolute() || relative.components().any(|c| c == Component::ParentDir) {
        return None;
    }
    let relative: PathBuf = relative
        .components()
        .filter(|c| *c != Component::CurDir)
        .collect();
    let line_number = data.line_number.unwrap_or(0).max(1) as usize;
    let column = data.submatches.first().map(|s| s.start as usize + 1).unwrap_or(1);
    let text = data.lines.and_then(|l| l.text).unwrap_or_default();
    Some(ContentMatch {
        path: root.join(relative),
        line: line_number,
        column,
        preview: preview_line(&text),
    })
}

impl RootSearcher for RipgrepSearcher {
    fn search(
        &self,
        query: &RootQuery<'_>,
        on_match: &mut dyn FnMut(&ContentMatch),
        should_cancel: &dyn Fn() -> bool,
    ) -> RootSearchOutcome {
        if query.text.is_empty() {
            return RootSearchOutcome::default();
        }
        let root = resolve_path(query.root);

        let mut child = match self.command(&root, query).spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return RootSearchOutcome::failed(
                    FilterError::ToolUnavailable { tool: "rg".to_string() }.to_string(),
                );
            }
            Err(e) => return RootSearchOutcome::failed(format!("failed to run rg: {}", e)),
        };

        // Drain stderr off-thread so a chatty rg never blocks on a full pipe
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        let mut outcome = RootSearchOutcome::default();
        let mut total_matches = 0usize;
        let mut stopped_early = false;

        if let Some(stdout) = child.stdout.take() {
            for raw in BufReader::new(stdout).lines() {
                if should_cancel() {
                    stopped_early = true;
                    break;
                }
                let raw = match raw {
                    Ok(raw) => raw,
                    Err(_) => continue,
                };
                let Some(m) = parse_match_line(&raw, &root) else { continue };

                if !outcome.matches_by_file.contains_key(&m.path)
                    && outcome.matches_by_file.len() >= query.max_files
                {
                    outcome.truncated = true;
                    stopped_early = true;
                    break;
                }
                on_match(&m);
                outcome.matches_by_file.entry(m.path.clone()).or_default().push(m);
                total_matches += 1;
                if total_matches >= query.max_matches {
                    outcome.truncated = true;
                    stopped_early = true;
                    break;
                }
            }
        }

        if stopped_early {
            let _ = child.kill();
        }
        let status = child.wait();
        let stderr_text = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        debug!(
            root = %root.display(),
            matches = total_matches,
            files = outcome.matches_by_file.len(),
            truncated = outcome.truncated,
            "rg search finished"
        );

        if !stopped_early && outcome.matches_by_file.is_empty() {
            if let Ok(status) = status {
                // rg exits 1 when nothing matched
                let failed = !matches!(status.code(), Some(0) | Some(1));
                if failed {
                    let stderr_text = stderr_text.trim();
                    let message = if stderr_text.is_empty() {
                        match status.code() {
                            Some(code) => format!("rg failed with exit code {}", code),
                            None => "rg was terminated by a signal".to_string(),
                        }
                    } else {
                        stderr_text.to_string()
                    };
                    outcome.error = Some(message);
                    return outcome;
                }
            }
        }

        for matches in outcome.matches_by_file.values_mut() {
            sort_matches(matches);
        }
        outcome
    }
}
