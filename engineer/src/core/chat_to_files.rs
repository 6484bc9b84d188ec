//! Extraction of generated files from a freeform model reply.
//!
//! A file is a path token on its own line ending, followed (after optional
//! whitespace) by a fenced code block:
//!
//! ````text
//! src/main.py
//! ```python
//! print("hi")
//! ```
//! ````
//!
//! The scan runs in three explicit phases (path token, fence open, fence
//! close) so each edge-case policy can be tested on its own.

use std::sync::LazyLock;

use regex::Regex;

pub const FENCE: &str = "```";

/// Key under which the prose preceding the first fence is stored.
pub const README_KEY: &str = "README.md";

/// Split a reply into `(path, content)` pairs, in the order found, followed by
/// the `README.md` pair.
///
/// Paths are sanitized but never rejected; the store decides key validity.
pub fn parse_chat(chat: &str) -> Vec<(String, String)> {
    let mut files: Vec<(String, String)> = FileBlocks::new(chat)
        .map(|(token, body)| (sanitize_path(token), body.to_string()))
        .collect();
    files.push((README_KEY.to_string(), readme_text(chat).to_string()));
    files
}

/// Everything before the first fence marker, or the whole reply.
pub fn readme_text(chat: &str) -> &str {
    chat.find(FENCE).map_or(chat, |idx| &chat[..idx])
}

/// Clean a raw path token taken from model output.
///
/// Drops `< > " | ? *`, unwraps `[...]` then `` `...` ``, and finally strips a
/// single stray trailing `]`.
pub fn sanitize_path(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '|' | '?' | '*'))
        .collect();
    let unbracketed = unwrap_pair(&stripped, '[', ']');
    let unticked = unwrap_pair(unbracketed, '`', '`');
    unticked.strip_suffix(']').unwrap_or(unticked).to_string()
}

fn unwrap_pair(s: &str, open: char, close: char) -> &str {
    if s.len() < open.len_utf8() + close.len_utf8() {
        return s;
    }
    s.strip_prefix(open)
        .and_then(|rest| rest.strip_suffix(close))
        .unwrap_or(s)
}

/// Bodies of every fenced block, used to assemble `run.sh`.
pub fn extract_code_blocks(text: &str) -> Vec<&str> {
    static BLOCK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```[^\n]*\n(.+?)```").expect("valid block regex"));
    BLOCK_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Iterator over raw `(path token, block body)` pairs.
struct FileBlocks<'a> {
    text: &'a str,
    /// Scan floor: nothing before this byte may belong to a later match.
    pos: usize,
}

impl<'a> FileBlocks<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }
}

impl<'a> Iterator for FileBlocks<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.text;
        let mut search = self.pos;
        while let Some(offset) = text[search..].find('\n') {
            let newline = search + offset;
            search = newline + 1;

            let token = path_token(text, self.pos, newline);
            if token.is_empty() {
                continue;
            }
            let Some(body_start) = open_fence(text, newline + 1) else {
                continue;
            };
            // Without a closer here there is none for any later opener either.
            let Some((body_end, resume)) = close_fence(text, body_start) else {
                break;
            };
            self.pos = resume;
            return Some((token, &text[body_start..body_end]));
        }
        self.pos = text.len();
        None
    }
}

/// Run of non-whitespace ending right before `newline`, not reaching below `floor`.
fn path_token(text: &str, floor: usize, newline: usize) -> &str {
    let head = &text[floor..newline];
    let start = head
        .char_indices()
        .rev()
        .take_while(|(_, c)| !c.is_whitespace())
        .last()
        .map_or(head.len(), |(idx, _)| idx);
    &head[start..]
}

/// Skip whitespace from `from`, expect a fence plus the rest of its line.
/// Returns the byte offset where the block body starts.
fn open_fence(text: &str, from: usize) -> Option<usize> {
    let rest = &text[from..];
    let trimmed = rest.trim_start();
    if !trimmed.starts_with(FENCE) {
        return None;
    }
    let after_fence = from + (rest.len() - trimmed.len()) + FENCE.len();
    let line_end = text[after_fence..].find('\n')?;
    Some(after_fence + line_end + 1)
}

/// Find the first fence after at least one body character.
/// Returns `(body_end, resume_offset)`.
fn close_fence(text: &str, body_start: usize) -> Option<(usize, usize)> {
    let first = text[body_start..].chars().next()?;
    let probe = body_start + first.len_utf8();
    let found = text[probe..].find(FENCE)?;
    let body_end = probe + found;
    Some((body_end, body_end + FENCE.len()))
}
