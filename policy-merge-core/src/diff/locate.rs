//! Indentation-aware anchoring of mapping keys and sequence items to lines.

use serde_yaml::Value;

/// Layout facts about one line of block YAML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LineInfo {
    /// Leading spaces.
    pub indent: usize,
    /// Column of the content after any `- ` item markers.
    pub col: usize,
    /// The line opens a sequence item.
    pub dashed: bool,
    /// Blank, comment-only or a document marker.
    pub blank: bool,
    body_start: usize,
}

impl LineInfo {
    pub fn analyze(raw: &str) -> Self {
        let indent = raw.len() - raw.trim_start_matches(' ').len();
        let mut col = indent;
        let mut dashed = false;
        let mut rest = &raw[indent..];
        while rest == "-" || rest.starts_with("- ") {
            dashed = true;
            let trimmed = rest[1..].trim_start_matches(' ');
            col += rest.len() - trimmed.len();
            rest = trimmed;
        }
        let blank = !dashed
            && (rest.is_empty()
                || rest.starts_with('#')
                || (indent == 0 && (rest == "---" || rest == "...")));
        Self {
            indent,
            col,
            dashed,
            blank,
            body_start: raw.len() - rest.len(),
        }
    }

    pub fn body<'a>(&self, raw: &'a str) -> &'a str {
        &raw[self.body_start..]
    }
}

/// The original text with per-line layout facts.
#[derive(Debug)]
pub(crate) struct Layout<'a> {
    pub raw: Vec<&'a str>,
    pub info: Vec<LineInfo>,
}

/// A located mapping entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct KeySpan {
    pub line: usize,
    pub end: usize,
    /// The value is written in block style below the key line.
    pub block: bool,
}

impl<'a> Layout<'a> {
    pub fn new(text: &'a str) -> Self {
        let raw: Vec<&str> = text.lines().collect();
        let info = raw.iter().map(|line| LineInfo::analyze(line)).collect();
        Self { raw, info }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Column of the first content line in `[start, end)`.
    pub fn first_col(&self, start: usize, end: usize) -> Option<usize> {
        (start..end)
            .find(|&i| !self.info[i].blank)
            .map(|i| self.info[i].col)
    }

    /// Find `key` among the entries of the mapping at `col` within `[start, end)`.
    pub fn find_key(&self, key: &Value, start: usize, end: usize, col: usize) -> Option<KeySpan> {
        let wanted = key_text(key)?;
        let line = (start..end).find(|&i| {
            let info = &self.info[i];
            !info.blank
                && info.col == col
                && split_key(info.body(self.raw[i])).is_some_and(|(k, _)| k == wanted)
        })?;
        let inline = split_key(self.info[line].body(self.raw[line]))
            .map(|(_, rest)| rest)
            .unwrap_or_default();
        Some(KeySpan {
            line,
            end: self.block_end(line, end, col),
            block: inline.is_empty() || inline.starts_with('#'),
        })
    }

    /// End (exclusive) of the entry whose key sits on `line` at `col`.
    fn block_end(&self, line: usize, end: usize, col: usize) -> usize {
        let mut last = line + 1;
        for j in line + 1..end {
            let info = &self.info[j];
            if info.blank {
                continue;
            }
            if info.indent > col || (info.indent == col && info.dashed) {
                last = j + 1;
            } else {
                break;
            }
        }
        last
    }

    /// Line spans of the block sequence items inside `[start, end)`.
    pub fn items(&self, start: usize, end: usize) -> Option<(usize, Vec<(usize, usize)>)> {
        let first = (start..end).find(|&i| !self.info[i].blank)?;
        if !self.info[first].dashed {
            return None;
        }
        let dash = self.info[first].indent;
        let starts: Vec<usize> = (first..end)
            .filter(|&i| self.info[i].dashed && self.info[i].indent == dash)
            .collect();
        let spans = starts
            .iter()
            .enumerate()
            .map(|(n, &s)| {
                let limit = starts.get(n + 1).copied().unwrap_or(end);
                let last = (s..limit)
                    .rev()
                    .find(|&i| !self.info[i].blank)
                    .unwrap_or(s);
                (s, last + 1)
            })
            .collect();
        Some((dash, spans))
    }

    /// Replace the indentation of `lines[0]` with the item markers of `line`.
    pub fn carry_prefix(&self, line: usize, mut lines: Vec<String>) -> Vec<String> {
        let info = &self.info[line];
        if !info.dashed {
            return lines;
        }
        let prefix = &self.raw[line][..info.col];
        if let Some(first) = lines.first_mut() {
            if first.len() >= info.col && first[..info.col].trim().is_empty() {
                *first = format!("{prefix}{}", &first[info.col..]);
            }
        }
        lines
    }
}

/// Plain text of a scalar mapping key.
fn key_text(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Split `key: rest` into the unquoted key and the trimmed remainder.
fn split_key(body: &str) -> Option<(&str, &str)> {
    let (key, after) = if let Some(quote @ ('"' | '\'')) = body.chars().next() {
        let close = body[1..].find(quote)? + 1;
        (&body[1..close], &body[close + 1..])
    } else {
        let colon = body
            .match_indices(':')
            .map(|(i, _)| i)
            .find(|&i| body[i + 1..].is_empty() || body[i + 1..].starts_with(' '))?;
        (&body[..colon], &body[colon..])
    };
    let rest = after.strip_prefix(':')?;
    if !(rest.is_empty() || rest.starts_with(' ')) {
        return None;
    }
    Some((key.trim_end(), rest.trim()))
}
