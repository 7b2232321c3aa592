use serde_yaml::{Mapping, Sequence, Value};

use super::locate::{KeySpan, Layout};
use super::span::{unify_diffs, DiffSpan, SpanSink};
use crate::document::{serialize_entry, serialize_item, serialize_lines};

/// The text could not be matched to the value; the caller replaces the
/// whole enclosing span instead.
struct Unanchored;

/// How the items of a sequence are aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListShape {
    /// Process nodes, aligned by `id`.
    Processes,
    /// Ingress or egress rules, aligned by position.
    Rules,
    /// `to`/`from` blocks of one rule, aligned by equality.
    PeerBlocks,
    /// Anything else is replaced as a whole.
    Opaque,
}

fn list_shape(path: &[&str]) -> ListShape {
    match path {
        [.., "processPolicy"] => ListShape::Processes,
        [.., "children"] if path.contains(&"processPolicy") => ListShape::Processes,
        [.., "networkPolicy", "ingress" | "egress"] => ListShape::Rules,
        [.., "ingress" | "egress", "to" | "from"] => ListShape::PeerBlocks,
        _ => ListShape::Opaque,
    }
}

/// Compute unified spans turning `text` (the layout of `original`) into `updated`.
pub fn diff_spans(text: &str, original: &Value, updated: &Value) -> Vec<DiffSpan> {
    let layout = Layout::new(text);
    let count = layout.len();
    let mut walker = Walker {
        layout: &layout,
        sink: SpanSink::default(),
    };

    let anchored = if original == updated {
        Ok(())
    } else {
        match (original, updated, layout.first_col(0, count)) {
            (Value::Mapping(ours), Value::Mapping(theirs), Some(col)) => {
                walker.dict_diffs(ours, theirs, 0, count, col, &mut Vec::new())
            }
            _ => Err(Unanchored),
        }
    };
    if anchored.is_err() {
        tracing::debug!("document layout not anchorable, replacing it as a whole");
        walker.sink.truncate(0);
        walker.sink.replace(0, count, serialize_lines(updated, 0));
    }
    unify_diffs(walker.sink.into_spans(), count)
}

struct Walker<'l> {
    layout: &'l Layout<'l>,
    sink: SpanSink,
}

impl Walker<'_> {
    fn dict_diffs<'v>(
        &mut self,
        ours: &'v Mapping,
        theirs: &'v Mapping,
        start: usize,
        end: usize,
        col: usize,
        path: &mut Vec<&'v str>,
    ) -> Result<(), Unanchored> {
        let mut anchor = start;
        for (key, before) in ours {
            let span = self
                .layout
                .find_key(key, start, end, col)
                .ok_or(Unanchored)?;
            anchor = anchor.max(span.end);
            match theirs.get(key) {
                None => self.sink.remove(span.line, span.end),
                Some(after) if after == before => self.sink.unchanged(span.line, span.end),
                Some(after) => {
                    path.push(key.as_str().unwrap_or_default());
                    self.entry_diffs(key, before, after, span, col, path);
                    path.pop();
                }
            }
        }
        for (key, after) in theirs {
            if !ours.contains_key(key) {
                self.sink.insert(anchor, serialize_entry(key, after, col));
            }
        }
        Ok(())
    }

    /// Diff one changed entry, replacing its span when it cannot be walked.
    fn entry_diffs<'v>(
        &mut self,
        key: &Value,
        before: &'v Value,
        after: &'v Value,
        span: KeySpan,
        col: usize,
        path: &mut Vec<&'v str>,
    ) {
        let mark = self.sink.mark();
        let walked = match (before, after) {
            (Value::Mapping(ours), Value::Mapping(theirs)) if span.block => {
                match self.layout.first_col(span.line + 1, span.end) {
                    Some(inner) if inner > col => {
                        self.dict_diffs(ours, theirs, span.line + 1, span.end, inner, path)
                    }
                    _ => Err(Unanchored),
                }
            }
            (Value::Sequence(ours), Value::Sequence(theirs)) if span.block => {
                self.list_diffs(ours, theirs, span.line + 1, span.end, path)
            }
            _ => Err(Unanchored),
        };
        if walked.is_err() {
            self.sink.truncate(mark);
            let lines = self
                .layout
                .carry_prefix(span.line, serialize_entry(key, after, col));
            self.sink.replace(span.line, span.end, lines);
        }
    }

    fn list_diffs<'v>(
        &mut self,
        ours: &'v Sequence,
        theirs: &'v Sequence,
        start: usize,
        end: usize,
        path: &mut Vec<&'v str>,
    ) -> Result<(), Unanchored> {
        let shape = list_shape(path);
        if shape == ListShape::Opaque {
            return Err(Unanchored);
        }
        let (dash, items) = self.layout.items(start, end).ok_or(Unanchored)?;
        if items.len() != ours.len() {
            return Err(Unanchored);
        }
        let tail = items.last().map_or(start, |&(_, item_end)| item_end);

        match shape {
            ListShape::Processes => self.process_diffs(ours, theirs, &items, dash, path),
            ListShape::Rules => {
                for index in 0..ours.len().max(theirs.len()) {
                    match (ours.get(index), theirs.get(index)) {
                        (Some(before), Some(after)) => {
                            self.item_diffs(before, after, items[index], dash, path)
                        }
                        (Some(_), None) => self.sink.remove(items[index].0, items[index].1),
                        (None, Some(after)) => self.sink.insert(tail, serialize_item(after, dash)),
                        (None, None) => {}
                    }
                }
            }
            ListShape::PeerBlocks => {
                let mut used = vec![false; theirs.len()];
                for (before, &(item_start, item_end)) in ours.iter().zip(&items) {
                    let partner = (0..theirs.len()).find(|&j| !used[j] && theirs[j] == *before);
                    match partner {
                        Some(j) => {
                            used[j] = true;
                            self.sink.unchanged(item_start, item_end);
                        }
                        None => self.sink.remove(item_start, item_end),
                    }
                }
                for (after, _) in theirs.iter().zip(&used).filter(|(_, used)| !**used) {
                    self.sink.insert(tail, serialize_item(after, dash));
                }
            }
            ListShape::Opaque => {}
        }
        Ok(())
    }

    /// Align process nodes by id and walk them in the updated order.
    fn process_diffs<'v>(
        &mut self,
        ours: &'v Sequence,
        theirs: &'v Sequence,
        items: &[(usize, usize)],
        dash: usize,
        path: &mut Vec<&'v str>,
    ) {
        let id_of = |node: &Value| node.get("id").and_then(Value::as_str).map(str::to_string);

        let mut partner_of: Vec<Option<usize>> = vec![None; theirs.len()];
        let mut matched = vec![false; ours.len()];
        for (j, after) in theirs.iter().enumerate() {
            let found = match id_of(after) {
                Some(id) => (0..ours.len()).find(|&i| !matched[i] && id_of(&ours[i]) == Some(id.clone())),
                None => (j < ours.len() && !matched[j] && id_of(&ours[j]).is_none()).then_some(j),
            };
            if let Some(i) = found {
                matched[i] = true;
                partner_of[j] = Some(i);
            }
        }

        let mut anchor = items.first().map_or(0, |&(item_start, _)| item_start);
        for (j, after) in theirs.iter().enumerate() {
            match partner_of[j] {
                Some(i) => {
                    self.item_diffs(&ours[i], after, items[i], dash, path);
                    anchor = items[i].1;
                }
                None => {
                    tracing::debug!(id = ?id_of(after), "process node added");
                    self.sink.insert(anchor, serialize_item(after, dash));
                }
            }
        }
        for (i, &(item_start, item_end)) in items.iter().enumerate() {
            if !matched[i] {
                self.sink.remove(item_start, item_end);
            }
        }
    }

    /// Diff two aligned sequence items.
    fn item_diffs<'v>(
        &mut self,
        before: &'v Value,
        after: &'v Value,
        (start, end): (usize, usize),
        dash: usize,
        path: &mut Vec<&'v str>,
    ) {
        if before == after {
            self.sink.unchanged(start, end);
            return;
        }
        let mark = self.sink.mark();
        let walked = match (before, after) {
            (Value::Mapping(ours), Value::Mapping(theirs)) => {
                let col = self.layout.info[start].col;
                self.dict_diffs(ours, theirs, start, end, col, path)
            }
            _ => Err(Unanchored),
        };
        if walked.is_err() {
            self.sink.truncate(mark);
            self.sink.replace(start, end, serialize_item(after, dash));
        }
    }
}
