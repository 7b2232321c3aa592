use serde::Serialize;

/// Ordering key of a span.
///
/// At one line, pure insertions sort before the span covering that line;
/// `seq` is the emission order, so child spans discovered while walking a
/// node render right after the node and before later sibling insertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpanKey {
    pub line: usize,
    pub covering: bool,
    pub seq: usize,
}

/// What happened to a range of original lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanKind {
    Unchanged,
    /// The original lines were removed and `added` inserted in their place.
    Changed { added: Vec<String> },
}

/// A half-open range `[start, end)` over the original lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSpan {
    pub start: usize,
    pub end: usize,
    pub kind: SpanKind,
    pub key: SpanKey,
}

impl DiffSpan {
    fn is_unchanged(&self) -> bool {
        matches!(self.kind, SpanKind::Unchanged)
    }
}

/// One rendered diff line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum DiffLine {
    Context(String),
    Removed(String),
    Added(String),
}

impl DiffLine {
    pub fn text(&self) -> &str {
        match self {
            DiffLine::Context(text) | DiffLine::Removed(text) | DiffLine::Added(text) => text,
        }
    }
}

/// Collects spans in emission order.
#[derive(Debug, Default)]
pub(crate) struct SpanSink {
    spans: Vec<DiffSpan>,
}

impl SpanSink {
    pub fn unchanged(&mut self, start: usize, end: usize) {
        if start < end {
            self.push(start, end, SpanKind::Unchanged);
        }
    }

    pub fn replace(&mut self, start: usize, end: usize, added: Vec<String>) {
        self.push(start, end, SpanKind::Changed { added });
    }

    pub fn remove(&mut self, start: usize, end: usize) {
        if start < end {
            self.push(start, end, SpanKind::Changed { added: Vec::new() });
        }
    }

    pub fn insert(&mut self, line: usize, added: Vec<String>) {
        if !added.is_empty() {
            self.push(line, line, SpanKind::Changed { added });
        }
    }

    fn push(&mut self, start: usize, end: usize, kind: SpanKind) {
        let key = SpanKey {
            line: start,
            covering: start < end,
            seq: self.spans.len(),
        };
        self.spans.push(DiffSpan {
            start,
            end,
            kind,
            key,
        });
    }

    /// Position to roll back to with [`SpanSink::truncate`].
    pub fn mark(&self) -> usize {
        self.spans.len()
    }

    pub fn truncate(&mut self, mark: usize) {
        self.spans.truncate(mark);
    }

    pub fn into_spans(self) -> Vec<DiffSpan> {
        self.spans
    }
}

/// Cover gaps with unchanged spans, order by key and coalesce adjacent
/// spans of the same kind.
pub fn unify_diffs(mut spans: Vec<DiffSpan>, line_count: usize) -> Vec<DiffSpan> {
    let mut covered = vec![false; line_count];
    for span in &spans {
        for flag in covered.iter_mut().take(span.end).skip(span.start) {
            *flag = true;
        }
    }
    let mut seq = spans.len();
    let mut line = 0;
    while line < line_count {
        if covered[line] {
            line += 1;
            continue;
        }
        let start = line;
        while line < line_count && !covered[line] {
            line += 1;
        }
        spans.push(DiffSpan {
            start,
            end: line,
            kind: SpanKind::Unchanged,
            key: SpanKey {
                line: start,
                covering: true,
                seq,
            },
        });
        seq += 1;
    }

    spans.sort_by_key(|span| span.key);

    let mut unified: Vec<DiffSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        if let Some(last) = unified.last_mut() {
            if last.end == span.start && last.is_unchanged() == span.is_unchanged() {
                last.end = span.end;
                if let (SpanKind::Changed { added }, SpanKind::Changed { added: more }) =
                    (&mut last.kind, span.kind)
                {
                    added.extend(more);
                }
                continue;
            }
        }
        unified.push(span);
    }
    unified
}

/// Render unified spans against the original lines.
pub fn render(spans: &[DiffSpan], lines: &[&str]) -> Vec<DiffLine> {
    let mut out = Vec::new();
    let mut cursor = 0;
    for span in spans {
        let start = span.start.max(cursor).min(lines.len());
        let end = span.end.max(start).min(lines.len());
        if span.start < cursor {
            tracing::debug!(start = span.start, cursor, "diff span overlaps previous span");
        }
        match &span.kind {
            SpanKind::Unchanged => {
                out.extend(lines[start..end].iter().map(|l| DiffLine::Context(l.to_string())));
            }
            SpanKind::Changed { added } => {
                out.extend(lines[start..end].iter().map(|l| DiffLine::Removed(l.to_string())));
                out.extend(added.iter().cloned().map(DiffLine::Added));
            }
        }
        cursor = cursor.max(end);
    }
    out
}
