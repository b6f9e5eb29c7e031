//! Fragment span type and partitioning.

/// Byte range `[start, end)` of the source resource.
///
/// `end == None` means "until end of stream"; it only appears when the
/// resource size is unknown and the whole body is one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentSpan {
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (exclusive), if known.
    pub end: Option<u64>,
}

impl FragmentSpan {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Span from `start` to the end of the body.
    pub fn open(start: u64) -> Self {
        Self { start, end: None }
    }

    /// Length in bytes; `None` for open spans.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end.saturating_sub(self.start))
    }

    /// True for a known-empty span (only planned for zero-length resources).
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// HTTP Range header value with inclusive end: `bytes=start-(end-1)`,
    /// or `bytes=start-` for open spans. `None` for empty spans.
    pub fn range_header_value(&self) -> Option<String> {
        self.curl_range().map(|r| format!("bytes={}", r))
    }

    /// Range in curl's form (`start-end_inclusive`, no `bytes=` prefix).
    pub fn curl_range(&self) -> Option<String> {
        match self.end {
            Some(end) if end <= self.start => None,
            Some(end) => Some(format!("{}-{}", self.start, end - 1)),
            None => Some(format!("{}-", self.start)),
        }
    }
}

/// Partition a resource into fragments of `fragment_size` bytes.
///
/// - unknown size: one open span `[0, ..)`;
/// - `fragment_size == 0` or `>= total_size`: one span `[0, total_size)`;
/// - otherwise `ceil(total_size / fragment_size)` contiguous spans, the last
///   one holding the remainder.
///
/// Always returns at least one span, even for `total_size == 0`.
pub fn plan_fragments(total_size: Option<u64>, fragment_size: u64) -> Vec<FragmentSpan> {
    let total_size = match total_size {
        Some(t) => t,
        None => return vec![FragmentSpan::open(0)],
    };
    if fragment_size == 0 || fragment_size >= total_size {
        return vec![FragmentSpan::new(0, total_size)];
    }

    let count = total_size.div_ceil(fragment_size);
    let mut out = Vec::with_capacity(count as usize);
    let mut offset = 0u64;
    while offset < total_size {
        let end = offset.saturating_add(fragment_size).min(total_size);
        out.push(FragmentSpan::new(offset, end));
        offset = end;
    }
    out
}
