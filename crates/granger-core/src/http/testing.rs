//! In-memory `HttpClient` for unit tests.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use url::Url;

use super::parse::{ContentRange, ResponseHead};
use super::{HttpClient, HttpResponse};
use crate::control::CancelToken;
use crate::error::FetchError;
use crate::segmenter::FragmentSpan;

type DelayFn = Box<dyn Fn(u64) -> Duration + Send + Sync>;

/// Serves a fixed body, honoring (or ignoring) ranges.
pub(crate) struct MemoryClient {
    body: Vec<u8>,
    advertise_ranges: bool,
    honor_ranges: bool,
    send_content_length: bool,
    /// `(start, status)`: requests starting at `start` get `status` and no body.
    failing: Vec<(u64, u32)>,
    /// Requests starting here get half of their body.
    truncated: Vec<u64>,
    delay: Option<DelayFn>,
    calls: AtomicUsize,
    ranges: Mutex<Vec<Option<FragmentSpan>>>,
}

impl MemoryClient {
    pub(crate) fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            advertise_ranges: true,
            honor_ranges: true,
            send_content_length: true,
            failing: Vec::new(),
            truncated: Vec::new(),
            delay: None,
            calls: AtomicUsize::new(0),
            ranges: Mutex::new(Vec::new()),
        }
    }

    /// Server that answers every request with the full body and 200.
    pub(crate) fn without_ranges(mut self) -> Self {
        self.advertise_ranges = false;
        self.honor_ranges = false;
        self
    }

    /// Omit `Accept-Ranges` but still honor ranged requests.
    pub(crate) fn quiet_ranges(mut self) -> Self {
        self.advertise_ranges = false;
        self
    }

    pub(crate) fn without_content_length(mut self) -> Self {
        self.send_content_length = false;
        self
    }

    pub(crate) fn fail_at(mut self, start: u64, status: u32) -> Self {
        self.failing.push((start, status));
        self
    }

    pub(crate) fn truncate_at(mut self, start: u64) -> Self {
        self.truncated.push(start);
        self
    }

    pub(crate) fn with_delay(mut self, delay: impl Fn(u64) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Some(Box::new(delay));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn ranges(&self) -> Vec<Option<FragmentSpan>> {
        self.ranges.lock().unwrap().clone()
    }

    fn response(head: ResponseHead, body: Vec<u8>) -> HttpResponse {
        HttpResponse {
            head,
            body: Box::new(Cursor::new(body)),
        }
    }
}

impl HttpClient for MemoryClient {
    fn get(
        &self,
        _url: &Url,
        range: Option<FragmentSpan>,
        cancel: &CancelToken,
    ) -> Result<HttpResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ranges.lock().unwrap().push(range);
        let start = range.map(|r| r.start).unwrap_or(0);
        if let Some(delay) = &self.delay {
            thread::sleep(delay(start));
        }
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let total = self.body.len() as u64;
        if let Some(&(_, status)) = self.failing.iter().find(|(s, _)| *s == start) {
            let head = ResponseHead {
                status,
                ..ResponseHead::default()
            };
            return Ok(Self::response(head, Vec::new()));
        }

        let mut head = ResponseHead {
            status: 200,
            accept_ranges: self.advertise_ranges,
            ..ResponseHead::default()
        };
        let mut bytes = match range {
            Some(span) if self.honor_ranges => {
                if span.start >= total && total > 0 {
                    head.status = 416;
                    return Ok(Self::response(head, Vec::new()));
                }
                let end = span.end.unwrap_or(total).min(total);
                head.status = 206;
                head.content_range = Some(ContentRange {
                    start: span.start,
                    end: end.saturating_sub(1),
                    total: Some(total),
                });
                self.body[span.start as usize..end as usize].to_vec()
            }
            _ => self.body.clone(),
        };
        if self.send_content_length {
            head.content_length = Some(bytes.len() as u64);
        }
        if self.truncated.contains(&start) {
            bytes.truncate(bytes.len() / 2);
        }
        Ok(Self::response(head, bytes))
    }
}
