//! One byte range of the source, fetched lazily into an owned buffer.

use std::io::Read;

use url::Url;

use crate::control::CancelToken;
use crate::error::FetchError;
use crate::http::{HttpClient, HttpResponse};
use crate::segmenter::FragmentSpan;

/// Upper bound on the buffer reserved before reading. Lengths come from the
/// server, so anything larger grows as bytes actually arrive.
const MAX_RESERVE: u64 = 8 * 1024 * 1024;

fn reserve_for(len: u64) -> Vec<u8> {
    Vec::with_capacity(len.min(MAX_RESERVE) as usize)
}

/// A contiguous range of the resource plus, optionally, an already-open response.
#[derive(Debug)]
pub struct Fragment {
    url: Url,
    span: FragmentSpan,
    response: Option<HttpResponse>,
}

impl Fragment {
    pub fn new(url: Url, span: FragmentSpan) -> Self {
        Self {
            url,
            span,
            response: None,
        }
    }

    /// Reuse an open response (the discovery response for fragment 0)
    /// instead of issuing a request. Only the first binding is kept.
    pub fn bind_response(&mut self, response: HttpResponse) {
        if self.response.is_none() {
            self.response = Some(response);
        }
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    /// Fetch this fragment's bytes.
    ///
    /// Issues one ranged GET unless a response is already bound. The response
    /// is consumed and dropped on every path, including errors.
    pub fn fetch(
        &mut self,
        client: &dyn HttpClient,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, FetchError> {
        let response = match self.response.take() {
            Some(r) => r,
            None => {
                if self.span.is_empty() {
                    return Ok(Vec::new());
                }
                client.get(&self.url, Some(self.span), cancel)?
            }
        };
        let buf = self.read_body(response)?;
        tracing::debug!(
            start = self.span.start,
            end = ?self.span.end,
            bytes = buf.len(),
            "fragment fetched"
        );
        Ok(buf)
    }

    fn read_body(&self, response: HttpResponse) -> Result<Vec<u8>, FetchError> {
        response.ensure_success()?;
        self.check_range(&response)?;

        let HttpResponse { head, mut body } = response;
        match self.span.len() {
            Some(expected) => {
                let mut buf = reserve_for(expected);
                body.take(expected)
                    .read_to_end(&mut buf)
                    .map_err(FetchError::from_body_io)?;
                let received = buf.len() as u64;
                if received != expected {
                    return Err(FetchError::ShortRead { expected, received });
                }
                Ok(buf)
            }
            None => {
                let mut buf = reserve_for(head.content_length.unwrap_or(0));
                body.read_to_end(&mut buf)
                    .map_err(FetchError::from_body_io)?;
                Ok(buf)
            }
        }
    }

    /// A fragment past offset 0 must get exactly its range back; a full
    /// 200 body would be written at the wrong offset.
    fn check_range(&self, response: &HttpResponse) -> Result<(), FetchError> {
        if self.span.start == 0 {
            return Ok(());
        }
        let status = response.status();
        let starts_here = response
            .head
            .content_range
            .map(|cr| cr.start == self.span.start)
            .unwrap_or(false);
        if status != 206 || !starts_here {
            return Err(FetchError::RangeNotHonored { status });
        }
        Ok(())
    }
}
