//! Network collaborator: one blocking GET returning status, headers and a
//! streaming body.
//!
//! `CurlClient` is the libcurl implementation. The trait exists so the
//! downloader can be driven by anything that speaks byte ranges.

mod curl_client;
mod parse;

#[cfg(test)]
pub(crate) mod testing;

use std::io::Read;

use url::Url;

use crate::control::CancelToken;
use crate::error::FetchError;
use crate::segmenter::FragmentSpan;

pub use curl_client::{CurlClient, CurlOptions};
pub use parse::{parse_content_range, parse_head, ContentRange, ResponseHead};

/// Issues GET requests, optionally restricted to a byte range.
pub trait HttpClient: Send + Sync {
    /// Send one GET for `url`. With `range`, sends `Range: bytes=start-(end-1)`.
    ///
    /// Returns once the response head is available; the body streams from
    /// the returned reader. Transport failures are `FetchError::Network`.
    /// Status codes are not checked here.
    fn get(
        &self,
        url: &Url,
        range: Option<FragmentSpan>,
        cancel: &CancelToken,
    ) -> Result<HttpResponse, FetchError>;
}

impl<C: HttpClient + ?Sized> HttpClient for std::sync::Arc<C> {
    fn get(
        &self,
        url: &Url,
        range: Option<FragmentSpan>,
        cancel: &CancelToken,
    ) -> Result<HttpResponse, FetchError> {
        (**self).get(url, range, cancel)
    }
}

/// Open response. Dropping it releases the underlying transfer, finished or not.
pub struct HttpResponse {
    pub head: ResponseHead,
    pub body: Box<dyn Read + Send>,
}

impl HttpResponse {
    pub fn status(&self) -> u32 {
        self.head.status
    }

    pub fn is_success(&self) -> bool {
        self.head.is_success()
    }

    /// `UnexpectedStatus` unless the status is 2xx.
    pub fn ensure_success(&self) -> Result<(), FetchError> {
        if self.is_success() {
            Ok(())
        } else {
            Err(FetchError::UnexpectedStatus {
                status: self.head.status,
            })
        }
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}
