//! Size discovery: the unranged GET whose response fragment 0 reuses.

use url::Url;

use crate::control::CancelToken;
use crate::error::FetchError;
use crate::http::{HttpClient, HttpResponse, ResponseHead};

/// Outcome of the discovery request.
#[derive(Debug)]
pub struct Discovery {
    pub head: ResponseHead,
    response: HttpResponse,
}

impl Discovery {
    /// Issue the discovery GET. Non-2xx is `UnexpectedStatus`.
    pub fn run(
        client: &dyn HttpClient,
        url: &Url,
        cancel: &CancelToken,
    ) -> Result<Self, FetchError> {
        let response = client.get(url, None, cancel)?;
        response.ensure_success()?;
        let head = response.head.clone();
        tracing::info!(
            url = %url,
            status = head.status,
            content_length = ?head.content_length,
            accept_ranges = head.accept_ranges,
            "discovery"
        );
        Ok(Self { head, response })
    }

    /// Resource size from `Content-Length`.
    pub fn total_size(&self) -> Result<u64, FetchError> {
        self.head
            .content_length
            .ok_or(FetchError::DiscoverySizeUnavailable)
    }

    pub fn supports_ranges(&self) -> bool {
        self.head.accept_ranges
    }

    /// The open response, body unread.
    pub fn into_response(self) -> HttpResponse {
        self.response
    }
}
