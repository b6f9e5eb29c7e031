//! Fragment download orchestration.
//!
//! Discovers the resource size, plans fragments, and submits one
//! `(fetch, write)` job per fragment to an `OrderedJobProcessor`: fetches run
//! concurrently up to `concurrency`, writes reach the sink in offset order.

mod discover;
mod progress;


use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::mpsc::Sender;
use url::Url;

use crate::control::CancelToken;
use crate::error::FetchError;
use crate::fragment::Fragment;
use crate::http::{CurlClient, HttpClient};
use crate::ordered::OrderedJobProcessor;
use crate::segmenter::plan_fragments;
use crate::sink::ByteSink;

pub use discover::Discovery;
pub use progress::ProgressStats;

/// Per-download options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Fragments fetched at once. Must be at least 1.
    pub concurrency: usize,
    /// Bytes per fragment; 0 downloads the resource as one fragment.
    pub fragment_size: u64,
    /// Use one fragment when discovery does not advertise `Accept-Ranges: bytes`.
    pub single_fragment_without_ranges: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            fragment_size: 0,
            single_fragment_without_ranges: true,
        }
    }
}

/// Result of a successful download.
#[derive(Debug)]
pub struct Completed<S> {
    /// Discovered size, or bytes written when the size was unknown.
    pub total_size: u64,
    pub fragments: usize,
    /// The sink, after `finish`.
    pub sink: S,
}

/// Sink plus tallies; only touched from ordered callbacks.
struct Output<S> {
    sink: Option<S>,
    bytes_written: u64,
    fragments_done: usize,
}

fn lock<S>(output: &Mutex<Output<S>>) -> MutexGuard<'_, Output<S>> {
    output.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bounded-concurrency, order-preserving downloader.
pub struct Downloader<C = CurlClient> {
    client: Arc<C>,
    options: DownloadOptions,
    progress: Option<Sender<ProgressStats>>,
    cancel: CancelToken,
}

impl Downloader<CurlClient> {
    /// Downloader using libcurl with default transfer settings.
    pub fn new(options: DownloadOptions) -> Self {
        Self::with_client(CurlClient::default(), options)
    }
}

impl<C> Downloader<C>
where
    C: HttpClient + 'static,
{
    pub fn with_client(client: C, options: DownloadOptions) -> Self {
        Self {
            client: Arc::new(client),
            options,
            progress: None,
            cancel: CancelToken::new(),
        }
    }

    /// Send a `ProgressStats` after every written fragment. Snapshots are
    /// dropped when the channel is full.
    pub fn with_progress(mut self, tx: Sender<ProgressStats>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Cancelling `cancel` aborts any run in progress with `Cancelled`.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn validate(&self) -> Result<(), FetchError> {
        if self.options.concurrency == 0 {
            return Err(FetchError::InvalidOptions(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Download `url` into `sink`.
    ///
    /// Blocks until every fragment is written and the sink finished, or until
    /// the first error, which is returned. After an error the sink holds an
    /// unspecified prefix of the data and is dropped unfinished.
    pub fn run<S>(&self, url: &Url, mut sink: S) -> Result<Completed<S>, FetchError>
    where
        S: ByteSink + 'static,
    {
        self.validate()?;
        let started = Instant::now();

        let discovery = Discovery::run(&*self.client, url, &self.cancel)?;
        let total = match discovery.total_size() {
            Ok(size) => Some(size),
            Err(e) => {
                tracing::warn!(error = %e, "downloading as a single fragment of unknown length");
                None
            }
        };
        let mut fragment_size = self.options.fragment_size;
        if total.is_some()
            && !discovery.supports_ranges()
            && self.options.single_fragment_without_ranges
        {
            tracing::info!("server does not advertise byte ranges, using one fragment");
            fragment_size = 0;
        }
        let spans = plan_fragments(total, fragment_size);
        let fragment_count = spans.len();
        tracing::info!(
            url = %url,
            total_size = ?total,
            fragments = fragment_count,
            concurrency = self.options.concurrency,
            "starting download"
        );

        sink.prepare(total)?;
        let output = Arc::new(Mutex::new(Output {
            sink: Some(sink),
            bytes_written: 0,
            fragments_done: 0,
        }));

        let ojp: OrderedJobProcessor<FetchError> =
            OrderedJobProcessor::with_cancel_token(self.options.concurrency, self.cancel.child());
        let job_cancel = ojp.cancel_token();
        let mut first_response = Some(discovery.into_response());

        for (index, span) in spans.into_iter().enumerate() {
            let mut fragment = Fragment::new(url.clone(), span);
            if let Some(response) = first_response.take() {
                fragment.bind_response(response);
            }

            let client = Arc::clone(&self.client);
            let cancel = job_cancel.clone();
            let output = Arc::clone(&output);
            let progress = self.progress.clone();

            let submitted = ojp.submit(
                move || fragment.fetch(&*client, &cancel),
                move |data: Vec<u8>| {
                    let mut out = lock(&output);
                    let len = data.len() as u64;
                    match out.sink.as_mut() {
                        Some(sink) => sink.write_fragment(span.start, data)?,
                        None => return Err(FetchError::Aborted),
                    }
                    out.bytes_written += len;
                    out.fragments_done += 1;
                    tracing::debug!(index, offset = span.start, bytes = len, "fragment written");
                    if let Some(tx) = &progress {
                        let _ = tx.try_send(ProgressStats {
                            bytes_done: out.bytes_written,
                            total_bytes: total,
                            elapsed_secs: started.elapsed().as_secs_f64(),
                            fragments_done: out.fragments_done,
                            fragment_count,
                        });
                    }
                    Ok(())
                },
            );
            if submitted.is_err() {
                // The cause comes back from `stop`.
                break;
            }
        }

        ojp.stop()?;

        let mut out = lock(&output);
        let mut sink = out.sink.take().ok_or(FetchError::Aborted)?;
        sink.finish()?;
        let total_size = total.unwrap_or(out.bytes_written);
        tracing::info!(
            total_size,
            fragments = fragment_count,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "download complete"
        );
        Ok(Completed {
            total_size,
            fragments: fragment_count,
            sink,
        })
    }
}
