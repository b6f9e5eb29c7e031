//! libcurl-backed `HttpClient`.
//!
//! Each request runs an `Easy2` transfer on its own thread. The handler
//! forwards the parsed head and then body chunks over a bounded channel, so
//! a slow reader throttles the transfer instead of buffering the fragment.

use std::io::{self, Read};
use std::str;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use curl::easy::{Easy2, Handler, WriteError};
use url::Url;

use super::parse::{parse_head, ResponseHead};
use super::{HttpClient, HttpResponse};
use crate::control::CancelToken;
use crate::error::FetchError;
use crate::segmenter::FragmentSpan;

/// How often a blocked reader re-checks its cancel token.
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Transfer tuning applied to every request.
#[derive(Debug, Clone)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    /// Abort if throughput stays below this many bytes/s for `low_speed_time`.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    /// Hard wall-clock limit per request.
    pub timeout: Option<Duration>,
    /// Max receive speed in bytes/s (CURLOPT_MAX_RECV_SPEED_LARGE).
    pub max_recv_speed: Option<u64>,
    /// Receive buffer size in bytes (CURLOPT_BUFFERSIZE).
    pub buffer_size: Option<usize>,
    /// Body chunks buffered between the transfer thread and the reader.
    pub body_queue_depth: usize,
}

impl Default for CurlOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_limit: 1024,
            low_speed_time: Duration::from_secs(60),
            timeout: Some(Duration::from_secs(3600)),
            max_recv_speed: None,
            buffer_size: None,
            body_queue_depth: 16,
        }
    }
}

/// Blocking HTTP client on libcurl.
#[derive(Debug, Clone, Default)]
pub struct CurlClient {
    options: CurlOptions,
}

impl CurlClient {
    pub fn new(options: CurlOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CurlOptions {
        &self.options
    }

    fn configure(
        &self,
        easy: &mut Easy2<StreamHandler>,
        url: &Url,
        range: Option<FragmentSpan>,
    ) -> Result<(), curl::Error> {
        let o = &self.options;
        easy.url(url.as_str())?;
        easy.get(true)?;
        easy.follow_location(true)?;
        easy.connect_timeout(o.connect_timeout)?;
        easy.low_speed_limit(o.low_speed_limit)?;
        easy.low_speed_time(o.low_speed_time)?;
        if let Some(timeout) = o.timeout {
            easy.timeout(timeout)?;
        }
        if let Some(speed) = o.max_recv_speed {
            easy.max_recv_speed(speed)?;
        }
        if let Some(sz) = o.buffer_size {
            easy.buffer_size(sz)?;
        }
        // Needed for the progress callback that polls cancellation.
        easy.progress(true)?;
        if let Some(r) = range.and_then(|span| span.curl_range()) {
            easy.range(&r)?;
        }
        Ok(())
    }
}

impl HttpClient for CurlClient {
    fn get(
        &self,
        url: &Url,
        range: Option<FragmentSpan>,
        cancel: &CancelToken,
    ) -> Result<HttpResponse, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let (tx, rx) = mpsc::sync_channel(self.options.body_queue_depth.max(1));
        let released = Arc::new(AtomicBool::new(false));
        let handler = StreamHandler {
            tx,
            headers: Vec::new(),
            head_sent: false,
            cancel: cancel.clone(),
            released: Arc::clone(&released),
        };
        let mut easy = Easy2::new(handler);
        self.configure(&mut easy, url, range)?;

        tracing::debug!(url = %url, range = ?range.and_then(|s| s.range_header_value()), "GET");
        thread::Builder::new()
            .name("granger-http".to_string())
            .spawn(move || run_transfer(easy))
            .map_err(FetchError::Spawn)?;

        let mut body = ResponseBody {
            rx,
            chunk: Vec::new(),
            pos: 0,
            finished: false,
            cancel: cancel.clone(),
            released,
        };
        let head = body.wait_for_head()?;
        tracing::debug!(status = head.status, content_length = ?head.content_length, "response head");
        Ok(HttpResponse {
            head,
            body: Box::new(body),
        })
    }
}

/// Message from the transfer thread to the response reader.
enum Event {
    Head(ResponseHead),
    Data(Vec<u8>),
    Done,
    Failed(FetchError),
}

/// Easy2 handler streaming one response over a bounded channel.
struct StreamHandler {
    tx: SyncSender<Event>,
    /// Header lines of the current response block.
    headers: Vec<String>,
    head_sent: bool,
    cancel: CancelToken,
    /// Set once the reader dropped the response.
    released: Arc<AtomicBool>,
}

impl StreamHandler {
    fn send_head(&mut self) -> bool {
        if self.head_sent {
            return true;
        }
        self.head_sent = true;
        self.tx.send(Event::Head(parse_head(&self.headers))).is_ok()
    }

    fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.released.load(Ordering::Relaxed)
    }
}

impl Handler for StreamHandler {
    fn header(&mut self, data: &[u8]) -> bool {
        if let Ok(s) = str::from_utf8(data) {
            let line = s.trim_end();
            if line.starts_with("HTTP/") {
                self.headers.clear();
            }
            self.headers.push(line.to_string());
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        if self.should_stop() || !self.send_head() {
            return Ok(0);
        }
        // Blocks while the reader is behind by `body_queue_depth` chunks.
        match self.tx.send(Event::Data(data.to_vec())) {
            Ok(()) => Ok(data.len()),
            Err(_) => Ok(0),
        }
    }

    fn progress(&mut self, _dltotal: f64, _dlnow: f64, _ultotal: f64, _ulnow: f64) -> bool {
        !self.should_stop()
    }
}

fn run_transfer(mut easy: Easy2<StreamHandler>) {
    let result = easy.perform();
    let handler = easy.get_mut();
    match result {
        Ok(()) => {
            // Empty bodies never reach `write`.
            if handler.send_head() {
                let _ = handler.tx.send(Event::Done);
            }
        }
        Err(e) => {
            if handler.released.load(Ordering::Relaxed) {
                return;
            }
            let err = if handler.cancel.is_cancelled() {
                FetchError::Cancelled
            } else {
                FetchError::from(e)
            };
            tracing::debug!(error = %err, "transfer failed");
            let _ = handler.tx.send(Event::Failed(err));
        }
    }
}

/// Reader side of a streaming response.
struct ResponseBody {
    rx: Receiver<Event>,
    chunk: Vec<u8>,
    pos: usize,
    finished: bool,
    cancel: CancelToken,
    released: Arc<AtomicBool>,
}

impl ResponseBody {
    fn recv(&self) -> Result<Event, FetchError> {
        loop {
            match self.rx.recv_timeout(CANCEL_POLL) {
                Ok(event) => return Ok(event),
                Err(RecvTimeoutError::Timeout) => {
                    if self.cancel.is_cancelled() {
                        return Err(FetchError::Cancelled);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(FetchError::network(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "transfer ended without completing the response",
                    )));
                }
            }
        }
    }

    /// First event is the head, or the error that prevented one.
    fn wait_for_head(&mut self) -> Result<ResponseHead, FetchError> {
        match self.recv()? {
            Event::Head(head) => Ok(head),
            Event::Failed(err) => Err(err),
            Event::Data(_) | Event::Done => Err(FetchError::network(io::Error::new(
                io::ErrorKind::InvalidData,
                "response body arrived before its head",
            ))),
        }
    }
}

impl Read for ResponseBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pos < self.chunk.len() {
                let n = buf.len().min(self.chunk.len() - self.pos);
                buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.finished || buf.is_empty() {
                return Ok(0);
            }
            match self.recv() {
                Ok(Event::Data(data)) => {
                    self.chunk = data;
                    self.pos = 0;
                }
                Ok(Event::Done) => self.finished = true,
                Ok(Event::Head(_)) => {}
                Ok(Event::Failed(err)) | Err(err) => {
                    self.finished = true;
                    return Err(io::Error::other(err));
                }
            }
        }
    }
}

impl Drop for ResponseBody {
    fn drop(&mut self) {
        self.released.store(true, Ordering::Relaxed);
    }
}
