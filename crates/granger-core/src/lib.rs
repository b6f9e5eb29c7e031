pub mod config;
pub mod logging;

pub mod control;
pub mod downloader;
pub mod error;
pub mod fragment;
pub mod http;
pub mod ordered;
pub mod segmenter;
pub mod semaphore;
pub mod sink;
pub mod storage;

pub use control::CancelToken;
pub use downloader::{Completed, DownloadOptions, Downloader, ProgressStats};
pub use error::FetchError;
pub use http::{CurlClient, HttpClient};
pub use ordered::{OrderedJobProcessor, ProcessorError};
pub use sink::{ByteSink, SinkKind};
