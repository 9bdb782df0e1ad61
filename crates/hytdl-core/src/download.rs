//! Streaming artifact download with progress reporting.
//!
//! Single GET, body appended to the destination file in 32 KiB chunks as it
//! arrives, so memory stays bounded regardless of artifact size. No ranges,
//! no resume.

use anyhow::{Context, Result};
use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::client::{self, AuthClient};

/// Body chunk size requested from libcurl.
const CHUNK_SIZE: usize = 32 * 1024;
/// Report granularity when the server does not declare a total size.
const UNKNOWN_SIZE_STEP: u64 = 1024 * 1024;

/// Progress event stream: renderers only hear about meaningful changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Integer percentage changed (total size known).
    Percent {
        percent: u32,
        downloaded: u64,
        total: u64,
    },
    /// Another [`UNKNOWN_SIZE_STEP`] transferred (total size unknown).
    Bytes { downloaded: u64 },
    /// Clean end of stream.
    Finished { downloaded: u64 },
}

/// Decides when a transfer position is worth reporting.
#[derive(Debug)]
pub struct ProgressTracker {
    total: Option<u64>,
    downloaded: u64,
    last_percent: u32,
    last_reported: u64,
}

impl ProgressTracker {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            total,
            downloaded: 0,
            last_percent: 0,
            last_reported: 0,
        }
    }

    /// Record `bytes` more transferred; Some when an update is due.
    pub fn advance(&mut self, bytes: u64) -> Option<Progress> {
        self.downloaded += bytes;
        match self.total {
            Some(total) if total > 0 => {
                let percent = (self.downloaded.min(total) * 100 / total) as u32;
                if percent != self.last_percent {
                    self.last_percent = percent;
                    return Some(Progress::Percent {
                        percent,
                        downloaded: self.downloaded,
                        total,
                    });
                }
                None
            }
            _ => {
                if self.downloaded - self.last_reported >= UNKNOWN_SIZE_STEP {
                    self.last_reported = self.downloaded;
                    return Some(Progress::Bytes {
                        downloaded: self.downloaded,
                    });
                }
                None
            }
        }
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded
    }

    pub fn finish(&self) -> Progress {
        Progress::Finished {
            downloaded: self.downloaded,
        }
    }
}

/// Download `url` to `dest`, streaming the body to disk and reporting
/// progress. Returns the number of bytes written. A non-success status is a
/// terminal error carrying the status text, and no body bytes are written
/// for it. On any other failure the bytes already written stay on disk;
/// cleanup is the caller's policy.
pub fn download(
    client: &AuthClient,
    url: &str,
    dest: &Path,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<u64> {
    let auth_header = client
        .auth_header()
        .context("could not obtain an access token")?;
    let file = File::create(dest)
        .with_context(|| format!("could not create file {}", dest.display()))?;

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.buffer_size(CHUNK_SIZE)?;
    easy.connect_timeout(Duration::from_secs(30))?;
    // A transfer crawling below 1 KiB/s for a minute is dead; there is no
    // whole-transfer timeout because artifact size is unbounded.
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;

    let mut headers = curl::easy::List::new();
    headers.append(&format!("Authorization: {}", auth_header))?;
    easy.http_headers(headers)?;

    let status = RefCell::new(String::new());
    let http_code = Cell::new(0u32);
    let content_length = Cell::new(None::<u64>);
    let write_error = RefCell::new(None::<std::io::Error>);
    let tracker = RefCell::new(None::<ProgressTracker>);

    let result = {
        let mut transfer = easy.transfer();
        transfer.header_function(|line| {
            if let Some(text) = client::parse_status_line(line) {
                // New response in the redirect chain; forget the old length.
                content_length.set(None);
                http_code.set(
                    text.split(' ')
                        .next()
                        .and_then(|code| code.parse().ok())
                        .unwrap_or(0),
                );
                *status.borrow_mut() = text;
            } else if let Some(length) = parse_content_length(line) {
                content_length.set(Some(length));
            }
            true
        })?;
        transfer.write_function(|data| {
            if !(200..300).contains(&http_code.get()) {
                // Never write an error page into the destination; the
                // status check after perform() reports it.
                return Ok(0);
            }
            let mut slot = tracker.borrow_mut();
            let tracker = slot.get_or_insert_with(|| ProgressTracker::new(content_length.get()));
            if let Err(err) = (&file).write_all(data) {
                *write_error.borrow_mut() = Some(err);
                return Ok(0); // abort transfer
            }
            if let Some(event) = tracker.advance(data.len() as u64) {
                on_progress(event);
            }
            Ok(data.len())
        })?;
        transfer.perform()
    };

    if let Some(err) = write_error.into_inner() {
        return Err(anyhow::Error::new(err)
            .context(format!("error writing to {}", dest.display())));
    }
    let code = http_code.get();
    if code != 0 && !(200..300).contains(&code) {
        anyhow::bail!("error downloading: HTTP status {}", status.into_inner());
    }
    result.context("error reading response")?;

    let tracker = tracker
        .into_inner()
        .unwrap_or_else(|| ProgressTracker::new(content_length.get()));
    let downloaded = tracker.downloaded();
    if let Some(total) = content_length.get() {
        if downloaded != total {
            anyhow::bail!("partial transfer: wrote {} of {} bytes", downloaded, total);
        }
    }
    on_progress(tracker.finish());
    Ok(downloaded)
}

fn parse_content_length(line: &[u8]) -> Option<u64> {
    let text = std::str::from_utf8(line).ok()?;
    let (name, value) = text.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse().ok()
}
