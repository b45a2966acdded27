use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client as HttpClient;

use crate::error::{Error, Result};
use crate::util::guess_filename_from_url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub timeout: Duration,
    /// Show a progress bar on stderr when the size is known.
    pub progress: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            progress: false,
        }
    }
}

impl DownloadOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }
}

/// Downloads a pre-signed asset URL to `destination`.
///
/// An empty `destination` falls back to the last path segment of the URL.
/// Parent directories are created as needed.
pub fn download_file(url: &str, destination: &Path, options: &DownloadOptions) -> Result<PathBuf> {
    let target = if destination.as_os_str().is_empty() {
        guess_filename_from_url(url)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("download"))
    } else {
        destination.to_path_buf()
    };

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let failed = |e: &dyn std::fmt::Display| {
        tracing::debug!(url, error = %e, "download failed");
        Error::Download("Failed to download file".to_string())
    };

    let http = HttpClient::builder()
        .timeout(options.timeout)
        .build()
        .map_err(|e| failed(&e))?;

    let mut resp = http
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| failed(&e))?;

    let pb = match resp.content_length() {
        Some(len) if options.progress => {
            let pb = ProgressBar::new(len);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} {bytes}/{total_bytes} ({bytes_per_sec}) {wide_bar} {eta}",
            ) {
                pb.set_style(style.progress_chars("=>-"));
            }
            Some(pb)
        }
        _ => None,
    };

    let mut out = BufWriter::new(File::create(&target)?);
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = match resp.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => return Err(failed(&e)),
        };

        out.write_all(&buf[..n])?;
        if let Some(pb) = &pb {
            pb.inc(n as u64);
        }
    }
    out.flush()?;

    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    tracing::debug!(url, path = %target.display(), "downloaded file");
    Ok(target)
}
