use std::process::Command;
use tracing::info;

use crate::application::ports::StreamResolverPort;
use crate::domain::errors::{DomainError, DomainResult};

/// Resuelve URLs de YouTube a un stream reproducible con `yt-dlp -g`.
pub struct YtDlpResolver {
    binary: String,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

fn validate_url(url: &str) -> DomainResult<&str> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| DomainError::SourceUnavailable(format!("not a web URL: '{url}'")))?;
    if rest.is_empty() || rest.contains(char::is_whitespace) {
        return Err(DomainError::SourceUnavailable(format!("not a web URL: '{url}'")));
    }
    Ok(url)
}

impl StreamResolverPort for YtDlpResolver {
    fn resolve(&self, url: &str) -> DomainResult<String> {
        let url = validate_url(url)?;
        let output = Command::new(&self.binary)
            .args(["-f", "best[ext=mp4]/best", "-g", "--no-warnings", url])
            .output()
            .map_err(|e| DomainError::SourceUnavailable(format!("cannot start {}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().last().unwrap_or("stream could not be resolved").trim();
            return Err(DomainError::SourceUnavailable(format!("{url}: {detail}")));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stream = stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| DomainError::SourceUnavailable(format!("{url}: no playable stream")))?;
        info!("📺 Stream resuelto para {}", url);
        Ok(stream.to_string())
    }
}
