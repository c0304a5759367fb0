//! Materialization of inlined attachments.
//!
//! Captured images arrive as `data:<mime>;base64,<payload>` URLs because the
//! page's `blob:` references die with the page. Before a batch is stored
//! locally each payload is written to the media directory and the message's
//! media reference is rewritten to the served path.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use chatvault_core::{CapturedMessage, Error, Result};

static DATA_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:([A-Za-z0-9\-+./]+);base64,(.+)$").unwrap());

/// URL prefix under which the media directory is served.
pub const MEDIA_URL_PREFIX: &str = "/media";

/// Writes attachment payloads into the media directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decode a `data:` URL and write it as `img_<millis>_<rand>.<ext>`.
    /// Returns the served path, e.g. `/media/img_1700000000000_a1b2c3d4.jpeg`.
    pub fn save_data_url(&self, data_url: &str) -> Result<String> {
        let caps = DATA_URL_RE
            .captures(data_url.trim())
            .ok_or_else(|| Error::Storage("not a base64 data URL".into()))?;
        let ext = extension_for(&caps[1]);
        let bytes = STANDARD
            .decode(caps[2].trim())
            .map_err(|e| Error::Storage(format!("invalid base64 payload: {}", e)))?;

        std::fs::create_dir_all(&self.dir)?;
        let rand = uuid::Uuid::new_v4().simple().to_string();
        let filename = format!(
            "img_{}_{}.{}",
            chrono::Utc::now().timestamp_millis(),
            &rand[..8],
            ext
        );
        std::fs::write(self.dir.join(&filename), &bytes)?;
        debug!("Saved attachment {} ({} bytes)", filename, bytes.len());
        Ok(format!("{}/{}", MEDIA_URL_PREFIX, filename))
    }

    /// Replace an inlined payload with a served media reference.
    ///
    /// The payload is always dropped. A `blob:` reference that could not be
    /// materialized is cleared so a later successful capture can still win
    /// the media merge.
    pub fn materialize(&self, msg: &mut CapturedMessage) {
        if let Some(data) = msg.media_data.take().filter(|d| !d.is_empty()) {
            match self.save_data_url(&data) {
                Ok(url) => msg.media_ref = Some(url),
                Err(e) => warn!("Failed to save attachment: {}", e),
            }
        }
        if msg.media().is_some_and(|m| m.starts_with("blob:")) {
            msg.media_ref = None;
        }
    }

    /// Materialize every message of a batch. Returns the number of files written.
    pub fn materialize_all(&self, messages: &mut [CapturedMessage]) -> usize {
        let mut written = 0;
        for msg in messages.iter_mut() {
            let had_payload = msg.has_inline_media();
            self.materialize(msg);
            if had_payload && msg.media().is_some() {
                written += 1;
            }
        }
        written
    }
}

/// File extension for a MIME type: the subtype up to any `+` suffix.
fn extension_for(mime: &str) -> String {
    let ext: String = mime
        .split('/')
        .nth(1)
        .unwrap_or("")
        .split('+')
        .next()
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    if ext.is_empty() {
        "jpg".into()
    } else {
        ext
    }
}
