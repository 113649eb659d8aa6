//! Preview URIs for the currently effective file.
//!
//! At most one URI is live at any time. Issuing a new one revokes the old one
//! first, so a stale preview can never be resolved after a re-selection.

use std::sync::Arc;

pub const URI_SCHEME: &str = "blob:upload-prep/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub uri: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

#[derive(Debug, Default)]
pub struct PreviewRegistry {
    current: Option<Preview>,
    next_id: u64,
    revoked: u64,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `bytes` as the preview, revoking any previous URI.
    pub fn show(&mut self, bytes: Arc<[u8]>, mime: &str) -> &Preview {
        self.revoke();
        self.next_id += 1;
        self.current.insert(Preview {
            uri: format!("{URI_SCHEME}{}", self.next_id),
            mime: mime.to_string(),
            bytes,
        })
    }

    /// Revoke the live URI, if any.
    pub fn revoke(&mut self) {
        if let Some(old) = self.current.take() {
            log::trace!("revoked preview {}", old.uri);
            self.revoked += 1;
        }
    }

    pub fn current(&self) -> Option<&Preview> {
        self.current.as_ref()
    }

    /// Look up a URI. Revoked URIs resolve to nothing.
    pub fn resolve(&self, uri: &str) -> Option<&Preview> {
        self.current.as_ref().filter(|p| p.uri == uri)
    }

    /// URIs issued and not yet revoked. Never more than one.
    pub fn live_count(&self) -> u64 {
        self.next_id - self.revoked
    }
}
