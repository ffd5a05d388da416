//! Delivery channels for the pairing callback URL

use std::sync::Mutex;

use anyhow::{Context, Result};

/// Hands a callback URL to the desktop client
///
/// Delivery is fire-and-forget: success means the hand-off was attempted,
/// not that the desktop client received anything.
pub trait DeliveryChannel: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}

type Launcher = fn(&str) -> std::io::Result<()>;

/// Opens the URL with the operating system's default handler
#[derive(Clone, Copy)]
pub struct SystemUriOpener {
    launch: Launcher,
}

impl SystemUriOpener {
    pub fn new() -> Self {
        Self {
            launch: |url| open::that_detached(url),
        }
    }
}

impl Default for SystemUriOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryChannel for SystemUriOpener {
    fn open(&self, url: &str) -> Result<()> {
        (self.launch)(url).context("Failed to launch URI handler")
    }
}

/// Keeps the last URL it was asked to open
#[derive(Debug, Default)]
pub struct RecordingChannel {
    last: Mutex<Option<String>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_url(&self) -> Option<String> {
        self.last.lock().ok().and_then(|guard| guard.clone())
    }
}

impl DeliveryChannel for RecordingChannel {
    fn open(&self, url: &str) -> Result<()> {
        let mut guard = self
            .last
            .lock()
            .map_err(|_| anyhow::anyhow!("Recording channel lock poisoned"))?;
        *guard = Some(url.to_string());
        Ok(())
    }
}
