use std::fmt;
use std::time::{Duration, Instant};

/// Instants taken at the stage boundaries of one image.
#[derive(Debug, Clone, Copy)]
pub struct ProcessingTimestamps {
    start: Instant,
    loaded: Option<Instant>,
    uploaded: Option<Instant>,
    filtered: Option<Instant>,
    downloaded: Option<Instant>,
}

impl ProcessingTimestamps {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            loaded: None,
            uploaded: None,
            filtered: None,
            downloaded: None,
        }
    }

    pub fn mark_loaded(&mut self) {
        self.loaded = Some(Instant::now());
    }

    pub fn mark_uploaded(&mut self) {
        self.uploaded = Some(Instant::now());
    }

    pub fn mark_filtered(&mut self) {
        self.filtered = Some(Instant::now());
    }

    pub fn mark_downloaded(&mut self) {
        self.downloaded = Some(Instant::now());
    }

    /// Durations up to `written`, or `None` if the image never got past the device.
    pub fn finish(&self, written: Instant) -> Option<TimingReport> {
        let loaded = self.loaded?;
        let uploaded = self.uploaded?;
        let filtered = self.filtered?;
        let downloaded = self.downloaded?;

        Some(TimingReport {
            total: written.saturating_duration_since(self.start),
            load: loaded.saturating_duration_since(self.start),
            upload: uploaded.saturating_duration_since(loaded),
            kernel: filtered.saturating_duration_since(uploaded),
            download: downloaded.saturating_duration_since(filtered),
            write: written.saturating_duration_since(downloaded),
        })
    }
}

/// The five stage durations of one image plus their sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingReport {
    pub total: Duration,
    pub load: Duration,
    pub upload: Duration,
    pub kernel: Duration,
    pub download: Duration,
    pub write: Duration,
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Image processing took {} nanoseconds:",
            self.total.as_nanos()
        )?;
        writeln!(f, "  {} to load the image.", self.load.as_nanos())?;
        writeln!(f, "  {} to transfer it to the device.", self.upload.as_nanos())?;
        writeln!(f, "  {} to execute the kernel.", self.kernel.as_nanos())?;
        writeln!(
            f,
            "  {} to transfer it back to the host.",
            self.download.as_nanos()
        )?;
        write!(f, "  {} to write the image to disk.", self.write.as_nanos())
    }
}
