//! Download progress reporting.

use std::fmt;

/// Progress of a single file transfer.
///
/// `total` is zero when the server did not announce a content length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Index of the file in the manifest's file list.
    pub file_index: usize,
    /// Bytes received so far.
    pub downloaded: u64,
    /// Total bytes to receive, or zero if unknown.
    pub total: u64,
}

impl DownloadProgress {
    /// Create a new progress instance.
    pub fn new(file_index: usize, downloaded: u64, total: u64) -> Self {
        Self {
            file_index,
            downloaded,
            total,
        }
    }

    /// Get download progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            ((self.downloaded as f64 / self.total as f64) * 100.0).min(100.0)
        }
    }

    /// Whole-number percentage, suitable for a progress bar.
    pub fn percent(&self) -> u8 {
        self.percentage().floor() as u8
    }

    /// Check if the download is complete.
    pub fn is_complete(&self) -> bool {
        self.downloaded >= self.total && self.total > 0
    }

    /// Get remaining bytes to download.
    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.downloaded)
    }
}

impl fmt::Display for DownloadProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total == 0 {
            write!(f, "{} downloaded", format_bytes(self.downloaded))
        } else {
            write!(
                f,
                "{} of {} ({}%)",
                format_bytes(self.downloaded),
                format_bytes(self.total),
                self.percent()
            )
        }
    }
}

/// Format a byte count with the largest fitting binary unit, one decimal.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match bytes {
        b if b < KB => format!("{} B", b),
        b if b < MB => format!("{:.1} KB", b as f64 / KB as f64),
        b if b < GB => format!("{:.1} MB", b as f64 / MB as f64),
        b => format!("{:.1} GB", b as f64 / GB as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        assert_eq!(DownloadProgress::new(0, 50, 200).percentage(), 25.0);
        assert_eq!(DownloadProgress::new(0, 199, 200).percent(), 99);
        assert_eq!(DownloadProgress::new(0, 10, 0).percentage(), 0.0);
        assert_eq!(DownloadProgress::new(0, 300, 200).percent(), 100);
    }

    #[test]
    fn test_is_complete() {
        assert!(DownloadProgress::new(0, 200, 200).is_complete());
        assert!(!DownloadProgress::new(0, 100, 200).is_complete());
        assert!(!DownloadProgress::new(0, 0, 0).is_complete());
        assert_eq!(DownloadProgress::new(0, 150, 200).remaining(), 50);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_display() {
        let progress = DownloadProgress::new(1, 1024, 2048);
        assert_eq!(progress.to_string(), "1.0 KB of 2.0 KB (50%)");

        let unknown = DownloadProgress::new(1, 100, 0);
        assert_eq!(unknown.to_string(), "100 B downloaded");
    }
}
