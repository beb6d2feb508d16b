//! Loader telemetry and human-readable size formatting

/// Snapshot of loader activity since construction
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct LoaderStats {
    /// Requests answered from the durable store
    pub hits: u64,
    /// Requests that went to the network
    pub misses: u64,
    /// Bytes downloaded over the network
    pub bytes_fetched: u64,
    /// Bytes served from the store
    pub bytes_served_from_cache: u64,
}

impl LoaderStats {
    /// Total requests observed
    pub fn requests(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of requests answered from cache (0.0 when idle)
    pub fn hit_rate(&self) -> f32 {
        let total = self.requests();
        if total == 0 {
            return 0.0;
        }
        self.hits as f32 / total as f32
    }
}

/// Format a byte count for display: "512 B", "1.5 KiB", "20.1 MiB"
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_size_bytes() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(1023), "1023 B");
    }

    #[test]
    fn test_human_size_kib() {
        assert_eq!(human_size(1024), "1.0 KiB");
        assert_eq!(human_size(1536), "1.5 KiB");
        assert_eq!(human_size(100 * 1024), "100.0 KiB");
    }

    #[test]
    fn test_human_size_mib_and_up() {
        assert_eq!(human_size(1024 * 1024), "1.0 MiB");
        assert_eq!(human_size(20 * 1024 * 1024 + 100 * 1024), "20.1 MiB");
        assert_eq!(human_size(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }

    #[test]
    fn test_hit_rate() {
        let idle = LoaderStats::default();
        assert_eq!(idle.hit_rate(), 0.0);

        let stats = LoaderStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(stats.requests(), 4);
        assert!((stats.hit_rate() - 0.75).abs() < 1e-6);
    }
}
