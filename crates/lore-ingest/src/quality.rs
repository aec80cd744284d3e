//! Content quality gate applied before anything reaches the index.

/// Rejects text that is too short or dominated by ASCII punctuation and symbols.
#[derive(Debug, Clone)]
pub struct QualityFilter {
    min_content_length: usize,
    max_noise_ratio: f64,
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self::new(0, 1.0)
    }
}

impl QualityFilter {
    pub fn new(min_content_length: usize, max_noise_ratio: f64) -> Self {
        Self {
            min_content_length,
            max_noise_ratio,
        }
    }

    pub fn from_config(config: &lore_config::QualityConfig) -> Self {
        Self::new(config.min_content_length, config.max_noise_ratio)
    }

    /// Whether `text` is worth indexing.
    ///
    /// Lengths are counted in characters after trimming. Empty text never
    /// passes, whatever the configured minimum.
    pub fn is_high_quality(&self, text: Option<&str>) -> bool {
        let Some(text) = text else {
            return false;
        };
        let trimmed = text.trim();
        let length = trimmed.chars().count();
        if length < self.min_content_length || length == 0 {
            return false;
        }

        self.noise_ratio(trimmed) <= self.max_noise_ratio
    }

    /// Share of characters that are ASCII but neither alphanumeric nor whitespace.
    fn noise_ratio(&self, trimmed: &str) -> f64 {
        let mut total = 0usize;
        let mut noise = 0usize;
        for c in trimmed.chars() {
            total += 1;
            if !c.is_alphanumeric() && !c.is_whitespace() && (c as u32) < 128 {
                noise += 1;
            }
        }
        if total == 0 {
            return 0.0;
        }
        noise as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_accept_any_non_empty_text() {
        let filter = QualityFilter::default();
        assert!(filter.is_high_quality(Some("a")));
        assert!(filter.is_high_quality(Some("#### ---- ####")));
        assert!(!filter.is_high_quality(None));
        assert!(!filter.is_high_quality(Some("   \n\t ")));
    }

    #[test]
    fn test_min_length_boundary() {
        let filter = QualityFilter::new(10, 1.0);
        assert!(filter.is_high_quality(Some("abcdefghij")));
        assert!(!filter.is_high_quality(Some("abcdefghi")));
        // Surrounding whitespace does not count.
        assert!(!filter.is_high_quality(Some("   abcdefghi   ")));
    }

    #[test]
    fn test_min_length_counts_characters() {
        let filter = QualityFilter::new(4, 1.0);
        assert!(filter.is_high_quality(Some("日本語だ")));
        assert!(!filter.is_high_quality(Some("日本語")));
    }

    #[test]
    fn test_noise_ratio() {
        let filter = QualityFilter::new(0, 0.5);
        // 4 noise chars out of 8.
        assert!(filter.is_high_quality(Some("ab{}cd[]")));
        // 5 noise chars out of 8.
        assert!(!filter.is_high_quality(Some("ab{}c$[]")));
    }

    #[test]
    fn test_non_ascii_symbols_are_not_noise() {
        let filter = QualityFilter::new(0, 0.0);
        assert!(filter.is_high_quality(Some("── ·· ──")));
        assert!(!filter.is_high_quality(Some("hello!")));
    }
}
