//! Adaptive chunk-sizing configuration (spec.md §9: "expose them as
//! configuration rather than compile-time constants").

/// The chunk size a freshly constructed [`crate::Pipe`] starts with, and
/// the floor its adaptive sizing never shrinks below.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Number of consecutive low fills (`n < chunk.cap() / 2`) tolerated
/// before `current_size` is halved.
const DEFAULT_LOW_FILL_THRESHOLD: u32 = 10;

/// Parameters governing a [`crate::Pipe`]'s adaptive chunk-sizing policy
/// (spec.md §4.3 "Adaptive sizing").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeConfig {
    /// The initial and minimum `current_size`. Must be a power of two.
    pub minimum_size: usize,
    /// An upper bound `current_size` never grows past, however many
    /// consecutive full fills are observed. `None` means unbounded.
    pub size_ceiling: Option<usize>,
    /// How many consecutive low fills are tolerated before shrinking
    /// `current_size`.
    pub low_fill_threshold: u32,
}

impl Default for PipeConfig {
    fn default() -> Self {
        PipeConfig {
            minimum_size: DEFAULT_CHUNK_SIZE,
            size_ceiling: None,
            low_fill_threshold: DEFAULT_LOW_FILL_THRESHOLD,
        }
    }
}

impl PipeConfig {
    /// A config fixed to `minimum_size`, useful for tests that want
    /// predictable, non-adaptive chunk sizes.
    pub fn fixed_size(size: usize) -> Self {
        PipeConfig {
            minimum_size: size,
            size_ceiling: Some(size),
            low_fill_threshold: DEFAULT_LOW_FILL_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_historical_constants() {
        let cfg = PipeConfig::default();
        assert_eq!(cfg.minimum_size, 2048);
        assert_eq!(cfg.low_fill_threshold, 10);
        assert_eq!(cfg.size_ceiling, None);
    }
}
