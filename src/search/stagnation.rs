//! Stall detection with an adaptive threshold for the directed fallback.

use crate::schema::{SearchMode, StagnationConfig};

/// Two-mode state machine deciding when the directed generator runs.
///
/// The stall counter grows by one per evolutionary generation that leaves the
/// coverage proxy unchanged. Once it exceeds the threshold the next generation
/// is directed. A directed generation that does not improve the proxy doubles
/// the threshold.
#[derive(Debug, Clone)]
pub struct StagnationController {
    enabled: bool,
    stall: usize,
    threshold: usize,
    mode: SearchMode,
    directed_rounds: usize,
    improving_rounds: usize,
}

impl StagnationController {
    pub fn new(config: &StagnationConfig) -> Self {
        Self {
            enabled: config.enabled,
            stall: 0,
            threshold: config.initial_stall_threshold,
            mode: SearchMode::Evolutionary,
            directed_rounds: 0,
            improving_rounds: 0,
        }
    }

    /// A controller that never leaves evolutionary mode.
    pub fn disabled(config: &StagnationConfig) -> Self {
        Self {
            enabled: false,
            ..Self::new(config)
        }
    }

    /// Decide the mode of the generation about to run.
    ///
    /// Entering directed mode resets the stall counter and counts a round.
    pub fn begin_generation(&mut self) -> SearchMode {
        self.mode = if self.enabled && self.stall > self.threshold {
            self.stall = 0;
            self.directed_rounds += 1;
            SearchMode::Directed
        } else {
            SearchMode::Evolutionary
        };
        self.mode
    }

    /// Book-keep the coverage proxy measured around the generation.
    pub fn end_generation(&mut self, before: usize, after: usize) {
        let improved = after > before;
        let directed = self.mode == SearchMode::Directed;

        if directed && improved {
            self.improving_rounds += 1;
        }

        if improved {
            self.stall = 0;
        } else if directed {
            self.threshold = self.threshold.saturating_mul(2);
        } else {
            self.stall += 1;
        }
    }

    /// Mode of the last generation.
    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn stall_count(&self) -> usize {
        self.stall
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn directed_rounds(&self) -> usize {
        self.directed_rounds
    }

    pub fn improving_rounds(&self) -> usize {
        self.improving_rounds
    }
}
