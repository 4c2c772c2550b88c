//! Token telemetry folding: noise filtering, duplicate suppression, totals.
//!
//! The agent stream re-emits identical usage payloads and interleaves
//! zero-valued keepalive events. Everything that logs or aggregates tokens
//! consumes the folded stream produced here, never the raw one.

use serde::{Deserialize, Serialize};

/// Suppression window: an event identical in all three counters to the
/// previously emitted one and arriving within this window is a re-emission,
/// not new usage.
pub const DEDUP_WINDOW_MS: u64 = 100;

/// One usage report from the agent stream.
///
/// `at_ms` is milliseconds since session start, stamped at arrival time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEvent {
    pub input: u64,
    pub output: u64,
    pub reasoning: u64,
    pub at_ms: u64,
}

impl TokenEvent {
    pub fn is_zero(&self) -> bool {
        self.input == 0 && self.output == 0 && self.reasoning == 0
    }

    fn counters(&self) -> (u64, u64, u64) {
        (self.input, self.output, self.reasoning)
    }
}

/// Cumulative token counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenTotals {
    pub input: u64,
    pub output: u64,
    pub reasoning: u64,
}

impl TokenTotals {
    pub fn total(&self) -> u64 {
        self.input
            .saturating_add(self.output)
            .saturating_add(self.reasoning)
    }

    pub fn add(&mut self, other: TokenTotals) {
        self.input = self.input.saturating_add(other.input);
        self.output = self.output.saturating_add(other.output);
        self.reasoning = self.reasoning.saturating_add(other.reasoning);
    }

    fn add_event(&mut self, event: &TokenEvent) {
        self.input = self.input.saturating_add(event.input);
        self.output = self.output.saturating_add(event.output);
        self.reasoning = self.reasoning.saturating_add(event.reasoning);
    }
}

/// Per-session fold over the raw event stream.
///
/// State must not outlive one session: a fresh value is constructed for every
/// session so the "last emitted" reference never leaks across sessions.
#[derive(Debug, Default)]
pub struct TokenDedup {
    last_emitted: Option<TokenEvent>,
    totals: TokenTotals,
}

impl TokenDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one raw event. Returns the event if it was emitted, `None` if it
    /// was dropped as noise or as a duplicate.
    ///
    /// Totals advance only for emitted events. Duplicate comparison is against
    /// the previously *emitted* event, so a run of duplicates collapses to the
    /// first occurrence.
    pub fn push(&mut self, event: TokenEvent) -> Option<TokenEvent> {
        if event.is_zero() {
            return None;
        }
        if let Some(prev) = &self.last_emitted
            && prev.counters() == event.counters()
            && event.at_ms.saturating_sub(prev.at_ms) < DEDUP_WINDOW_MS
        {
            return None;
        }
        self.totals.add_event(&event);
        self.last_emitted = Some(event);
        Some(event)
    }

    pub fn totals(&self) -> TokenTotals {
        self.totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(input: u64, output: u64, at_ms: u64) -> TokenEvent {
        TokenEvent {
            input,
            output,
            reasoning: 0,
            at_ms,
        }
    }

    #[test]
    fn duplicate_within_window_is_dropped() {
        let mut fold = TokenDedup::new();
        assert!(fold.push(event(5, 10, 0)).is_some());
        assert!(fold.push(event(5, 10, 50)).is_none());

        let totals = fold.totals();
        assert_eq!((totals.input, totals.output), (5, 10));
    }

    #[test]
    fn duplicate_outside_window_is_emitted() {
        let mut fold = TokenDedup::new();
        assert!(fold.push(event(5, 10, 0)).is_some());
        assert!(fold.push(event(5, 10, 100)).is_some());

        let totals = fold.totals();
        assert_eq!((totals.input, totals.output), (10, 20));
    }

    #[test]
    fn zero_event_never_emitted_and_never_counted() {
        let mut fold = TokenDedup::new();
        assert!(fold.push(event(0, 0, 0)).is_none());
        assert!(fold.push(event(5, 10, 10)).is_some());

        let totals = fold.totals();
        assert_eq!((totals.input, totals.output), (5, 10));
    }

    #[test]
    fn zero_event_does_not_reset_duplicate_reference() {
        let mut fold = TokenDedup::new();
        assert!(fold.push(event(5, 10, 0)).is_some());
        assert!(fold.push(event(0, 0, 20)).is_none());
        // Still a duplicate of the last *emitted* event.
        assert!(fold.push(event(5, 10, 40)).is_none());
        assert_eq!(fold.totals().total(), 15);
    }

    #[test]
    fn window_measured_from_last_emitted_not_last_seen() {
        let mut fold = TokenDedup::new();
        assert!(fold.push(event(5, 10, 0)).is_some());
        assert!(fold.push(event(5, 10, 50)).is_none());
        // 120ms after the emitted event, so it counts again.
        assert!(fold.push(event(5, 10, 120)).is_some());
        assert_eq!(fold.totals().total(), 30);
    }

    #[test]
    fn differing_counters_are_never_duplicates() {
        let mut fold = TokenDedup::new();
        assert!(fold.push(event(5, 10, 0)).is_some());
        assert!(fold.push(event(5, 11, 1)).is_some());
        assert_eq!(fold.totals().output, 21);
    }
}
