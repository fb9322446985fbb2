//! Token usage accounting for a run.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::TokenUsage;

/// Accumulated LLM usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub total_tokens: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub llm_calls: u32,
    /// Estimated cost in USD.
    pub estimated_cost: f64,
}

impl LlmUsage {
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.llm_calls += 1;
        self.estimated_cost += Self::estimate_cost(usage, model);
    }

    fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
        // USD per million tokens
        let (input_rate, output_rate) = match model {
            m if m.contains("gpt-4o-mini") => (0.15, 0.6),
            m if m.contains("gpt-4o") => (2.5, 10.0),
            m if m.contains("gpt-4") => (30.0, 60.0),
            _ => (2.5, 10.0),
        };
        (usage.prompt_tokens as f64 / 1_000_000.0) * input_rate
            + (usage.completion_tokens as f64 / 1_000_000.0) * output_rate
    }
}

/// Thread-safe usage accumulator shared by every stage in a run.
#[derive(Debug, Default)]
pub struct UsageTracker {
    usage: RwLock<LlmUsage>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, usage: &TokenUsage, model: &str) {
        self.usage.write().add(usage, model);
    }

    pub fn snapshot(&self) -> LlmUsage {
        self.usage.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_add_accumulates() {
        let mut usage = LlmUsage::default();
        let call = TokenUsage {
            prompt_tokens: 1_000_000,
            completion_tokens: 100_000,
        };
        usage.add(&call, "gpt-4o");
        usage.add(&call, "gpt-4o");

        assert_eq!(usage.llm_calls, 2);
        assert_eq!(usage.total_tokens, 2_200_000);
        assert!((usage.estimated_cost - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_tracker_is_shared_across_threads() {
        let tracker = Arc::new(UsageTracker::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        tracker.record(
                            &TokenUsage {
                                prompt_tokens: 10,
                                completion_tokens: 5,
                            },
                            "gpt-4o",
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let usage = tracker.snapshot();
        assert_eq!(usage.llm_calls, 40);
        assert_eq!(usage.total_tokens, 600);
    }
}
