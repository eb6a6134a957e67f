use crate::model::ModelCost;
use serde::{Deserialize, Serialize};

/// Token accounting for one generation. Absent counts default to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,

    #[serde(default)]
    pub output_tokens: u64,

    #[serde(default)]
    pub total_tokens: u64,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub reasoning_tokens: u64,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub cached_tokens: u64,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            reasoning_tokens: 0,
            cached_tokens: 0,
        }
    }

    /// Reported total, falling back to input + output.
    pub fn total(&self) -> u64 {
        if self.total_tokens > 0 {
            self.total_tokens
        } else {
            self.input_tokens + self.output_tokens
        }
    }

    /// Merge counts reported incrementally during a stream. Later non-zero
    /// values replace earlier ones; token counts are cumulative on the
    /// wire, not deltas.
    pub fn merge(&mut self, other: &Usage) {
        if other.input_tokens > 0 {
            self.input_tokens = other.input_tokens;
        }
        if other.output_tokens > 0 {
            self.output_tokens = other.output_tokens;
        }
        if other.total_tokens > 0 {
            self.total_tokens = other.total_tokens;
        }
        if other.reasoning_tokens > 0 {
            self.reasoning_tokens = other.reasoning_tokens;
        }
        if other.cached_tokens > 0 {
            self.cached_tokens = other.cached_tokens;
        }
    }

    /// Dollar cost of this usage under per-token prices.
    pub fn cost(&self, cost: &ModelCost) -> f64 {
        self.input_tokens as f64 * cost.input + self.output_tokens as f64 * cost.output
    }
}
