//! Immutable engine configuration.
//!
//! Loaded once at startup (see `infrastructure::config`) and injected into
//! the agent's constructor. Values outside their valid range are clamped by
//! [`Config::normalized`].

use serde::{Deserialize, Serialize};

/// Bounds for the evolutionary solver knobs.
const POPULATION_RANGE: (u32, u32) = (2, 10);
const GENERATION_RANGE: (u32, u32) = (1, 10);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model identifier sent to the LLM transport.
    pub llm_model: String,
    /// Transport base URL.
    pub llm_host: String,
    /// Default sampling temperature (0-2).
    pub llm_temperature: f32,
    /// Attempts beyond the first on failure.
    pub llm_max_retries: u32,
    /// Per-attempt deadline, in seconds.
    pub llm_timeout: f64,

    /// `G` in the utility formula.
    pub actr_goal_value: f64,
    /// Standard deviation of the Gaussian noise term.
    pub actr_noise_stddev: f64,

    /// Sub-goal depth at which depth-pressure saturates.
    pub cognitive_depth_threshold: u32,
    /// Time in state at which time-pressure saturates, in milliseconds.
    pub cognitive_time_threshold_ms: f64,
    /// Hard ceiling on decision cycles per solve.
    pub cognitive_max_cycles: u32,
    /// Tabu penalty weight per prior application of an operator.
    pub cognitive_history_penalty_multiplier: f64,

    /// Toggles the evolutionary solver.
    pub evolution_enabled: bool,
    /// Population size `N`, clamped to [2, 10].
    pub evolution_population_size: u32,
    /// Generation ceiling `G`, clamped to [1, 10].
    pub evolution_max_generations: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_model: "qwen3:8b".to_string(),
            llm_host: "http://localhost:11434".to_string(),
            llm_temperature: 0.3,
            llm_max_retries: 2,
            llm_timeout: 5.0,
            actr_goal_value: 10.0,
            actr_noise_stddev: 0.5,
            cognitive_depth_threshold: 3,
            cognitive_time_threshold_ms: 500.0,
            cognitive_max_cycles: 100,
            cognitive_history_penalty_multiplier: 2.0,
            evolution_enabled: true,
            evolution_population_size: 3,
            evolution_max_generations: 3,
        }
    }
}

impl Config {
    /// Return a copy with out-of-range knobs clamped into their valid
    /// ranges. Applied on load, so the rest of the engine can trust the
    /// values.
    pub fn normalized(mut self) -> Self {
        self.evolution_population_size = self
            .evolution_population_size
            .clamp(POPULATION_RANGE.0, POPULATION_RANGE.1);
        self.evolution_max_generations = self
            .evolution_max_generations
            .clamp(GENERATION_RANGE.0, GENERATION_RANGE.1);
        self.llm_temperature = self.llm_temperature.clamp(0.0, 2.0);
        self.actr_noise_stddev = self.actr_noise_stddev.max(0.0);
        self
    }

    /// Structural validation; returns the offending field on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.llm_host.is_empty() {
            return Err("llm_host cannot be empty".to_string());
        }
        if self.llm_timeout <= 0.0 {
            return Err(format!("llm_timeout must be positive, got {}", self.llm_timeout));
        }
        if self.cognitive_max_cycles == 0 {
            return Err("cognitive_max_cycles must be at least 1".to_string());
        }
        if self.cognitive_depth_threshold == 0 {
            return Err("cognitive_depth_threshold must be at least 1".to_string());
        }
        if self.cognitive_time_threshold_ms <= 0.0 {
            return Err(format!(
                "cognitive_time_threshold_ms must be positive, got {}",
                self.cognitive_time_threshold_ms
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_size_is_clamped_irrespective_of_value() {
        let low = Config {
            evolution_population_size: 0,
            ..Config::default()
        }
        .normalized();
        assert_eq!(low.evolution_population_size, 2);

        let high = Config {
            evolution_population_size: 50,
            ..Config::default()
        }
        .normalized();
        assert_eq!(high.evolution_population_size, 10);
    }

    #[test]
    fn generations_are_clamped() {
        let cfg = Config {
            evolution_max_generations: 99,
            ..Config::default()
        }
        .normalized();
        assert_eq!(cfg.evolution_max_generations, 10);
    }

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let cfg = Config {
            llm_timeout: 0.0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
