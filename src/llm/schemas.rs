//! Response schemas for structured LLM output.
//!
//! Each type carries both the serde shape and a JSON-schema document the
//! transport forwards to the model server. Validation beyond shape (value
//! ranges, non-empty lists) runs locally after parsing; a failure counts
//! against the retry budget like any other malformed response.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Post-parse validation. A schema type's invariants that JSON shape alone
/// cannot express.
pub trait SchemaValidated {
    fn validate(&self) -> Result<(), String>;
}

/// One operator suggestion produced for a no-change impasse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorSuggestion {
    /// Operator kind, e.g. `read_file`.
    pub name: String,
    /// Operator-specific parameters, e.g. `{"path": "main.py"}`.
    #[serde(default)]
    pub parameters: Value,
    pub reasoning: String,
}

/// Response schema for the no-change impasse prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorProposal {
    pub operators: Vec<OperatorSuggestion>,
    #[serde(default)]
    pub reasoning: String,
}

impl SchemaValidated for OperatorProposal {
    fn validate(&self) -> Result<(), String> {
        if self.operators.is_empty() {
            return Err("operators must contain at least one suggestion".to_string());
        }
        if self.operators.len() > 5 {
            return Err(format!(
                "operators must contain at most 5 suggestions, got {}",
                self.operators.len()
            ));
        }
        Ok(())
    }
}

pub fn operator_proposal_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "operators": {
                "type": "array",
                "minItems": 1,
                "maxItems": 5,
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "parameters": { "type": "object" },
                        "reasoning": { "type": "string" }
                    },
                    "required": ["name", "parameters", "reasoning"]
                }
            },
            "reasoning": { "type": "string" }
        },
        "required": ["operators", "reasoning"]
    })
}

/// P/C estimate for a single candidate operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilityEstimate {
    pub operator_name: String,
    /// Probability this operator advances the goal, in [0, 1].
    pub probability_of_success: f64,
    /// Effort on a 1-10 scale.
    pub estimated_cost: f64,
    pub reasoning: String,
}

/// Response schema for the utility-evaluation prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilityEvaluation {
    pub evaluations: Vec<UtilityEstimate>,
    #[serde(default)]
    pub recommendation: String,
}

impl SchemaValidated for UtilityEvaluation {
    fn validate(&self) -> Result<(), String> {
        if self.evaluations.is_empty() {
            return Err("evaluations must not be empty".to_string());
        }
        for estimate in &self.evaluations {
            if !(0.0..=1.0).contains(&estimate.probability_of_success) {
                return Err(format!(
                    "probability_of_success out of range for {}: {}",
                    estimate.operator_name, estimate.probability_of_success
                ));
            }
            if !(1.0..=10.0).contains(&estimate.estimated_cost) {
                return Err(format!(
                    "estimated_cost out of range for {}: {}",
                    estimate.operator_name, estimate.estimated_cost
                ));
            }
        }
        Ok(())
    }
}

pub fn utility_evaluation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "evaluations": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "properties": {
                        "operator_name": { "type": "string" },
                        "probability_of_success": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                        "estimated_cost": { "type": "number", "minimum": 1.0, "maximum": 10.0 },
                        "reasoning": { "type": "string" }
                    },
                    "required": ["operator_name", "probability_of_success", "estimated_cost", "reasoning"]
                }
            },
            "recommendation": { "type": "string" }
        },
        "required": ["evaluations", "recommendation"]
    })
}

/// A candidate code patch in the evolutionary search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeCandidate {
    /// What this patch believes the defect is.
    pub hypothesis: String,
    /// Complete replacement source.
    pub code_patch: String,
    #[serde(default)]
    pub reasoning: String,
}

impl SchemaValidated for CodeCandidate {
    fn validate(&self) -> Result<(), String> {
        if self.code_patch.trim().is_empty() {
            return Err("code_patch must not be empty".to_string());
        }
        Ok(())
    }
}

pub fn code_candidate_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "hypothesis": { "type": "string" },
            "code_patch": { "type": "string" },
            "reasoning": { "type": "string" }
        },
        "required": ["hypothesis", "code_patch", "reasoning"]
    })
}

/// A generation's worth of candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationProposal {
    pub candidates: Vec<CodeCandidate>,
    #[serde(default)]
    pub reasoning: String,
}

impl SchemaValidated for PopulationProposal {
    fn validate(&self) -> Result<(), String> {
        if self.candidates.is_empty() {
            return Err("candidates must not be empty".to_string());
        }
        for candidate in &self.candidates {
            candidate.validate()?;
        }
        Ok(())
    }
}

pub fn population_proposal_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "candidates": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "properties": {
                        "hypothesis": { "type": "string" },
                        "code_patch": { "type": "string" },
                        "reasoning": { "type": "string" }
                    },
                    "required": ["hypothesis", "code_patch", "reasoning"]
                }
            },
            "reasoning": { "type": "string" }
        },
        "required": ["candidates"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utility_estimates_outside_ranges_fail_validation() {
        let eval = UtilityEvaluation {
            evaluations: vec![UtilityEstimate {
                operator_name: "read_file(a.py)".to_string(),
                probability_of_success: 1.5,
                estimated_cost: 2.0,
                reasoning: String::new(),
            }],
            recommendation: String::new(),
        };
        assert!(eval.validate().is_err());

        let eval = UtilityEvaluation {
            evaluations: vec![UtilityEstimate {
                operator_name: "read_file(a.py)".to_string(),
                probability_of_success: 0.9,
                estimated_cost: 0.5,
                reasoning: String::new(),
            }],
            recommendation: String::new(),
        };
        assert!(eval.validate().is_err());
    }

    #[test]
    fn empty_collections_fail_validation() {
        let proposal = OperatorProposal {
            operators: vec![],
            reasoning: String::new(),
        };
        assert!(proposal.validate().is_err());

        let population = PopulationProposal {
            candidates: vec![],
            reasoning: String::new(),
        };
        assert!(population.validate().is_err());
    }

    #[test]
    fn schema_documents_are_well_formed_objects() {
        for schema in [
            operator_proposal_schema(),
            utility_evaluation_schema(),
            code_candidate_schema(),
            population_proposal_schema(),
        ] {
            assert_eq!(schema["type"], "object");
            assert!(schema["required"].is_array());
        }
    }

    #[test]
    fn utility_evaluation_round_trips_through_json() {
        let text = r#"{
            "evaluations": [
                {"operator_name": "read_file(a.py)", "probability_of_success": 0.9,
                 "estimated_cost": 2.0, "reasoning": "cheap and informative"}
            ],
            "recommendation": "read_file(a.py)"
        }"#;
        let eval: UtilityEvaluation = serde_json::from_str(text).unwrap();
        assert!(eval.validate().is_ok());
        assert_eq!(eval.evaluations[0].operator_name, "read_file(a.py)");
    }
}
