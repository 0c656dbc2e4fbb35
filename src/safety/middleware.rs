//! Gate between operator selection and execution.
//!
//! Decision order: dry-run, destructive gate, utility-threshold gate,
//! auto-approve for safe operators, then execution. Every decision is
//! counted; a denial comes back as an ordinary operator failure with
//! reason "denied" and the cycle continues.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::models::{EditorState, Operator, OperatorResult};
use crate::domain::ports::{ApprovalDecision, ApprovalHook, ApprovalRequest};

use super::hooks::AutoApproveHook;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Require approval for destructive operations.
    pub require_approval_for_destructive: bool,
    /// Require approval when the selection utility falls below this.
    pub approval_utility_threshold: Option<f64>,
    /// Execute non-destructive operators without asking.
    pub auto_approve_safe: bool,
    /// Simulate: report success without executing anything.
    pub dry_run: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            require_approval_for_destructive: true,
            approval_utility_threshold: Some(3.0),
            auto_approve_safe: true,
            dry_run: false,
        }
    }
}

/// Running counters over safety decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyStats {
    pub approved: u32,
    pub auto: u32,
    pub denied: u32,
    pub dry_run: u32,
}

pub struct SafetyMiddleware {
    config: SafetyConfig,
    hook: Arc<dyn ApprovalHook>,
    stats: Mutex<SafetyStats>,
}

impl Default for SafetyMiddleware {
    fn default() -> Self {
        Self::new(SafetyConfig::default(), Arc::new(AutoApproveHook))
    }
}

impl SafetyMiddleware {
    pub fn new(config: SafetyConfig, hook: Arc<dyn ApprovalHook>) -> Self {
        Self {
            config,
            hook,
            stats: Mutex::new(SafetyStats::default()),
        }
    }

    pub fn stats(&self) -> SafetyStats {
        *self.stats.lock().expect("stats lock")
    }

    pub fn set_dry_run(&mut self, enabled: bool) {
        self.config.dry_run = enabled;
    }

    /// Run `operator` through the gates and, when allowed, execute it.
    pub async fn execute_with_safety(
        &self,
        operator: &dyn Operator,
        state: &EditorState,
        utility: Option<f64>,
        reasoning: Option<&str>,
    ) -> OperatorResult {
        if self.config.dry_run {
            debug!(operator = operator.name(), "dry-run: not executing");
            self.bump(|s| s.dry_run += 1);
            return OperatorResult {
                success: true,
                new_state: Some(state.clone()),
                output: format!("Dry-run: {} (not actually executed)", operator.name()),
                error: None,
            };
        }

        let needs_approval = self.needs_approval(operator, utility);
        if needs_approval {
            let request = ApprovalRequest {
                operator_name: operator.name().to_string(),
                destructive: operator.is_destructive(),
                utility,
                reasoning: reasoning.map(str::to_string),
                working_directory: state.working_directory.clone(),
                recent_error: state.last_error().map(str::to_string),
            };
            info!(operator = operator.name(), "requesting approval");

            match self.hook.request_approval(&request).await {
                ApprovalDecision::Denied => {
                    info!(operator = operator.name(), "denied");
                    self.bump(|s| s.denied += 1);
                    return OperatorResult {
                        success: false,
                        new_state: Some(state.clone()),
                        output: String::new(),
                        error: Some("denied".to_string()),
                    };
                }
                ApprovalDecision::Approved => {
                    self.bump(|s| s.approved += 1);
                }
            }
        } else {
            self.bump(|s| s.auto += 1);
        }

        operator.execute(state).await
    }

    fn needs_approval(&self, operator: &dyn Operator, utility: Option<f64>) -> bool {
        if self.config.require_approval_for_destructive && operator.is_destructive() {
            return true;
        }
        if let (Some(threshold), Some(utility)) =
            (self.config.approval_utility_threshold, utility)
        {
            if utility < threshold {
                return true;
            }
        }
        if !operator.is_destructive() && self.config.auto_approve_safe {
            return false;
        }
        false
    }

    fn bump(&self, update: impl FnOnce(&mut SafetyStats)) {
        update(&mut self.stats.lock().expect("stats lock"));
    }
}
