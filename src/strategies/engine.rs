//! Patch strategy engine
//!
//! For each error, strategies planned for its type run in order and the
//! first non-empty result wins. A failing strategy is logged and treated
//! as declined. The resulting patches are ordered by confidence, with
//! severity deciding between patches whose confidences sit within
//! [`CONFIDENCE_BAND`] of each other.

use crate::classifier::ErrorRecord;
use crate::strategies::registry::{StrategyContext, StrategyPlan, StrategyRegistry};
use crate::strategies::types::PatchCandidate;
use std::cmp::Ordering;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Confidence gap within which severity breaks the tie
pub const CONFIDENCE_BAND: f64 = 0.1;

const BAND_EPSILON: f64 = 1e-9;

/// Runs planned strategies against error records
#[derive(Debug, Clone)]
pub struct PatchStrategyEngine {
    plan: StrategyPlan,
    registry: StrategyRegistry,
    context: StrategyContext,
}

impl PatchStrategyEngine {
    pub fn new(plan: StrategyPlan, registry: StrategyRegistry, context: StrategyContext) -> Self {
        Self {
            plan,
            registry,
            context,
        }
    }

    /// Built-in plan, registry and correction tables for a project
    pub fn builtin(project_root: impl Into<PathBuf>) -> Self {
        Self::new(
            StrategyPlan::builtin(),
            StrategyRegistry::builtin(),
            StrategyContext::new(project_root),
        )
    }

    pub fn context(&self) -> &StrategyContext {
        &self.context
    }

    /// One patch per error at most, prioritized
    pub fn generate_patches(&self, errors: &[ErrorRecord]) -> Vec<PatchCandidate> {
        let patches: Vec<PatchCandidate> = errors
            .iter()
            .filter_map(|error| self.patch_for(error))
            .collect();

        debug!(
            errors = errors.len(),
            patches = patches.len(),
            "patch generation complete"
        );

        prioritize(patches)
    }

    /// First accepted patch for a single error
    pub fn patch_for(&self, error: &ErrorRecord) -> Option<PatchCandidate> {
        for id in self.plan.strategies_for(error.error_type) {
            let Some(strategy) = self.registry.get(*id) else {
                debug!(strategy = %id, "strategy not registered, skipping");
                continue;
            };

            match strategy(error, &self.context) {
                Ok(Some(patch)) => {
                    debug!(
                        strategy = %id,
                        confidence = patch.confidence,
                        file = error.file.as_deref().unwrap_or("-"),
                        "strategy produced patch"
                    );
                    return Some(patch);
                }
                Ok(None) => continue,
                Err(e) => {
                    warn!(
                        strategy = %id,
                        file = error.file.as_deref().unwrap_or("-"),
                        error = %e,
                        "strategy failed, treating as declined"
                    );
                }
            }
        }
        None
    }
}

/// Pairwise priority; `Less` means `a` goes first
///
/// Not transitive across bands, so it must not be handed to `sort_by`.
pub fn compare_priority(a: &PatchCandidate, b: &PatchCandidate) -> Ordering {
    let gap = a.confidence - b.confidence;
    if gap.abs() > CONFIDENCE_BAND + BAND_EPSILON {
        return b
            .confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal);
    }
    b.error.severity.weight().cmp(&a.error.severity.weight())
}

/// Stable insertion sort with [`compare_priority`]
///
/// Every adjacent pair ends up in order even where the comparator is not
/// transitive.
pub fn prioritize(patches: Vec<PatchCandidate>) -> Vec<PatchCandidate> {
    let mut ordered: Vec<PatchCandidate> = Vec::with_capacity(patches.len());
    for patch in patches {
        let mut idx = ordered.len();
        while idx > 0 && compare_priority(&patch, &ordered[idx - 1]) == Ordering::Less {
            idx -= 1;
        }
        ordered.insert(idx, patch);
    }
    ordered
}
