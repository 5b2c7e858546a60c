//! Fleet capacity updates
//!
//! Turns a verdict into an update plan (skip on `Stay`, clamp into the
//! configured bounds, skip in preview mode) and applies it through a
//! [`FleetManager`]. Each update is attempted once; failures propagate.

mod recording;

#[cfg(feature = "aws")]
mod autoscaling;

#[cfg(feature = "aws")]
pub use autoscaling::AutoScalingFleetManager;
pub use recording::RecordingFleetManager;

use crate::models::{Action, CapacityBounds, Verdict};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Trait for fleet manager implementations
#[async_trait]
pub trait FleetManager: Send + Sync {
    /// Pin a fleet to `capacity` (desired, min and max all set to it)
    async fn set_capacity(&self, group: &str, capacity: i64) -> Result<()>;
}

/// Why no update request is issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The verdict asks for no change
    Stay,
    /// Preview mode: the update would have set `target`
    Preview { target: i64 },
}

/// What to do with a verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "plan", rename_all = "snake_case")]
pub enum UpdatePlan {
    Skip { reason: SkipReason },
    Apply {
        target: i64,
        /// The desired capacity was moved into the configured bounds
        clamped: bool,
    },
}

/// Plan an update for one verdict
pub fn plan_update(verdict: &Verdict, bounds: &CapacityBounds, dry_run: bool) -> UpdatePlan {
    if verdict.action == Action::Stay {
        return UpdatePlan::Skip { reason: SkipReason::Stay };
    }

    let target = bounds.clamp(verdict.desired_capacity);
    if dry_run {
        return UpdatePlan::Skip { reason: SkipReason::Preview { target } };
    }

    UpdatePlan::Apply {
        target,
        clamped: target != verdict.desired_capacity,
    }
}

/// Result of applying a plan to one fleet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub group: String,
    pub plan: UpdatePlan,
    /// True when an update request was sent and accepted
    pub applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Apply a plan to one fleet
pub async fn apply_plan(
    manager: &dyn FleetManager,
    group: &str,
    plan: UpdatePlan,
) -> Result<UpdateOutcome> {
    let applied = match plan {
        UpdatePlan::Skip { .. } => false,
        UpdatePlan::Apply { target, .. } => {
            manager
                .set_capacity(group, target)
                .await
                .with_context(|| format!("Failed to set capacity of {} to {}", group, target))?;
            true
        }
    };

    Ok(UpdateOutcome {
        group: group.to_string(),
        plan,
        applied,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(action: Action, desired: i64) -> Verdict {
        Verdict {
            current_capacity: 4,
            desired_capacity: desired,
            action,
        }
    }

    #[test]
    fn test_stay_is_skipped() {
        let plan = plan_update(&verdict(Action::Stay, 9), &CapacityBounds::default(), false);
        assert_eq!(plan, UpdatePlan::Skip { reason: SkipReason::Stay });
    }

    #[test]
    fn test_stay_wins_over_preview() {
        let plan = plan_update(&verdict(Action::Stay, 9), &CapacityBounds::default(), true);
        assert_eq!(plan, UpdatePlan::Skip { reason: SkipReason::Stay });
    }

    #[test]
    fn test_preview_reports_target() {
        let bounds = CapacityBounds::new(None, Some(6));
        let plan = plan_update(&verdict(Action::Grow, 9), &bounds, true);
        assert_eq!(plan, UpdatePlan::Skip { reason: SkipReason::Preview { target: 6 } });
    }

    #[test]
    fn test_apply_clamps_to_bounds() {
        let bounds = CapacityBounds::new(Some(3), Some(8));

        let grow = plan_update(&verdict(Action::Grow, 12), &bounds, false);
        assert_eq!(grow, UpdatePlan::Apply { target: 8, clamped: true });

        let shrink = plan_update(&verdict(Action::Shrink, 1), &bounds, false);
        assert_eq!(shrink, UpdatePlan::Apply { target: 3, clamped: true });

        let inside = plan_update(&verdict(Action::Grow, 5), &bounds, false);
        assert_eq!(inside, UpdatePlan::Apply { target: 5, clamped: false });
    }

    #[tokio::test]
    async fn test_apply_plan_sends_once() {
        let manager = RecordingFleetManager::new();
        let outcome = apply_plan(&manager, "web", UpdatePlan::Apply { target: 7, clamped: false })
            .await
            .unwrap();

        assert!(outcome.applied);
        assert_eq!(manager.requests().await, vec![("web".to_string(), 7)]);
    }

    #[tokio::test]
    async fn test_apply_plan_skip_sends_nothing() {
        let manager = RecordingFleetManager::new();
        let outcome = apply_plan(&manager, "web", UpdatePlan::Skip { reason: SkipReason::Stay })
            .await
            .unwrap();

        assert!(!outcome.applied);
        assert!(manager.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_apply_plan_propagates_failure() {
        let manager = RecordingFleetManager::failing("scaling activity in progress");
        let result = apply_plan(&manager, "web", UpdatePlan::Apply { target: 7, clamped: false }).await;

        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("scaling activity in progress"));
    }
}
