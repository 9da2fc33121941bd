//! Admin-gated partner approval state machine.
//!
//! ```text
//! pending ──approve──▶ approved ──suspend──▶ suspended
//!    │                    ▲                      │
//!    └──reject──▶ rejected └──────reactivate─────┘
//! ```
//!
//! Search visibility is not cached anywhere: the ranking engine reads the current
//! status as a filter predicate on every query.

use serde::{Deserialize, Serialize};

use super::domain::PartnerStatus;

/// Admin decision applied to a partner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LifecycleAction {
    Approve,
    Reject { reason: String },
    Suspend { reason: String },
    Reactivate,
}

impl LifecycleAction {
    pub const fn target(&self) -> PartnerStatus {
        match self {
            LifecycleAction::Approve | LifecycleAction::Reactivate => PartnerStatus::Approved,
            LifecycleAction::Reject { .. } => PartnerStatus::Rejected,
            LifecycleAction::Suspend { .. } => PartnerStatus::Suspended,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            LifecycleAction::Approve => "approve",
            LifecycleAction::Reject { .. } => "reject",
            LifecycleAction::Suspend { .. } => "suspend",
            LifecycleAction::Reactivate => "reactivate",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            LifecycleAction::Reject { reason } | LifecycleAction::Suspend { reason } => {
                Some(reason.as_str())
            }
            LifecycleAction::Approve | LifecycleAction::Reactivate => None,
        }
    }

    /// Source states from which this action may move a partner.
    const fn allowed_from(&self) -> &'static [PartnerStatus] {
        match self {
            LifecycleAction::Approve => &[PartnerStatus::Pending],
            LifecycleAction::Reject { .. } => &[PartnerStatus::Pending],
            LifecycleAction::Suspend { .. } => &[PartnerStatus::Approved],
            LifecycleAction::Reactivate => &[PartnerStatus::Suspended],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot {action} a partner in status {from}")]
    InvalidTransition {
        from: PartnerStatus,
        action: &'static str,
    },
    #[error("a reason is required to {action} a partner")]
    MissingReason { action: &'static str },
}

/// Result of applying an action to the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied {
        from: PartnerStatus,
        to: PartnerStatus,
    },
    /// Partner already sits in the action's target state.
    Unchanged(PartnerStatus),
}

impl Transition {
    pub const fn status(self) -> PartnerStatus {
        match self {
            Transition::Applied { to, .. } => to,
            Transition::Unchanged(status) => status,
        }
    }
}

/// Decide the outcome of `action` against `current`. Pure; persistence is up to the caller.
pub fn apply(current: PartnerStatus, action: &LifecycleAction) -> Result<Transition, TransitionError> {
    if let Some(reason) = action.reason() {
        if reason.trim().is_empty() {
            return Err(TransitionError::MissingReason {
                action: action.name(),
            });
        }
    }

    let target = action.target();
    if current == target {
        return Ok(Transition::Unchanged(current));
    }

    if action.allowed_from().contains(&current) {
        Ok(Transition::Applied {
            from: current,
            to: target,
        })
    } else {
        Err(TransitionError::InvalidTransition {
            from: current,
            action: action.name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reject() -> LifecycleAction {
        LifecycleAction::Reject {
            reason: "missing insurance certificate".to_string(),
        }
    }

    fn suspend() -> LifecycleAction {
        LifecycleAction::Suspend {
            reason: "customer complaints".to_string(),
        }
    }

    #[test]
    fn pending_partner_can_be_approved_or_rejected() {
        assert_eq!(
            apply(PartnerStatus::Pending, &LifecycleAction::Approve),
            Ok(Transition::Applied {
                from: PartnerStatus::Pending,
                to: PartnerStatus::Approved
            })
        );
        assert_eq!(
            apply(PartnerStatus::Pending, &reject()).map(Transition::status),
            Ok(PartnerStatus::Rejected)
        );
    }

    #[test]
    fn approved_and_suspended_toggle() {
        assert_eq!(
            apply(PartnerStatus::Approved, &suspend()).map(Transition::status),
            Ok(PartnerStatus::Suspended)
        );
        assert_eq!(
            apply(PartnerStatus::Suspended, &LifecycleAction::Reactivate).map(Transition::status),
            Ok(PartnerStatus::Approved)
        );
    }

    #[test]
    fn reapplying_same_target_is_a_no_op() {
        assert_eq!(
            apply(PartnerStatus::Approved, &LifecycleAction::Approve),
            Ok(Transition::Unchanged(PartnerStatus::Approved))
        );
        assert_eq!(
            apply(PartnerStatus::Approved, &LifecycleAction::Reactivate),
            Ok(Transition::Unchanged(PartnerStatus::Approved))
        );
        assert_eq!(
            apply(PartnerStatus::Suspended, &suspend()),
            Ok(Transition::Unchanged(PartnerStatus::Suspended))
        );
        assert_eq!(
            apply(PartnerStatus::Rejected, &reject()),
            Ok(Transition::Unchanged(PartnerStatus::Rejected))
        );
    }

    #[test]
    fn disallowed_moves_are_rejected() {
        let cases = [
            (PartnerStatus::Pending, suspend()),
            (PartnerStatus::Pending, LifecycleAction::Reactivate),
            (PartnerStatus::Rejected, LifecycleAction::Approve),
            (PartnerStatus::Rejected, suspend()),
            (PartnerStatus::Rejected, LifecycleAction::Reactivate),
            (PartnerStatus::Approved, reject()),
            (PartnerStatus::Suspended, LifecycleAction::Approve),
            (PartnerStatus::Suspended, reject()),
        ];
        for (from, action) in cases {
            assert_eq!(
                apply(from, &action),
                Err(TransitionError::InvalidTransition {
                    from,
                    action: action.name()
                }),
                "{from} -> {}",
                action.name()
            );
        }
    }

    #[test]
    fn reject_and_suspend_require_a_reason() {
        let blank = LifecycleAction::Suspend {
            reason: "   ".to_string(),
        };
        assert_eq!(
            apply(PartnerStatus::Approved, &blank),
            Err(TransitionError::MissingReason { action: "suspend" })
        );
        let blank = LifecycleAction::Reject {
            reason: String::new(),
        };
        assert_eq!(
            apply(PartnerStatus::Pending, &blank),
            Err(TransitionError::MissingReason { action: "reject" })
        );
    }
}
