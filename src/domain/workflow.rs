use derive_more::Display;

use crate::model::leave_request::LeaveStatus;

/// Admin/HR verdict on a pending leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LeaveDecision {
    #[display(fmt = "approve")]
    Approve,
    #[display(fmt = "reject")]
    Reject,
}

impl LeaveDecision {
    pub fn target(self) -> LeaveStatus {
        match self {
            LeaveDecision::Approve => LeaveStatus::Approved,
            LeaveDecision::Reject => LeaveStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum WorkflowError {
    #[display(fmt = "Leave request is already {}", current)]
    AlreadyDecided { current: LeaveStatus },
    #[display(fmt = "Only pending leave requests can be withdrawn")]
    NotWithdrawable { current: LeaveStatus },
}

impl std::error::Error for WorkflowError {}

impl LeaveStatus {
    pub fn can_transition_to(self, next: LeaveStatus) -> bool {
        !self.is_terminal() && next.is_terminal()
    }
}

/// Next status after `decision`; decided requests never move again.
pub fn decide(current: LeaveStatus, decision: LeaveDecision) -> Result<LeaveStatus, WorkflowError> {
    let next = decision.target();
    if current.can_transition_to(next) {
        Ok(next)
    } else {
        Err(WorkflowError::AlreadyDecided { current })
    }
}

pub fn ensure_withdrawable(current: LeaveStatus) -> Result<(), WorkflowError> {
    if current == LeaveStatus::Pending {
        Ok(())
    } else {
        Err(WorkflowError::NotWithdrawable { current })
    }
}
