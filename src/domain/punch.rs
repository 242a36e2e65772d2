use derive_more::Display;

use crate::domain::clock::{ClockError, ClockTime, compute_status, elapsed};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum PunchError {
    #[display(fmt = "{}", _0)]
    Clock(ClockError),
    #[display(fmt = "check-out requires a check-in")]
    CheckOutWithoutCheckIn,
    #[display(fmt = "status '{}' cannot carry punch times", _0)]
    NoPunchAllowed(&'static str),
}

impl std::error::Error for PunchError {}

impl From<ClockError> for PunchError {
    fn from(e: ClockError) -> Self {
        PunchError::Clock(e)
    }
}

/// Status and check-in for a freshly created attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewEntry {
    pub status: AttendanceStatus,
    pub check_in: Option<ClockTime>,
}

/// Present/Late are always derived from the check-in, which defaults to `now`.
/// Absent and OnLeave entries carry no punch.
pub fn resolve_punch_in(
    requested: Option<AttendanceStatus>,
    check_in: Option<ClockTime>,
    now: ClockTime,
    cutoff: ClockTime,
) -> Result<NewEntry, PunchError> {
    match requested {
        Some(status @ (AttendanceStatus::Absent | AttendanceStatus::OnLeave)) => {
            if check_in.is_some() {
                return Err(PunchError::NoPunchAllowed(status.db_value()));
            }
            Ok(NewEntry {
                status,
                check_in: None,
            })
        }
        Some(AttendanceStatus::HalfDay) => Ok(NewEntry {
            status: AttendanceStatus::HalfDay,
            check_in,
        }),
        Some(AttendanceStatus::Present | AttendanceStatus::Late) | None => {
            let at = check_in.unwrap_or(now);
            Ok(NewEntry {
                status: compute_status(at, cutoff),
                check_in: Some(at),
            })
        }
    }
}

/// Partial update of an attendance record. Absent fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceChange {
    pub check_in: Option<ClockTime>,
    pub check_out: Option<ClockTime>,
    pub status: Option<AttendanceStatus>,
}

impl AttendanceChange {
    pub fn is_empty(&self) -> bool {
        self.check_in.is_none() && self.check_out.is_none() && self.status.is_none()
    }

    /// Anything beyond a plain punch-out.
    pub fn is_override(&self) -> bool {
        self.check_in.is_some() || self.status.is_some()
    }
}

/// Applies `change` to `record`.
///
/// A new check-in re-derives Present/Late unless a status is given.
/// Moving a record to Absent or OnLeave clears its punches.
pub fn apply_change(
    record: &AttendanceRecord,
    change: &AttendanceChange,
    cutoff: ClockTime,
) -> Result<AttendanceRecord, PunchError> {
    let status = match (change.status, change.check_in) {
        (Some(status), _) => status,
        (None, Some(at)) if record.status.is_derived() => compute_status(at, cutoff),
        _ => record.status,
    };

    let (check_in, check_out) = match status {
        AttendanceStatus::Absent | AttendanceStatus::OnLeave => {
            if change.check_in.is_some() || change.check_out.is_some() {
                return Err(PunchError::NoPunchAllowed(status.db_value()));
            }
            (None, None)
        }
        _ => (
            change.check_in.or(record.check_in),
            change.check_out.or(record.check_out),
        ),
    };

    match (check_in, check_out) {
        (None, Some(_)) => return Err(PunchError::CheckOutWithoutCheckIn),
        (Some(i), Some(o)) => {
            elapsed(i, o)?;
        }
        _ => {}
    }

    Ok(AttendanceRecord {
        status,
        check_in,
        check_out,
        ..record.clone()
    })
}
