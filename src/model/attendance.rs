use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use utoipa::ToSchema;

/// One row per (employee_id, date); the pair carries a UNIQUE KEY so a race
/// between concurrent check-ins resolves in the database, not in handler
/// code.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = 42)]
    pub employee_id: u64,

    #[schema(example = "Rina Akter")]
    pub employee_name: String,

    #[schema(example = "2026-08-26", value_type = String, format = "date")]
    pub date: NaiveDate,

    #[schema(example = "2026-08-26T09:58:00", value_type = String, nullable = true)]
    pub check_in_time: Option<NaiveDateTime>,

    #[schema(example = "2026-08-26T18:05:00", value_type = String, nullable = true)]
    pub check_out_time: Option<NaiveDateTime>,

    #[schema(nullable = true)]
    pub check_in_image: Option<String>,

    #[schema(nullable = true)]
    pub check_out_image: Option<String>,

    #[schema(example = "present")]
    pub status: String,

    /// Set when an admin-approved manual request injected a time.
    pub is_manual: bool,

    #[schema(nullable = true)]
    pub manual_note: Option<String>,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

/// Where today's record sits in `NoRecord -> CheckedIn -> CheckedOut`.
/// `CheckedOut` is terminal for the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayState {
    NoRecord,
    CheckedIn,
    CheckedOut,
}

impl DayState {
    pub fn of(record: Option<&AttendanceRecord>) -> Self {
        match record {
            None => DayState::NoRecord,
            Some(r) if r.check_out_time.is_some() => DayState::CheckedOut,
            Some(r) if r.check_in_time.is_some() => DayState::CheckedIn,
            // An absence-sweep row with no times behaves like no record: a
            // check-in may still upgrade it.
            Some(_) => DayState::NoRecord,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionError {
    AlreadyCheckedIn,
    NoCheckinFound,
    AlreadyCheckedOut,
}

impl TransitionError {
    pub fn message(&self) -> &'static str {
        match self {
            TransitionError::AlreadyCheckedIn => "Check-in already recorded for today",
            TransitionError::NoCheckinFound => "No check-in record found for today",
            TransitionError::AlreadyCheckedOut => "Check-out already recorded for today",
        }
    }
}

/// Precondition for a check-in. Checked before face verification so an
/// illegal transition costs no external calls.
pub fn ensure_can_check_in(state: DayState) -> Result<(), TransitionError> {
    match state {
        DayState::NoRecord => Ok(()),
        DayState::CheckedIn | DayState::CheckedOut => Err(TransitionError::AlreadyCheckedIn),
    }
}

/// Precondition for a check-out: a check-in must exist and check-out is
/// write-once per day.
pub fn ensure_can_check_out(state: DayState) -> Result<(), TransitionError> {
    match state {
        DayState::NoRecord => Err(TransitionError::NoCheckinFound),
        DayState::CheckedIn => Ok(()),
        DayState::CheckedOut => Err(TransitionError::AlreadyCheckedOut),
    }
}

/// How the storage layer answered one check-in write. The INSERT and the
/// follow-up conditional UPDATE race against concurrent attempts on the
/// (employee_id, date) unique key; this type captures what came back so the
/// decision itself stays out of handler SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInWrite {
    /// The INSERT landed: first record of the day.
    Inserted,
    /// The INSERT hit the unique key; `upgraded_rows` is the row count of
    /// the conditional `UPDATE ... WHERE check_in_time IS NULL` that
    /// followed.
    DuplicateKey { upgraded_rows: u64 },
}

/// Settles one check-in attempt. Zero upgraded rows after a duplicate key
/// means a concurrent attempt already holds the check-in; a nonzero count
/// means this attempt claimed an open row (an absence-sweep upgrade).
pub fn settle_check_in_write(write: CheckInWrite) -> Result<(), TransitionError> {
    match write {
        CheckInWrite::Inserted => Ok(()),
        CheckInWrite::DuplicateKey { upgraded_rows: 0 } => {
            Err(TransitionError::AlreadyCheckedIn)
        }
        CheckInWrite::DuplicateKey { .. } => Ok(()),
    }
}

/// A check-in after the configured workday start is `late`, otherwise
/// `present`.
pub fn status_for_check_in(at: NaiveTime, workday_start: NaiveTime) -> AttendanceStatus {
    if at > workday_start {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(check_in: bool, check_out: bool) -> AttendanceRecord {
        let t = NaiveDate::from_ymd_opt(2026, 8, 26)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        AttendanceRecord {
            id: 1,
            employee_id: 42,
            employee_name: "Rina Akter".into(),
            date: t.date(),
            check_in_time: check_in.then_some(t),
            check_out_time: check_out.then_some(t),
            check_in_image: None,
            check_out_image: None,
            status: "present".into(),
            is_manual: false,
            manual_note: None,
        }
    }

    #[test]
    fn check_in_allowed_only_from_no_record() {
        assert!(ensure_can_check_in(DayState::NoRecord).is_ok());
        assert_eq!(
            ensure_can_check_in(DayState::CheckedIn),
            Err(TransitionError::AlreadyCheckedIn)
        );
        assert_eq!(
            ensure_can_check_in(DayState::CheckedOut),
            Err(TransitionError::AlreadyCheckedIn)
        );
    }

    #[test]
    fn check_out_requires_open_check_in() {
        assert_eq!(
            ensure_can_check_out(DayState::NoRecord),
            Err(TransitionError::NoCheckinFound)
        );
        assert!(ensure_can_check_out(DayState::CheckedIn).is_ok());
        assert_eq!(
            ensure_can_check_out(DayState::CheckedOut),
            Err(TransitionError::AlreadyCheckedOut)
        );
    }

    #[test]
    fn day_state_derives_from_record_times() {
        assert_eq!(DayState::of(None), DayState::NoRecord);
        assert_eq!(DayState::of(Some(&record(true, false))), DayState::CheckedIn);
        assert_eq!(DayState::of(Some(&record(true, true))), DayState::CheckedOut);
    }

    #[test]
    fn absence_sweep_row_still_accepts_a_check_in() {
        // status=absent, no times: the sweep must not block a late arrival.
        let sweep_row = record(false, false);
        let state = DayState::of(Some(&sweep_row));
        assert_eq!(state, DayState::NoRecord);
        assert!(ensure_can_check_in(state).is_ok());
    }

    #[test]
    fn concurrent_check_ins_settle_to_one_acceptance() {
        // Both attempts pass the precheck before either one writes.
        assert!(ensure_can_check_in(DayState::NoRecord).is_ok());
        assert!(ensure_can_check_in(DayState::NoRecord).is_ok());

        // The unique key serializes the writes: one INSERT lands; the other
        // hits the key and its conditional update finds no open row left.
        let outcomes = [
            settle_check_in_write(CheckInWrite::Inserted),
            settle_check_in_write(CheckInWrite::DuplicateKey { upgraded_rows: 0 }),
        ];

        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
        assert_eq!(outcomes[1], Err(TransitionError::AlreadyCheckedIn));
    }

    #[test]
    fn duplicate_key_over_a_sweep_row_still_claims_the_day() {
        let write = CheckInWrite::DuplicateKey { upgraded_rows: 1 };
        assert!(settle_check_in_write(write).is_ok());
    }

    #[test]
    fn late_cutoff_is_exclusive() {
        let start = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        assert_eq!(
            status_for_check_in(NaiveTime::from_hms_opt(9, 59, 0).unwrap(), start),
            AttendanceStatus::Present
        );
        assert_eq!(
            status_for_check_in(start, start),
            AttendanceStatus::Present
        );
        assert_eq!(
            status_for_check_in(NaiveTime::from_hms_opt(10, 0, 1).unwrap(), start),
            AttendanceStatus::Late
        );
    }

    #[test]
    fn transition_error_codes_are_stable() {
        assert_eq!(
            TransitionError::AlreadyCheckedIn.to_string(),
            "ALREADY_CHECKED_IN"
        );
        assert_eq!(
            TransitionError::NoCheckinFound.to_string(),
            "NO_CHECKIN_FOUND"
        );
        assert_eq!(
            TransitionError::AlreadyCheckedOut.to_string(),
            "ALREADY_CHECKED_OUT"
        );
    }
}
