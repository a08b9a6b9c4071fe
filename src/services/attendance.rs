//! Attendance QR token rules.
//!
//! A day moves through `NONE -> IN_MARKED -> OUT_MARKED`. Tokens are
//! single-use: the caller consumes a token before applying the day
//! transition, so a rejected transition still burns the token.

use axum::http::StatusCode;
use chrono::{DateTime, Duration, Local, NaiveDate, Utc};

use crate::models::attendance::{Attendance, AttendanceToken, TokenType};

/// Why a scan was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanRejection {
    /// Never issued, or expired and already purged.
    NotFound,
    AlreadyUsed,
    Expired,
    DuplicateIn,
    OutBeforeIn,
    DuplicateOut,
}

impl ScanRejection {
    pub fn code(&self) -> &'static str {
        match self {
            ScanRejection::NotFound => "NOT_FOUND",
            ScanRejection::AlreadyUsed => "ALREADY_USED",
            ScanRejection::Expired => "EXPIRED",
            ScanRejection::DuplicateIn => "DUPLICATE_IN",
            ScanRejection::OutBeforeIn => "OUT_BEFORE_IN",
            ScanRejection::DuplicateOut => "DUPLICATE_OUT",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ScanRejection::NotFound => StatusCode::NOT_FOUND,
            ScanRejection::Expired | ScanRejection::OutBeforeIn => StatusCode::BAD_REQUEST,
            ScanRejection::AlreadyUsed
            | ScanRejection::DuplicateIn
            | ScanRejection::DuplicateOut => StatusCode::CONFLICT,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ScanRejection::NotFound => "Invalid or expired QR code",
            ScanRejection::AlreadyUsed => "QR code has already been used",
            ScanRejection::Expired => "QR code has expired",
            ScanRejection::DuplicateIn => "IN time already marked for today",
            ScanRejection::OutBeforeIn => "Cannot mark OUT before IN",
            ScanRejection::DuplicateOut => "OUT time already marked for today",
        }
    }
}

/// Checks a looked-up token before it is consumed.
/// Order matters: a used token reports `AlreadyUsed` even once it has expired.
pub fn check_token(token: &AttendanceToken, now: DateTime<Utc>) -> Result<(), ScanRejection> {
    if token.used {
        return Err(ScanRejection::AlreadyUsed);
    }
    if token.expires_at < now {
        return Err(ScanRejection::Expired);
    }
    Ok(())
}

/// Fresh opaque token value.
pub fn new_token_value() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub fn token_expiry(now: DateTime<Utc>, ttl_secs: i64) -> DateTime<Utc> {
    now + Duration::seconds(ttl_secs)
}

/// Day bucket for a scan: the calendar date at local midnight.
pub fn local_day(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&Local).date_naive()
}

/// The mutable part of a student's attendance for one day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendanceDay {
    pub teacher_id: Option<i64>,
    pub in_time: Option<DateTime<Utc>>,
    pub out_time: Option<DateTime<Utc>>,
}

impl From<&Attendance> for AttendanceDay {
    fn from(record: &Attendance) -> Self {
        Self {
            teacher_id: record.teacher_id,
            in_time: record.in_time,
            out_time: record.out_time,
        }
    }
}

impl AttendanceDay {
    /// Applies one scan. Each side is set at most once and OUT requires IN.
    /// On rejection `self` is left untouched.
    pub fn apply(
        &mut self,
        kind: TokenType,
        now: DateTime<Utc>,
        scanned_by: i64,
    ) -> Result<(), ScanRejection> {
        match kind {
            TokenType::In => {
                if self.in_time.is_some() {
                    return Err(ScanRejection::DuplicateIn);
                }
                self.in_time = Some(now);
                self.teacher_id = Some(scanned_by);
            }
            TokenType::Out => {
                if self.in_time.is_none() {
                    return Err(ScanRejection::OutBeforeIn);
                }
                if self.out_time.is_some() {
                    return Err(ScanRejection::DuplicateOut);
                }
                self.out_time = Some(now);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(used: bool, expires_in: i64, now: DateTime<Utc>) -> AttendanceToken {
        AttendanceToken {
            id: 1,
            student_id: 7,
            kind: TokenType::In,
            token: new_token_value(),
            expires_at: now + Duration::seconds(expires_in),
            used,
        }
    }

    #[test]
    fn fresh_token_passes() {
        let now = Utc::now();
        assert_eq!(check_token(&token(false, 60, now), now), Ok(()));
    }

    #[test]
    fn used_token_is_rejected_before_expiry_check() {
        let now = Utc::now();
        assert_eq!(
            check_token(&token(true, -5, now), now),
            Err(ScanRejection::AlreadyUsed)
        );
    }

    #[test]
    fn token_past_expiry_is_rejected_even_if_not_purged() {
        let now = Utc::now();
        assert_eq!(
            check_token(&token(false, -1, now), now),
            Err(ScanRejection::Expired)
        );
    }

    #[test]
    fn token_values_are_unique() {
        assert_ne!(new_token_value(), new_token_value());
        assert_eq!(new_token_value().len(), 32);
    }

    #[test]
    fn expiry_is_ttl_after_issue() {
        let now = Utc::now();
        assert_eq!(token_expiry(now, 60) - now, Duration::seconds(60));
    }

    #[test]
    fn in_then_out_reaches_terminal_state() {
        let now = Utc::now();
        let mut day = AttendanceDay::default();

        day.apply(TokenType::In, now, 3).unwrap();
        assert_eq!(day.in_time, Some(now));
        assert_eq!(day.teacher_id, Some(3));
        assert!(day.out_time.is_none());

        let later = now + Duration::hours(6);
        day.apply(TokenType::Out, later, 4).unwrap();
        assert_eq!(day.out_time, Some(later));
        // IN attribution is kept
        assert_eq!(day.teacher_id, Some(3));
    }

    #[test]
    fn out_without_in_is_rejected_and_unchanged() {
        let mut day = AttendanceDay::default();
        assert_eq!(
            day.apply(TokenType::Out, Utc::now(), 3),
            Err(ScanRejection::OutBeforeIn)
        );
        assert_eq!(day, AttendanceDay::default());
    }

    #[test]
    fn each_side_is_set_once() {
        let now = Utc::now();
        let mut day = AttendanceDay::default();
        day.apply(TokenType::In, now, 3).unwrap();
        assert_eq!(
            day.apply(TokenType::In, now + Duration::minutes(1), 3),
            Err(ScanRejection::DuplicateIn)
        );
        assert_eq!(day.in_time, Some(now));

        day.apply(TokenType::Out, now + Duration::hours(1), 3).unwrap();
        assert_eq!(
            day.apply(TokenType::Out, now + Duration::hours(2), 3),
            Err(ScanRejection::DuplicateOut)
        );
        assert_eq!(day.out_time, Some(now + Duration::hours(1)));
    }

    #[test]
    fn rejection_codes_and_statuses() {
        assert_eq!(ScanRejection::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ScanRejection::OutBeforeIn.code(), "OUT_BEFORE_IN");
        assert_eq!(ScanRejection::DuplicateOut.status(), StatusCode::CONFLICT);
    }
}
