use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{
    AssignmentRecord, AssignmentStatus, AttendanceRecord, AttendanceStatus, BehaviorRecord,
    StudentRecords,
};

/// Share of `Present` entries, as a percentage. `0.0` for an empty list.
pub fn attendance_percentage(records: &[AttendanceRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let present = records
        .iter()
        .filter(|a| a.status == AttendanceStatus::Present)
        .count();
    100.0 * (present as f64) / (records.len() as f64)
}

/// Arithmetic mean of behavior scores. `0.0` for an empty list.
pub fn behavior_average(records: &[BehaviorRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let sum: i64 = records.iter().map(|b| b.score).sum();
    (sum as f64) / (records.len() as f64)
}

/// `(submitted, total)`.
pub fn assignment_completion(records: &[AssignmentRecord]) -> (usize, usize) {
    let completed = records
        .iter()
        .filter(|a| a.status == AssignmentStatus::Submitted)
        .count();
    (completed, records.len())
}

/// Strict `YYYY-MM-DD`. Anything else, including impossible calendar dates, is `None`.
pub fn validate_date(text: &str) -> Option<NaiveDate> {
    let b = text.as_bytes();
    if b.len() != 10 || b[4] != b'-' || b[7] != b'-' {
        return None;
    }
    let digits_ok = b
        .iter()
        .enumerate()
        .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit());
    if !digits_ok {
        return None;
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

/// Round to 2 decimals; exact ties go to the even neighbour (7.125 -> 7.12).
pub fn round_2(x: f64) -> f64 {
    (x * 100.0).round_ties_even() / 100.0
}

/// Per-student aggregates, rounded for display. The on-screen overview and the
/// CSV export both read these, so they always agree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregates {
    pub attendance_percent: f64,
    pub behavior_average: f64,
    pub assignments_submitted: usize,
    pub assignments_total: usize,
    pub attendance_count: usize,
    pub behavior_count: usize,
}

pub fn aggregate(records: &StudentRecords) -> Aggregates {
    let (submitted, total) = assignment_completion(&records.assignments);
    Aggregates {
        attendance_percent: round_2(attendance_percentage(&records.attendance)),
        behavior_average: round_2(behavior_average(&records.behavior)),
        assignments_submitted: submitted,
        assignments_total: total,
        attendance_count: records.attendance.len(),
        behavior_count: records.behavior.len(),
    }
}

/// One row of the course overview. CSV export renders exactly these rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummaryRow {
    pub display_name: String,
    #[serde(flatten)]
    pub totals: Aggregates,
}

pub fn summarize(display_name: String, records: &StudentRecords) -> StudentSummaryRow {
    StudentSummaryRow {
        display_name,
        totals: aggregate(records),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: &'static str,
    pub count: usize,
}

/// Per-status counts in declaration order, zeros included.
pub fn attendance_breakdown(records: &[AttendanceRecord]) -> Vec<StatusCount> {
    AttendanceStatus::ALL
        .iter()
        .map(|s| StatusCount {
            status: s.as_str(),
            count: records.iter().filter(|a| a.status == *s).count(),
        })
        .collect()
}

pub fn assignment_breakdown(records: &[AssignmentRecord]) -> Vec<StatusCount> {
    AssignmentStatus::ALL
        .iter()
        .map(|s| StatusCount {
            status: s.as_str(),
            count: records.iter().filter(|a| a.status == *s).count(),
        })
        .collect()
}
