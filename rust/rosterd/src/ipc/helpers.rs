use chrono::{Local, NaiveDate};

use crate::calc;
use crate::error::StoreError;
use crate::ipc::error::HandlerErr;
use crate::model::StudentId;
use crate::store::Store;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn get_required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// `YYYY-MM-DD` when given, today when absent.
pub fn get_date_or_today(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    match get_optional_str(params, key) {
        None => Ok(Local::now().date_naive()),
        Some(s) => calc::validate_date(&s).ok_or_else(|| StoreError::InvalidDate(s).into()),
    }
}

pub fn get_required_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    let s = get_required_str(params, key)?;
    calc::validate_date(&s).ok_or_else(|| StoreError::InvalidDate(s).into())
}

/// Student-targeted methods take `studentId`, or `courseName` plus `displayName`.
pub fn student_target(store: &Store, params: &serde_json::Value) -> Result<StudentId, HandlerErr> {
    if let Some(id) = params.get("studentId").and_then(|v| v.as_i64()) {
        return Ok(StudentId(id));
    }
    let (Some(course), Some(name)) = (
        get_optional_str(params, "courseName"),
        get_optional_str(params, "displayName"),
    ) else {
        return Err(HandlerErr::bad_params(
            "missing studentId (or courseName and displayName)",
        ));
    };
    Ok(store.try_find_student(&course, &name)?)
}
