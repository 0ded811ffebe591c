use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{
    get_date_or_today, get_optional_str, get_required_date, get_required_i64, get_required_str,
    student_target,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{AssignmentStatus, AttendanceStatus};
use crate::error::StoreError;
use serde_json::json;

fn parse_status<T>(params: &serde_json::Value) -> Result<T, HandlerErr>
where
    T: std::str::FromStr<Err = crate::model::ParseStatusError>,
{
    let raw = get_required_str(params, "status")?;
    raw.parse::<T>()
        .map_err(|e| HandlerErr::from(StoreError::from(e)))
}

fn handle_attendance_add(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let id = student_target(&state.store, &req.params)?;
    let status: AttendanceStatus = parse_status(&req.params)?;
    let date = get_required_date(&req.params, "date")?;
    let record_id = state.store.add_attendance_for(id, status, date)?;
    Ok(json!({ "recordId": record_id }))
}

fn handle_behavior_add(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let id = student_target(&state.store, &req.params)?;
    let score = get_required_i64(&req.params, "score")?;
    let description = get_optional_str(&req.params, "description").unwrap_or_default();
    let date = get_date_or_today(&req.params, "date")?;
    let record_id = state.store.add_behavior_for(id, score, &description, date)?;
    Ok(json!({ "recordId": record_id }))
}

fn handle_assignments_add(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let id = student_target(&state.store, &req.params)?;
    let title = get_required_str(&req.params, "title")?;
    if title.trim().is_empty() {
        return Err(HandlerErr::bad_params("title must not be empty"));
    }
    let status: AssignmentStatus = parse_status(&req.params)?;
    let date = get_required_date(&req.params, "date")?;
    let record_id = state.store.add_assignment_for(id, title.trim(), status, date)?;
    Ok(json!({ "recordId": record_id }))
}

fn handle_notes_add(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let id = student_target(&state.store, &req.params)?;
    let content = get_required_str(&req.params, "content")?;
    let date = get_date_or_today(&req.params, "date")?;
    let record_id = state.store.add_note_for(id, &content, date)?;
    Ok(json!({ "recordId": record_id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "attendance.add" => handle_attendance_add(state, req),
        "behavior.add" => handle_behavior_add(state, req),
        "assignments.add" => handle_assignments_add(state, req),
        "notes.add" => handle_notes_add(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
