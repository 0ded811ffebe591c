use crate::calc;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_required_i64, get_required_str, student_target};
use crate::ipc::types::{AppState, Request};
use crate::model::{display_name, NewStudent, StudentId};
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let course = get_required_str(&req.params, "courseName")?;
    let students = state.store.try_list_students(&course)?;
    Ok(json!({ "students": students }))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let course = get_required_str(&req.params, "courseName")?;
    let student = NewStudent::new(
        get_required_str(&req.params, "firstName")?,
        get_required_str(&req.params, "lastName")?,
    );
    let id = state.store.try_add_student(&course, &student)?;
    Ok(json!({
        "studentId": id,
        "displayName": display_name(student.last_name.trim(), student.first_name.trim()),
    }))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let id = StudentId(get_required_i64(&req.params, "studentId")?);
    state.store.try_delete_student(id)?;
    Ok(json!({ "deleted": true }))
}

/// Records plus the same aggregates the course overview shows.
fn handle_students_records(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let id = student_target(&state.store, &req.params)?;
    let records = state.store.records_for(id)?;
    let totals = calc::aggregate(&records);
    Ok(json!({
        "studentId": id,
        "records": records,
        "totals": totals,
    }))
}

fn handle_students_breakdown(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let id = student_target(&state.store, &req.params)?;
    let breakdown = state.store.student_breakdown(id)?;
    Ok(json!({ "studentId": id, "breakdown": breakdown }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "students.list" => handle_students_list(state, req),
        "students.create" => handle_students_create(state, req),
        "students.delete" => handle_students_delete(state, req),
        "students.records" => handle_students_records(state, req),
        "students.breakdown" => handle_students_breakdown(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
