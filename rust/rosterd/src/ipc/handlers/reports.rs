use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_courses_overview(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let course = get_required_str(&req.params, "courseName")?;
    let rows = state.store.try_course_overview(&course)?;
    Ok(json!({ "courseName": course, "rows": rows }))
}

fn handle_courses_export_csv(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let course = get_required_str(&req.params, "courseName")?;
    let csv = state.store.try_export_course_csv(&course)?;
    Ok(json!({ "courseName": course, "csv": csv }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "courses.overview" => handle_courses_overview(state, req),
        "courses.exportCsv" => handle_courses_export_csv(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
