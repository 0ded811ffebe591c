use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_courses_list(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let courses = state.store.try_get_courses()?;
    Ok(json!({ "courses": courses }))
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(&req.params, "name")?;
    let id = state.store.try_add_course(&name)?;
    Ok(json!({ "courseId": id, "name": name.trim() }))
}

fn handle_courses_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(&req.params, "name")?;
    state.store.try_delete_course(&name)?;
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "courses.list" => handle_courses_list(state, req),
        "courses.create" => handle_courses_create(state, req),
        "courses.delete" => handle_courses_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
