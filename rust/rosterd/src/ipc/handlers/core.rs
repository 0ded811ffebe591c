use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    // Touches the database so a dead pool shows up here rather than on the next write.
    let courses = state.store.try_get_courses()?;
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "courseCount": courses.len(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(respond(&req.id, handle_health(state, req))),
        _ => None,
    }
}
