use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let counts = state.db.query_row(
        "SELECT
           (SELECT COUNT(*) FROM users),
           (SELECT COUNT(*) FROM courses),
           (SELECT COUNT(*) FROM projects)",
        [],
        |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?, r.get::<_, i64>(2)?)),
    );
    match counts {
        Ok((users, courses, projects)) => ok(
            &req.id,
            json!({
                "version": env!("CARGO_PKG_VERSION"),
                "userCount": users,
                "courseCount": courses,
                "projectCount": projects
            }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        _ => None,
    }
}
