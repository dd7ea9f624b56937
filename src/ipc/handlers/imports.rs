use crate::db;
use crate::ipc::error::ok;
use crate::ipc::handlers::courses::{course_exists, enroll};
use crate::ipc::handlers::setup::load_import_rules;
use crate::ipc::handlers::users::{insert_user, NewUser};
use crate::ipc::helpers::{get_required_str, read_import_text, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, ImportFormatError, RosterImport};
use serde_json::{json, Value};

fn format_error(e: &ImportFormatError) -> HandlerErr {
    HandlerErr::new("import_format", e.to_string())
        .with_details(json!({ "missingColumns": e.missing_columns() }))
}

/// Runs the importer against the current directory. Never writes.
fn run_import(state: &AppState, params: &Value) -> Result<RosterImport, HandlerErr> {
    let text = read_import_text(params)?;
    let rules = load_import_rules(state).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let existing = db::user_emails(&state.db).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    roster::import_roster(&text, &existing, &rules).map_err(|e| {
        tracing::warn!(error = %e, "roster import rejected");
        format_error(&e)
    })
}

/// Inserts every accepted record in one transaction, optionally enrolling
/// each new user in `course_id`. Returns the new user ids in input order.
fn apply_accepted(
    state: &AppState,
    import: &RosterImport,
    course_id: Option<&str>,
) -> Result<Vec<String>, HandlerErr> {
    let tx = state
        .db
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    let mut created = Vec::with_capacity(import.accepted.len());
    for rec in &import.accepted {
        let user_id = insert_user(
            &tx,
            &NewUser {
                name: &rec.name,
                email: &rec.email,
                role: rec.role,
                status: rec.status,
                student_id: Some(&rec.student_id),
                year: rec.year.as_deref(),
            },
        )
        .map_err(|e| {
            HandlerErr::db("db_insert_failed", e)
                .with_details(json!({ "table": "users", "line": rec.line }))
        })?;
        if let Some(course_id) = course_id {
            enroll(&tx, course_id, &user_id).map_err(|e| {
                HandlerErr::db("db_insert_failed", e)
                    .with_details(json!({ "table": "enrollments", "line": rec.line }))
            })?;
        }
        created.push(user_id);
    }
    tx.commit().map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    Ok(created)
}

fn import_result(import: &RosterImport) -> Value {
    json!({
        "summary": import.summary,
        "accepted": import.accepted,
        "rejected": import.rejected
    })
}

fn users_preview_import(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let import = run_import(state, &req.params)?;
    Ok(import_result(&import))
}

fn users_apply_import(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let import = run_import(state, &req.params)?;
    let created = apply_accepted(state, &import, None)?;
    tracing::info!(
        total = import.summary.total,
        accepted = import.summary.accepted,
        rejected = import.summary.rejected,
        "user import applied"
    );
    let mut result = import_result(&import);
    result["createdUserIds"] = json!(created);
    Ok(result)
}

fn roster_preview_import(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let course_id = get_required_str(&req.params, "courseId")?;
    if !course_exists(&state.db, &course_id)? {
        return Err(HandlerErr::new("not_found", "course not found"));
    }
    let import = run_import(state, &req.params)?;
    let mut result = import_result(&import);
    result["courseId"] = json!(course_id);
    Ok(result)
}

fn roster_apply_import(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let course_id = get_required_str(&req.params, "courseId")?;
    if !course_exists(&state.db, &course_id)? {
        return Err(HandlerErr::new("not_found", "course not found"));
    }
    let import = run_import(state, &req.params)?;
    let created = apply_accepted(state, &import, Some(&course_id))?;
    tracing::info!(
        course_id = %course_id,
        total = import.summary.total,
        accepted = import.summary.accepted,
        rejected = import.summary.rejected,
        "roster import applied"
    );
    let mut result = import_result(&import);
    result["courseId"] = json!(course_id);
    result["enrolledUserIds"] = json!(created);
    Ok(result)
}

fn roster_template(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let rules = load_import_rules(state).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    Ok(json!({
        "fileName": "student_roster_template.csv",
        "studentIdPrefix": rules.prefix(),
        "studentIdDigits": rules.digits(),
        "text": roster::roster_template(&rules)
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "users.previewImport" => users_preview_import(state, req),
        "users.applyImport" => users_apply_import(state, req),
        "courses.roster.previewImport" => roster_preview_import(state, req),
        "courses.roster.applyImport" => roster_apply_import(state, req),
        "roster.template" => roster_template(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
