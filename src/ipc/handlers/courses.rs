use crate::db;
use crate::ipc::error::ok;
use crate::ipc::handlers::users::row_to_user;
use crate::ipc::helpers::{get_optional_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::Semester;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CourseRow {
    id: String,
    course_code: String,
    title: String,
    description: Option<String>,
    semester: Semester,
    year: String,
    credits: i64,
    instructor: String,
    enrollment_count: i64,
    created_at: String,
}

const COURSE_SELECT: &str = "SELECT
       c.id,
       c.course_code,
       c.title,
       c.description,
       c.semester,
       c.year,
       c.credits,
       c.instructor,
       (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = c.id) AS enrollment_count,
       c.created_at
     FROM courses c";

fn row_to_course(r: &rusqlite::Row<'_>) -> rusqlite::Result<CourseRow> {
    let semester: String = r.get(4)?;
    Ok(CourseRow {
        id: r.get(0)?,
        course_code: r.get(1)?,
        title: r.get(2)?,
        description: r.get(3)?,
        semester: Semester::parse(&semester).unwrap_or(Semester::Fall),
        year: r.get(5)?,
        credits: r.get(6)?,
        instructor: r.get(7)?,
        enrollment_count: r.get(8)?,
        created_at: r.get(9)?,
    })
}

fn get_course(conn: &Connection, course_id: &str) -> rusqlite::Result<Option<CourseRow>> {
    conn.query_row(
        &format!("{COURSE_SELECT} WHERE c.id = ?"),
        [course_id],
        row_to_course,
    )
    .optional()
}

pub fn course_exists(conn: &Connection, course_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row("SELECT 1 FROM courses WHERE id = ?", [course_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(|e| HandlerErr::db("db_query_failed", e))
}

pub fn enroll(conn: &Connection, course_id: &str, user_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO enrollments(course_id, user_id, enrolled_at) VALUES(?, ?, ?)",
        (course_id, user_id, db::now_timestamp()),
    )
}

fn parse_semester(raw: &str) -> Result<Semester, HandlerErr> {
    Semester::parse(raw)
        .ok_or_else(|| HandlerErr::bad_params("semester must be one of: Fall, Spring, Summer"))
}

fn parse_year(raw: &str) -> Result<String, HandlerErr> {
    if raw.chars().count() < 4 {
        return Err(HandlerErr::bad_params("year must be at least 4 digits"));
    }
    Ok(raw.to_string())
}

fn parse_credits(v: &Value) -> Result<i64, HandlerErr> {
    let n = match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match n {
        Some(n) if n > 0 => Ok(n),
        _ => Err(HandlerErr::bad_params("credits must be a positive integer")),
    }
}

fn non_empty(params: &Value, key: &str, message: &str) -> Result<Option<String>, HandlerErr> {
    match get_optional_str(params, key)? {
        Some(s) if s.is_empty() => Err(HandlerErr::bad_params(message)),
        other => Ok(other),
    }
}

fn courses_list(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let mut stmt = state
        .db
        .prepare(&format!("{COURSE_SELECT} ORDER BY c.course_code"))
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let courses = stmt
        .query_map([], row_to_course)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    Ok(json!({ "courses": courses }))
}

fn courses_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let course_code = get_required_str(&req.params, "courseCode")
        .map_err(|_| HandlerErr::bad_params("course code is required"))?;
    let title = get_required_str(&req.params, "title")
        .map_err(|_| HandlerErr::bad_params("course title is required"))?;
    let instructor = get_required_str(&req.params, "instructor")
        .map_err(|_| HandlerErr::bad_params("instructor is required"))?;
    let description = get_optional_str(&req.params, "description")?.filter(|s| !s.is_empty());
    let semester = parse_semester(&get_optional_str(&req.params, "semester")?.unwrap_or_default())?;
    let year = parse_year(&get_optional_str(&req.params, "year")?.unwrap_or_default())?;
    let credits = parse_credits(req.params.get("credits").unwrap_or(&Value::Null))?;

    let course_id = Uuid::new_v4().to_string();
    state
        .db
        .execute(
            "INSERT INTO courses(id, course_code, title, description, semester, year, credits, instructor, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &course_id,
                &course_code,
                &title,
                &description,
                semester.as_str(),
                &year,
                credits,
                &instructor,
                db::now_timestamp(),
            ),
        )
        .map_err(|e| {
            HandlerErr::db("db_insert_failed", e).with_details(json!({ "table": "courses" }))
        })?;
    tracing::info!(course_id = %course_id, course_code = %course_code, "course created");
    Ok(json!({ "courseId": course_id }))
}

fn courses_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let course_id = get_required_str(&req.params, "courseId")?;
    let Some(mut course) =
        get_course(&state.db, &course_id).map_err(|e| HandlerErr::db("db_query_failed", e))?
    else {
        return Err(HandlerErr::new("not_found", "course not found"));
    };

    if let Some(v) = non_empty(&req.params, "courseCode", "course code is required")? {
        course.course_code = v;
    }
    if let Some(v) = non_empty(&req.params, "title", "course title is required")? {
        course.title = v;
    }
    if let Some(v) = non_empty(&req.params, "instructor", "instructor is required")? {
        course.instructor = v;
    }
    if let Some(v) = get_optional_str(&req.params, "description")? {
        course.description = Some(v).filter(|s| !s.is_empty());
    }
    if let Some(v) = get_optional_str(&req.params, "semester")? {
        course.semester = parse_semester(&v)?;
    }
    if let Some(v) = get_optional_str(&req.params, "year")? {
        course.year = parse_year(&v)?;
    }
    if let Some(v) = req.params.get("credits").filter(|v| !v.is_null()) {
        course.credits = parse_credits(v)?;
    }

    state
        .db
        .execute(
            "UPDATE courses
             SET course_code = ?, title = ?, description = ?, semester = ?, year = ?, credits = ?, instructor = ?
             WHERE id = ?",
            (
                &course.course_code,
                &course.title,
                &course.description,
                course.semester.as_str(),
                &course.year,
                course.credits,
                &course.instructor,
                &course.id,
            ),
        )
        .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    Ok(json!({ "course": course }))
}

fn courses_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let course_id = get_required_str(&req.params, "courseId")?;
    if !course_exists(&state.db, &course_id)? {
        return Err(HandlerErr::new("not_found", "course not found"));
    }

    let tx = state
        .db
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    // No ON DELETE CASCADE; children first.
    tx.execute("DELETE FROM enrollments WHERE course_id = ?", [&course_id])
        .map_err(|e| {
            HandlerErr::db("db_delete_failed", e).with_details(json!({ "table": "enrollments" }))
        })?;
    tx.execute("DELETE FROM courses WHERE id = ?", [&course_id])
        .map_err(|e| {
            HandlerErr::db("db_delete_failed", e).with_details(json!({ "table": "courses" }))
        })?;
    tx.commit().map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    tracing::info!(course_id = %course_id, "course deleted");
    Ok(json!({ "ok": true }))
}

fn roster_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let course_id = get_required_str(&req.params, "courseId")?;
    if !course_exists(&state.db, &course_id)? {
        return Err(HandlerErr::new("not_found", "course not found"));
    }
    let mut stmt = state
        .db
        .prepare(
            "SELECT u.id, u.name, u.email, u.role, u.status, u.student_id, u.year, u.created_at
             FROM enrollments e
             JOIN users u ON u.id = e.user_id
             WHERE e.course_id = ?
             ORDER BY e.enrolled_at, u.name",
        )
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let students = stmt
        .query_map([&course_id], row_to_user)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    Ok(json!({ "courseId": course_id, "count": students.len(), "students": students }))
}

fn roster_remove(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let course_id = get_required_str(&req.params, "courseId")?;
    let user_id = get_required_str(&req.params, "userId")?;
    let removed = state
        .db
        .execute(
            "DELETE FROM enrollments WHERE course_id = ? AND user_id = ?",
            (&course_id, &user_id),
        )
        .map_err(|e| HandlerErr::db("db_delete_failed", e))?;
    if removed == 0 {
        return Err(HandlerErr::new("not_found", "enrollment not found"));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "courses.list" => courses_list(state, req),
        "courses.create" => courses_create(state, req),
        "courses.update" => courses_update(state, req),
        "courses.delete" => courses_delete(state, req),
        "courses.roster.list" => roster_list(state, req),
        "courses.roster.remove" => roster_remove(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
