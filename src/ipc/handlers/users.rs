use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{email_looks_valid, get_optional_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{Role, UserStatus};
use crate::roster::normalize_email;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    pub student_id: Option<String>,
    pub year: Option<String>,
    pub created_at: String,
}

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub role: Role,
    pub status: UserStatus,
    pub student_id: Option<&'a str>,
    pub year: Option<&'a str>,
}

pub fn row_to_user(r: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    let role: String = r.get(3)?;
    let status: String = r.get(4)?;
    Ok(UserRow {
        id: r.get(0)?,
        name: r.get(1)?,
        email: r.get(2)?,
        // Only this module writes these columns, always from the enums.
        role: Role::parse(&role).unwrap_or(Role::Student),
        status: UserStatus::parse(&status).unwrap_or(UserStatus::Inactive),
        student_id: r.get(5)?,
        year: r.get(6)?,
        created_at: r.get(7)?,
    })
}

const USER_COLUMNS: &str = "id, name, email, role, status, student_id, year, created_at";

pub fn list_users(conn: &Connection) -> rusqlite::Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at, rowid"
    ))?;
    let rows = stmt
        .query_map([], row_to_user)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn get_user(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"),
        [user_id],
        row_to_user,
    )
    .optional()
}

fn email_taken(conn: &Connection, email: &str, except_id: Option<&str>) -> anyhow::Result<bool> {
    let wanted = normalize_email(email);
    let mut stmt = conn.prepare("SELECT id, email FROM users")?;
    let mut rows = stmt.query([])?;
    while let Some(r) = rows.next()? {
        let id: String = r.get(0)?;
        let existing: String = r.get(1)?;
        if Some(id.as_str()) != except_id && normalize_email(&existing) == wanted {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn insert_user(conn: &Connection, user: &NewUser<'_>) -> rusqlite::Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO users(id, name, email, role, status, student_id, year, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            user.name,
            user.email,
            user.role.as_str(),
            user.status.as_str(),
            user.student_id,
            user.year,
            db::now_timestamp(),
        ),
    )?;
    Ok(id)
}

fn parse_role(raw: &str) -> Result<Role, HandlerErr> {
    Role::parse(raw).ok_or_else(|| {
        HandlerErr::bad_params("role must be one of: student, lecturer, coordinator, dean")
    })
}

fn matches_filter(u: &UserRow, search: &str, role: Option<Role>) -> bool {
    let matches_search = search.is_empty()
        || u.name.to_lowercase().contains(search)
        || u.email.to_lowercase().contains(search);
    let matches_role = role.map(|r| u.role == r).unwrap_or(true);
    matches_search && matches_role
}

fn users_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let search = get_optional_str(&req.params, "search")?
        .unwrap_or_default()
        .to_lowercase();
    let role = match get_optional_str(&req.params, "role")?.as_deref() {
        None | Some("") | Some("all") => None,
        Some(r) => Some(parse_role(r)?),
    };
    let users = list_users(&state.db).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let filtered = users
        .into_iter()
        .filter(|u| matches_filter(u, &search, role))
        .collect::<Vec<_>>();
    Ok(json!({ "count": filtered.len(), "users": filtered }))
}

fn users_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let name = get_optional_str(&req.params, "name")?.unwrap_or_default();
    let email = get_optional_str(&req.params, "email")?.unwrap_or_default();
    let role_raw = get_optional_str(&req.params, "role")?.unwrap_or_default();
    if name.is_empty() || email.is_empty() || role_raw.is_empty() {
        return Err(HandlerErr::bad_params("name, email and role are required"));
    }
    let role = parse_role(&role_raw)?;
    if !email_looks_valid(&email) {
        return Err(HandlerErr::bad_params("invalid email format"));
    }
    let taken = email_taken(&state.db, &email, None)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    if taken {
        return Err(HandlerErr::new("conflict", "email already exists")
            .with_details(json!({ "email": email })));
    }
    let student_id = get_optional_str(&req.params, "studentId")?.filter(|s| !s.is_empty());
    let year = get_optional_str(&req.params, "year")?.filter(|s| !s.is_empty());

    let user_id = insert_user(
        &state.db,
        &NewUser {
            name: &name,
            email: &email,
            role,
            status: UserStatus::Active,
            student_id: student_id.as_deref(),
            year: year.as_deref(),
        },
    )
    .map_err(|e| {
        HandlerErr::db("db_insert_failed", e).with_details(json!({ "table": "users" }))
    })?;
    tracing::info!(user_id = %user_id, role = role.as_str(), "user created");
    Ok(json!({ "userId": user_id }))
}

fn users_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let user_id = get_required_str(&req.params, "userId")?;
    let Some(mut user) =
        get_user(&state.db, &user_id).map_err(|e| HandlerErr::db("db_query_failed", e))?
    else {
        return Err(HandlerErr::new("not_found", "user not found"));
    };

    if let Some(name) = get_optional_str(&req.params, "name")? {
        if name.is_empty() {
            return Err(HandlerErr::bad_params("name must not be empty"));
        }
        user.name = name;
    }
    if let Some(email) = get_optional_str(&req.params, "email")? {
        if email.is_empty() || !email_looks_valid(&email) {
            return Err(HandlerErr::bad_params("invalid email format"));
        }
        let taken = email_taken(&state.db, &email, Some(&user_id))
            .map_err(|e| HandlerErr::db("db_query_failed", e))?;
        if taken {
            return Err(HandlerErr::new("conflict", "email already exists")
                .with_details(json!({ "email": email })));
        }
        user.email = email;
    }
    if let Some(role) = get_optional_str(&req.params, "role")? {
        user.role = parse_role(&role)?;
    }
    if let Some(status) = get_optional_str(&req.params, "status")? {
        user.status = UserStatus::parse(&status)
            .ok_or_else(|| HandlerErr::bad_params("status must be one of: Active, Inactive"))?;
    }

    state
        .db
        .execute(
            "UPDATE users SET name = ?, email = ?, role = ?, status = ? WHERE id = ?",
            (
                &user.name,
                &user.email,
                user.role.as_str(),
                user.status.as_str(),
                &user.id,
            ),
        )
        .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    Ok(json!({ "user": user }))
}

fn users_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let user_id = get_required_str(&req.params, "userId")?;
    let tx = state
        .db
        .unchecked_transaction()
        .map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    tx.execute("DELETE FROM enrollments WHERE user_id = ?", [&user_id])
        .map_err(|e| {
            HandlerErr::db("db_delete_failed", e).with_details(json!({ "table": "enrollments" }))
        })?;
    let deleted = tx
        .execute("DELETE FROM users WHERE id = ?", [&user_id])
        .map_err(|e| {
            HandlerErr::db("db_delete_failed", e).with_details(json!({ "table": "users" }))
        })?;
    if deleted == 0 {
        return Err(HandlerErr::new("not_found", "user not found"));
    }
    tx.commit().map_err(|e| HandlerErr::db("db_tx_failed", e))?;
    tracing::info!(user_id = %user_id, "user deleted");
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "users.list" => users_list(state, req),
        "users.create" => users_create(state, req),
        "users.update" => users_update(state, req),
        "users.delete" => users_delete(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, email: &str, role: Role) -> UserRow {
        UserRow {
            id: "u1".into(),
            name: name.into(),
            email: email.into(),
            role,
            status: UserStatus::Active,
            student_id: None,
            year: None,
            created_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn filter_matches_name_or_email_and_role() {
        let u = user("Dr. Sarah Lecturer", "sarah@university.edu", Role::Lecturer);
        assert!(matches_filter(&u, "", None));
        assert!(matches_filter(&u, "sarah", Some(Role::Lecturer)));
        assert!(matches_filter(&u, "university.edu", None));
        assert!(!matches_filter(&u, "sarah", Some(Role::Dean)));
        assert!(!matches_filter(&u, "mike", None));
    }
}
