use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_optional_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{Impact, ProjectStatus, ProjectType, Role, Semester};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectRow {
    id: String,
    title: String,
    #[serde(rename = "type")]
    project_type: ProjectType,
    status: ProjectStatus,
    impact: Option<Impact>,
    description: String,
    course: Option<String>,
    year: Option<String>,
    semester: Option<Semester>,
    advisor: Option<String>,
    owner_id: Option<String>,
    students: Vec<String>,
    keywords: Vec<String>,
    external_links: Vec<String>,
    details: Map<String, Value>,
    completion_date: Option<String>,
    submission_date: Option<String>,
    lecturer_feedback: Option<String>,
    coordinator_feedback: Option<String>,
    created_at: String,
    last_modified: String,
}

const PROJECT_COLUMNS: &str = "id, title, project_type, status, impact, description, course, year,
    semester, advisor, owner_id, students_json, keywords_json, links_json, details_json,
    completion_date, submission_date, lecturer_feedback, coordinator_feedback, created_at,
    last_modified";

fn json_col<T: DeserializeOwned>(r: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = r.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_project(r: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectRow> {
    let project_type: String = r.get(2)?;
    let status: String = r.get(3)?;
    let impact: Option<String> = r.get(4)?;
    let semester: Option<String> = r.get(8)?;
    Ok(ProjectRow {
        id: r.get(0)?,
        title: r.get(1)?,
        project_type: ProjectType::parse(&project_type).unwrap_or(ProjectType::Other),
        status: ProjectStatus::parse(&status).unwrap_or(ProjectStatus::Draft),
        impact: impact.as_deref().and_then(Impact::parse),
        description: r.get(5)?,
        course: r.get(6)?,
        year: r.get(7)?,
        semester: semester.as_deref().and_then(Semester::parse),
        advisor: r.get(9)?,
        owner_id: r.get(10)?,
        students: json_col(r, 11)?,
        keywords: json_col(r, 12)?,
        external_links: json_col(r, 13)?,
        details: json_col(r, 14)?,
        completion_date: r.get(15)?,
        submission_date: r.get(16)?,
        lecturer_feedback: r.get(17)?,
        coordinator_feedback: r.get(18)?,
        created_at: r.get(19)?,
        last_modified: r.get(20)?,
    })
}

fn list_projects(conn: &Connection) -> rusqlite::Result<Vec<ProjectRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at, rowid"
    ))?;
    let rows = stmt
        .query_map([], row_to_project)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn get_project(conn: &Connection, project_id: &str) -> rusqlite::Result<Option<ProjectRow>> {
    conn.query_row(
        &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?"),
        [project_id],
        row_to_project,
    )
    .optional()
}

fn load_project(conn: &Connection, project_id: &str) -> Result<ProjectRow, HandlerErr> {
    get_project(conn, project_id)
        .map_err(|e| HandlerErr::db("db_query_failed", e))?
        .ok_or_else(|| HandlerErr::new("not_found", "project not found"))
}

fn load_user(conn: &Connection, user_id: &str) -> Result<(String, Role), HandlerErr> {
    let row = conn
        .query_row(
            "SELECT name, role FROM users WHERE id = ?",
            [user_id],
            |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
        )
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let Some((name, role)) = row else {
        return Err(HandlerErr::new("not_found", "user not found"));
    };
    let role = Role::parse(&role)
        .ok_or_else(|| HandlerErr::new("db_query_failed", format!("unknown role: {}", role)))?;
    Ok((name, role))
}

fn encode<T: Serialize + ?Sized>(v: &T) -> Result<String, HandlerErr> {
    serde_json::to_string(v).map_err(|e| HandlerErr::new("bad_params", e.to_string()))
}

fn save_project(conn: &Connection, p: &ProjectRow) -> Result<(), HandlerErr> {
    conn.execute(
        "UPDATE projects
         SET title = ?, project_type = ?, status = ?, impact = ?, description = ?, course = ?,
             year = ?, semester = ?, advisor = ?, students_json = ?, keywords_json = ?,
             links_json = ?, details_json = ?, completion_date = ?, submission_date = ?,
             lecturer_feedback = ?, coordinator_feedback = ?, last_modified = ?
         WHERE id = ?",
        rusqlite::params![
            p.title,
            p.project_type.as_str(),
            p.status.as_str(),
            p.impact.map(Impact::as_str),
            p.description,
            p.course,
            p.year,
            p.semester.map(Semester::as_str),
            p.advisor,
            encode(&p.students)?,
            encode(&p.keywords)?,
            encode(&p.external_links)?,
            encode(&p.details)?,
            p.completion_date,
            p.submission_date,
            p.lecturer_feedback,
            p.coordinator_feedback,
            p.last_modified,
            p.id,
        ],
    )
    .map_err(|e| HandlerErr::db("db_update_failed", e))?;
    Ok(())
}

/// Type-specific extras; keys belonging to other types are dropped.
fn detail_keys(project_type: ProjectType) -> &'static [&'static str] {
    match project_type {
        ProjectType::CompetitionWork => &["competitionName", "award"],
        ProjectType::AcademicPublication => &["publicationVenue", "doi"],
        ProjectType::SocialService => &["beneficiaryOrganization"],
        ProjectType::Capstone | ProjectType::Other => &[],
    }
}

fn details_for_type(
    project_type: ProjectType,
    current: &Map<String, Value>,
    params: &Value,
) -> Result<Map<String, Value>, HandlerErr> {
    let mut out = Map::new();
    for key in detail_keys(project_type) {
        let value = match get_optional_str(params, key)? {
            Some(v) => Some(v),
            None => current.get(*key).and_then(|v| v.as_str()).map(str::to_string),
        };
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            out.insert((*key).to_string(), Value::String(v));
        }
    }
    Ok(out)
}

/// Trimmed, non-empty, first occurrence kept.
fn get_str_list(params: &Value, key: &str) -> Result<Option<Vec<String>>, HandlerErr> {
    let items = match params.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(HandlerErr::bad_params(format!("{} must be an array", key))),
    };
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let s = item
            .as_str()
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must contain strings", key)))?
            .trim();
        if !s.is_empty() && !out.iter().any(|x| x == s) {
            out.push(s.to_string());
        }
    }
    Ok(Some(out))
}

fn non_empty_opt(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    Ok(get_optional_str(params, key)?.filter(|s| !s.is_empty()))
}

/// `None` for absent, empty, or `all`.
fn filter_param(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    Ok(non_empty_opt(params, key)?.filter(|s| !s.eq_ignore_ascii_case("all")))
}

fn parse_type(raw: &str) -> Result<ProjectType, HandlerErr> {
    ProjectType::parse(raw).ok_or_else(|| {
        HandlerErr::bad_params(
            "type must be one of: Capstone, Competition Work, Academic Publication, Social Service, Other",
        )
    })
}

fn parse_impact(raw: &str) -> Result<Impact, HandlerErr> {
    Impact::parse(raw).ok_or_else(|| HandlerErr::bad_params("impact must be one of: High, Medium, Low"))
}

fn parse_semester(raw: &str) -> Result<Semester, HandlerErr> {
    Semester::parse(raw)
        .ok_or_else(|| HandlerErr::bad_params("semester must be one of: Fall, Spring, Summer"))
}

#[derive(Default)]
struct ProjectFilter {
    search: String,
    project_type: Option<ProjectType>,
    year: Option<String>,
    impact: Option<Impact>,
    status: Option<ProjectStatus>,
    /// (user id, display name): owned by the user or listing them as a student.
    member: Option<(String, String)>,
}

impl ProjectFilter {
    fn matches(&self, p: &ProjectRow) -> bool {
        let needle = self.search.as_str();
        let contains = |s: &str| s.to_lowercase().contains(needle);
        let matches_search = needle.is_empty()
            || contains(&p.title)
            || contains(&p.description)
            || p.keywords.iter().any(|k| contains(k))
            || p.students.iter().any(|s| contains(s))
            || p.advisor.as_deref().map(contains).unwrap_or(false);
        let matches_member = match &self.member {
            None => true,
            Some((id, name)) => {
                p.owner_id.as_deref() == Some(id.as_str()) || p.students.iter().any(|s| s == name)
            }
        };
        matches_search
            && matches_member
            && self.project_type.map(|t| p.project_type == t).unwrap_or(true)
            && self.year.as_deref().map(|y| p.year.as_deref() == Some(y)).unwrap_or(true)
            && self.impact.map(|i| p.impact == Some(i)).unwrap_or(true)
            && self.status.map(|s| p.status == s).unwrap_or(true)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReviewAction {
    Approve,
    RequestRevision,
    Reject,
}

impl ReviewAction {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Some(Self::Approve),
            "request_revision" => Some(Self::RequestRevision),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Lecturers review `Submitted` work and forward approvals to the
/// coordinator; coordinators make the final call on `Under Review` work.
/// A revision request sends the project back to its authors as a draft.
fn review_outcome(role: Role, status: ProjectStatus, action: ReviewAction) -> Option<ProjectStatus> {
    let approved = match (role, status) {
        (Role::Lecturer, ProjectStatus::Submitted) => ProjectStatus::UnderReview,
        (Role::Coordinator, ProjectStatus::UnderReview) => ProjectStatus::Approved,
        _ => return None,
    };
    Some(match action {
        ReviewAction::Approve => approved,
        ReviewAction::RequestRevision => ProjectStatus::Draft,
        ReviewAction::Reject => ProjectStatus::Rejected,
    })
}

fn projects_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let mut filter = ProjectFilter {
        search: get_optional_str(&req.params, "search")?
            .unwrap_or_default()
            .to_lowercase(),
        ..ProjectFilter::default()
    };
    if let Some(v) = filter_param(&req.params, "type")? {
        filter.project_type = Some(parse_type(&v)?);
    }
    if let Some(v) = filter_param(&req.params, "impact")? {
        filter.impact = Some(parse_impact(&v)?);
    }
    if let Some(v) = filter_param(&req.params, "status")? {
        filter.status = Some(
            ProjectStatus::parse(&v).ok_or_else(|| HandlerErr::bad_params("unknown status"))?,
        );
    }
    filter.year = filter_param(&req.params, "year")?;
    let archive = req
        .params
        .get("archive")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if archive {
        if filter.status.is_some_and(|s| s != ProjectStatus::Approved) {
            return Ok(json!({ "count": 0, "projects": [] }));
        }
        filter.status = Some(ProjectStatus::Approved);
    }
    if let Some(user_id) = non_empty_opt(&req.params, "userId")? {
        let (name, _) = load_user(&state.db, &user_id)?;
        filter.member = Some((user_id, name));
    }

    let projects = list_projects(&state.db).map_err(|e| HandlerErr::db("db_query_failed", e))?;
    let filtered = projects
        .into_iter()
        .filter(|p| filter.matches(p))
        .collect::<Vec<_>>();
    Ok(json!({ "count": filtered.len(), "projects": filtered }))
}

fn projects_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let project_id = get_required_str(&req.params, "projectId")?;
    let project = load_project(&state.db, &project_id)?;
    Ok(json!({ "project": project }))
}

fn projects_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let user_id = get_required_str(&req.params, "userId")?;
    let title = non_empty_opt(&req.params, "title")?;
    let type_raw = non_empty_opt(&req.params, "type")?;
    let description = non_empty_opt(&req.params, "description")?;
    let (Some(title), Some(type_raw), Some(description)) = (title, type_raw, description) else {
        return Err(HandlerErr::bad_params("title, type and description are required"));
    };
    let project_type = parse_type(&type_raw)?;
    let draft = req
        .params
        .get("draft")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let (author, author_role) = load_user(&state.db, &user_id)?;

    let mut students = get_str_list(&req.params, "students")?.unwrap_or_default();
    if author_role == Role::Student && !students.contains(&author) {
        students.insert(0, author);
    }
    let semester = non_empty_opt(&req.params, "semester")?
        .map(|s| parse_semester(&s))
        .transpose()?;
    let now = db::now_timestamp();
    let status = if draft {
        ProjectStatus::Draft
    } else {
        ProjectStatus::Submitted
    };
    let project = ProjectRow {
        id: Uuid::new_v4().to_string(),
        title,
        project_type,
        status,
        impact: None,
        description,
        course: non_empty_opt(&req.params, "course")?,
        year: non_empty_opt(&req.params, "year")?,
        semester,
        advisor: non_empty_opt(&req.params, "advisor")?,
        owner_id: Some(user_id),
        students,
        keywords: get_str_list(&req.params, "keywords")?.unwrap_or_default(),
        external_links: get_str_list(&req.params, "externalLinks")?.unwrap_or_default(),
        details: details_for_type(project_type, &Map::new(), &req.params)?,
        completion_date: non_empty_opt(&req.params, "completionDate")?,
        submission_date: (!draft).then(|| now.clone()),
        lecturer_feedback: None,
        coordinator_feedback: None,
        created_at: now.clone(),
        last_modified: now,
    };

    state
        .db
        .execute(
            "INSERT INTO projects(
                id, title, project_type, status, description, owner_id, students_json,
                keywords_json, links_json, details_json, created_at, last_modified
             ) VALUES(?, ?, ?, ?, ?, ?, '[]', '[]', '[]', '{}', ?, ?)",
            (
                &project.id,
                &project.title,
                project.project_type.as_str(),
                project.status.as_str(),
                &project.description,
                &project.owner_id,
                &project.created_at,
                &project.last_modified,
            ),
        )
        .map_err(|e| {
            HandlerErr::db("db_insert_failed", e).with_details(json!({ "table": "projects" }))
        })?;
    save_project(&state.db, &project)?;
    tracing::info!(
        project_id = %project.id,
        status = project.status.as_str(),
        "project created"
    );
    Ok(json!({ "project": project }))
}

fn projects_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let project_id = get_required_str(&req.params, "projectId")?;
    let mut project = load_project(&state.db, &project_id)?;
    if project.status != ProjectStatus::Draft {
        return Err(HandlerErr::new("conflict", "only draft projects can be edited")
            .with_details(json!({ "status": project.status })));
    }

    for (key, slot) in [("title", &mut project.title), ("description", &mut project.description)] {
        if let Some(v) = get_optional_str(&req.params, key)? {
            if v.is_empty() {
                return Err(HandlerErr::bad_params(format!("{} must not be empty", key)));
            }
            *slot = v;
        }
    }
    if let Some(v) = get_optional_str(&req.params, "type")? {
        project.project_type = parse_type(&v)?;
    }
    for (key, slot) in [
        ("course", &mut project.course),
        ("year", &mut project.year),
        ("advisor", &mut project.advisor),
        ("completionDate", &mut project.completion_date),
    ] {
        if let Some(v) = get_optional_str(&req.params, key)? {
            *slot = Some(v).filter(|s| !s.is_empty());
        }
    }
    if let Some(v) = get_optional_str(&req.params, "semester")? {
        project.semester = Some(v).filter(|s| !s.is_empty()).map(|s| parse_semester(&s)).transpose()?;
    }
    if let Some(v) = get_str_list(&req.params, "students")? {
        project.students = v;
    }
    if let Some(v) = get_str_list(&req.params, "keywords")? {
        project.keywords = v;
    }
    if let Some(v) = get_str_list(&req.params, "externalLinks")? {
        project.external_links = v;
    }
    project.details = details_for_type(project.project_type, &project.details, &req.params)?;
    project.last_modified = db::now_timestamp();

    save_project(&state.db, &project)?;
    Ok(json!({ "project": project }))
}

fn projects_submit(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let project_id = get_required_str(&req.params, "projectId")?;
    let mut project = load_project(&state.db, &project_id)?;
    if project.status != ProjectStatus::Draft {
        return Err(HandlerErr::new("conflict", "only draft projects can be submitted")
            .with_details(json!({ "status": project.status })));
    }
    let now = db::now_timestamp();
    project.status = ProjectStatus::Submitted;
    project.submission_date = Some(now.clone());
    project.last_modified = now;
    save_project(&state.db, &project)?;
    tracing::info!(project_id = %project.id, "project submitted");
    Ok(json!({ "project": project }))
}

fn projects_review(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let project_id = get_required_str(&req.params, "projectId")?;
    let reviewer_id = get_required_str(&req.params, "reviewerId")?;
    let action_raw = get_required_str(&req.params, "action")?;
    let action = ReviewAction::parse(&action_raw).ok_or_else(|| {
        HandlerErr::bad_params("action must be one of: approve, request_revision, reject")
    })?;
    let feedback = non_empty_opt(&req.params, "feedback")?;
    if feedback.is_none() && action != ReviewAction::Approve {
        return Err(HandlerErr::bad_params("feedback is required unless approving"));
    }
    let impact = non_empty_opt(&req.params, "impact")?
        .map(|s| parse_impact(&s))
        .transpose()?;

    let mut project = load_project(&state.db, &project_id)?;
    let (_, role) = load_user(&state.db, &reviewer_id)?;
    let Some(next) = review_outcome(role, project.status, action) else {
        return Err(HandlerErr::new("forbidden", "reviewer cannot review this project")
            .with_details(json!({ "role": role, "status": project.status })));
    };

    if feedback.is_some() {
        match role {
            Role::Coordinator => project.coordinator_feedback = feedback,
            _ => project.lecturer_feedback = feedback,
        }
    }
    if impact.is_some() {
        project.impact = impact;
    }
    project.status = next;
    project.last_modified = db::now_timestamp();
    save_project(&state.db, &project)?;
    tracing::info!(
        project_id = %project.id,
        reviewer = role.as_str(),
        status = next.as_str(),
        "project reviewed"
    );
    Ok(json!({ "project": project }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "projects.list" => projects_list(state, req),
        "projects.get" => projects_get(state, req),
        "projects.create" => projects_create(state, req),
        "projects.update" => projects_update(state, req),
        "projects.submit" => projects_submit(state, req),
        "projects.review" => projects_review(state, req),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
