use crate::config::Config;
use crate::model::{Impact, ProjectStatus, ProjectType, Role, Semester, UserStatus};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

/// Opens the process-lifetime store. Everything lives in an in-memory SQLite
/// database and is discarded on exit.
pub fn open_db(config: &Config) -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            role TEXT NOT NULL,
            status TEXT NOT NULL,
            student_id TEXT,
            year TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            course_code TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            semester TEXT NOT NULL,
            year TEXT NOT NULL,
            credits INTEGER NOT NULL,
            instructor TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            course_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            enrolled_at TEXT NOT NULL,
            PRIMARY KEY(course_id, user_id),
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_user ON enrollments(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS projects(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            project_type TEXT NOT NULL,
            status TEXT NOT NULL,
            impact TEXT,
            description TEXT NOT NULL,
            course TEXT,
            year TEXT,
            semester TEXT,
            advisor TEXT,
            owner_id TEXT,
            students_json TEXT NOT NULL,
            keywords_json TEXT NOT NULL,
            links_json TEXT NOT NULL,
            details_json TEXT NOT NULL,
            completion_date TEXT,
            submission_date TEXT,
            lecturer_feedback TEXT,
            coordinator_feedback TEXT,
            created_at TEXT NOT NULL,
            last_modified TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_projects_status ON projects(status)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    if config.seed_demo {
        seed_demo(&conn)?;
    }

    Ok(conn)
}

pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn seed_demo(conn: &Connection) -> anyhow::Result<()> {
    let users = [
        ("John Student", "john@university.edu", Role::Student, UserStatus::Active),
        ("Jane Doe", "jane@university.edu", Role::Student, UserStatus::Active),
        ("Dr. Sarah Lecturer", "sarah@university.edu", Role::Lecturer, UserStatus::Active),
        ("Prof. Mike Coordinator", "mike@university.edu", Role::Coordinator, UserStatus::Active),
        ("Dr. Lisa Dean", "lisa@university.edu", Role::Dean, UserStatus::Active),
        ("Alex Kim", "alex@university.edu", Role::Student, UserStatus::Inactive),
    ];
    let now = now_timestamp();
    let tx = conn.unchecked_transaction()?;
    let mut student_ids = Vec::new();
    let mut owner_id: Option<String> = None;
    for (name, email, role, status) in users {
        let id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO users(id, name, email, role, status, created_at) VALUES(?, ?, ?, ?, ?, ?)",
            (&id, name, email, role.as_str(), status.as_str(), &now),
        )?;
        if owner_id.is_none() && role == Role::Student {
            owner_id = Some(id.clone());
        }
        if role == Role::Student && status == UserStatus::Active {
            student_ids.push(id);
        }
    }

    let courses = [
        (
            "CS401",
            "Software Engineering Capstone",
            "Final year capstone project course",
            Semester::Fall,
            6,
            "Dr. Smith",
        ),
        (
            "CS402",
            "Advanced Database Systems",
            "Advanced concepts in database design and implementation",
            Semester::Spring,
            3,
            "Dr. Johnson",
        ),
    ];
    let mut first_course: Option<String> = None;
    for (code, title, description, semester, credits, instructor) in courses {
        let id = Uuid::new_v4().to_string();
        tx.execute(
            "INSERT INTO courses(id, course_code, title, description, semester, year, credits, instructor, created_at)
             VALUES(?, ?, ?, ?, ?, '2024', ?, ?, ?)",
            (&id, code, title, description, semester.as_str(), credits, instructor, &now),
        )?;
        if first_course.is_none() {
            first_course = Some(id);
        }
    }

    if let Some(course_id) = first_course {
        for sid in &student_ids {
            tx.execute(
                "INSERT INTO enrollments(course_id, user_id, enrolled_at) VALUES(?, ?, ?)",
                (&course_id, sid, &now),
            )?;
        }
    }
    seed_projects(&tx, owner_id.as_deref(), &now)?;
    tx.commit()?;
    Ok(())
}

struct SeedProject {
    title: &'static str,
    project_type: ProjectType,
    status: ProjectStatus,
    impact: Option<Impact>,
    description: &'static str,
    students: &'static [&'static str],
    advisor: &'static str,
    keywords: &'static [&'static str],
    year: &'static str,
    semester: Semester,
    completion_date: Option<&'static str>,
    details: serde_json::Value,
}

/// Archive entries plus the first demo student's in-flight work. Projects
/// listing "John Student" are owned by that user.
fn seed_projects(conn: &Connection, owner_id: Option<&str>, now: &str) -> anyhow::Result<()> {
    let projects = [
        SeedProject {
            title: "AI-Powered Learning Management System",
            project_type: ProjectType::Capstone,
            status: ProjectStatus::Approved,
            impact: Some(Impact::High),
            description: "A comprehensive learning management system enhanced with artificial intelligence to personalize learning experiences and provide intelligent tutoring.",
            students: &["John Student", "Jane Doe", "Alex Kim"],
            advisor: "Dr. Sarah Lecturer",
            keywords: &["AI", "Machine Learning", "Education", "LMS"],
            year: "2024",
            semester: Semester::Spring,
            completion_date: Some("2024-03-15"),
            details: serde_json::json!({}),
        },
        SeedProject {
            title: "Blockchain-Based Supply Chain Tracking",
            project_type: ProjectType::CompetitionWork,
            status: ProjectStatus::Approved,
            impact: Some(Impact::High),
            description: "Innovative blockchain solution for transparent supply chain tracking, winning first place at the National Tech Innovation Competition.",
            students: &["Mike Wilson", "Sarah Chen"],
            advisor: "Prof. David Tech",
            keywords: &["Blockchain", "Supply Chain", "Web3", "Transparency"],
            year: "2024",
            semester: Semester::Spring,
            completion_date: Some("2024-02-20"),
            details: serde_json::json!({ "award": "1st Place - National Tech Innovation Competition" }),
        },
        SeedProject {
            title: "Mental Health Support Mobile App",
            project_type: ProjectType::SocialService,
            status: ProjectStatus::Approved,
            impact: Some(Impact::Medium),
            description: "Mobile application providing mental health resources and peer support for university students, serving over 1000 students.",
            students: &["Emily Rodriguez", "James Park"],
            advisor: "Dr. Lisa Psychology",
            keywords: &["Mental Health", "Mobile App", "Social Service", "Support"],
            year: "2023",
            semester: Semester::Fall,
            completion_date: Some("2023-12-10"),
            details: serde_json::json!({ "beneficiaryOrganization": "University Counseling Center" }),
        },
        SeedProject {
            title: "Renewable Energy Optimization Algorithm",
            project_type: ProjectType::AcademicPublication,
            status: ProjectStatus::Approved,
            impact: Some(Impact::High),
            description: "Novel optimization algorithm for renewable energy distribution, published in IEEE Transactions on Smart Grid.",
            students: &["Robert Green", "Anna Solar"],
            advisor: "Prof. Energy Expert",
            keywords: &["Renewable Energy", "Optimization", "Smart Grid", "Algorithm"],
            year: "2023",
            semester: Semester::Fall,
            completion_date: Some("2023-11-15"),
            details: serde_json::json!({
                "publicationVenue": "IEEE Transactions on Smart Grid",
                "doi": "https://doi.org/10.1109/TSG.2023.example"
            }),
        },
        SeedProject {
            title: "Augmented Reality Campus Navigation",
            project_type: ProjectType::Capstone,
            status: ProjectStatus::Approved,
            impact: Some(Impact::Medium),
            description: "AR-based navigation system to help new students and visitors navigate the university campus with interactive 3D directions.",
            students: &["Chris AR", "Diana Virtual"],
            advisor: "Dr. Computer Vision",
            keywords: &["Augmented Reality", "Navigation", "Mobile", "Campus"],
            year: "2023",
            semester: Semester::Spring,
            completion_date: Some("2023-05-20"),
            details: serde_json::json!({}),
        },
        SeedProject {
            title: "Mobile App for Community Gardens",
            project_type: ProjectType::SocialService,
            status: ProjectStatus::UnderReview,
            impact: Some(Impact::Medium),
            description: "Mobile application to connect community members with local gardens.",
            students: &["John Student"],
            advisor: "Dr. Sarah Lecturer",
            keywords: &["Community", "Mobile App"],
            year: "2024",
            semester: Semester::Summer,
            completion_date: None,
            details: serde_json::json!({}),
        },
        SeedProject {
            title: "Blockchain Voting System",
            project_type: ProjectType::CompetitionWork,
            status: ProjectStatus::Draft,
            impact: None,
            description: "Secure and transparent voting system using blockchain technology.",
            students: &["John Student", "Mike Wilson"],
            advisor: "Dr. Sarah Lecturer",
            keywords: &["Blockchain", "Voting"],
            year: "2024",
            semester: Semester::Fall,
            completion_date: None,
            details: serde_json::json!({}),
        },
    ];

    for p in projects {
        let owner = if p.students.contains(&"John Student") {
            owner_id
        } else {
            None
        };
        let submitted = (p.status != ProjectStatus::Draft).then_some(now);
        conn.execute(
            "INSERT INTO projects(
                id, title, project_type, status, impact, description, year, semester, advisor,
                owner_id, students_json, keywords_json, links_json, details_json,
                completion_date, submission_date, created_at, last_modified
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, '[]', ?, ?, ?, ?, ?)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                p.title,
                p.project_type.as_str(),
                p.status.as_str(),
                p.impact.map(Impact::as_str),
                p.description,
                p.year,
                p.semester.as_str(),
                p.advisor,
                owner,
                serde_json::to_string(p.students)?,
                serde_json::to_string(p.keywords)?,
                serde_json::to_string(&p.details)?,
                p.completion_date,
                submitted,
                now,
                now,
            ],
        )?;
    }
    Ok(())
}

pub fn user_emails(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT email FROM users")?;
    let emails = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(emails)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}
