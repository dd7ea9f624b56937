//! CSV roster import: header matching, per-row validation and the
//! accepted/rejected partition handed back to the directory.

use crate::model::{Role, UserStatus};
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

pub const REQUIRED_COLUMNS: [&str; 3] = ["student_id", "name", "email"];
pub const OPTIONAL_YEAR_COLUMN: &str = "year";

pub const DEFAULT_STUDENT_ID_PREFIX: &str = "6831503";
pub const DEFAULT_STUDENT_ID_DIGITS: u32 = 3;

/// Fatal problems with the shape of the file. Nothing is imported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportFormatError {
    #[error("file must contain at least a header row and one data row")]
    TooFewLines,
    #[error("missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },
}

impl ImportFormatError {
    pub fn missing_columns(&self) -> &[String] {
        match self {
            Self::TooFewLines => &[],
            Self::MissingColumns { missing } => missing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    #[serde(rename = "missing_required_data")]
    MissingRequiredData,
    #[serde(rename = "invalid_student_id")]
    InvalidStudentId,
    #[serde(rename = "invalid_email")]
    InvalidEmail,
    #[serde(rename = "duplicate_email")]
    DuplicateEmail,
}

impl RejectReason {
    pub fn code(self) -> &'static str {
        match self {
            Self::MissingRequiredData => "missing_required_data",
            Self::InvalidStudentId => "invalid_student_id",
            Self::InvalidEmail => "invalid_email",
            Self::DuplicateEmail => "duplicate_email",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::MissingRequiredData => "missing required data",
            Self::InvalidStudentId => "invalid student ID format",
            Self::InvalidEmail => "invalid email format",
            Self::DuplicateEmail => "email already exists",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Student-ID rule: a fixed institutional prefix followed by N ASCII digits.
#[derive(Debug, Clone)]
pub struct ImportRules {
    prefix: String,
    digits: u32,
    student_id: Regex,
}

impl ImportRules {
    pub fn new(prefix: &str, digits: u32) -> Result<Self, regex::Error> {
        let pattern = format!("^{}[0-9]{{{}}}$", regex::escape(prefix), digits);
        Ok(Self {
            prefix: prefix.to_string(),
            digits,
            student_id: Regex::new(&pattern)?,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }

    pub fn is_valid_student_id(&self, id: &str) -> bool {
        self.student_id.is_match(id)
    }

    /// Sample ID with the given numeric suffix, zero padded to the rule width.
    pub fn sample_student_id(&self, n: u32) -> String {
        format!("{}{:0width$}", self.prefix, n, width = self.digits as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedRecord {
    pub line: usize,
    pub student_id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    pub role: Role,
    pub status: UserStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub line: usize,
    pub reason: RejectReason,
    pub message: String,
    pub student_id: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RosterImport {
    pub accepted: Vec<AcceptedRecord>,
    pub rejected: Vec<Rejection>,
    pub summary: ImportSummary,
}

pub fn normalize_email(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Splits one CSV line. A field that opens with `"` may contain commas and
/// `""` escapes; a quote anywhere else in a field is a literal character.
pub fn parse_csv_record(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut field_started = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    buf.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => buf.push(ch),
            }
            continue;
        }
        match ch {
            ',' => {
                out.push(std::mem::take(&mut buf));
                field_started = false;
            }
            '"' if !field_started => {
                // Leading blanks before an opening quote are dropped.
                buf.clear();
                in_quotes = true;
                field_started = true;
            }
            c if c.is_whitespace() && !field_started => buf.push(c),
            c => {
                buf.push(c);
                field_started = true;
            }
        }
    }
    out.push(buf);
    out
}

struct ColumnMap {
    student_id: usize,
    name: usize,
    email: usize,
    year: Option<usize>,
}

fn map_columns(header: &str) -> Result<ColumnMap, ImportFormatError> {
    let mut idx = HashMap::<String, usize>::new();
    for (i, h) in parse_csv_record(header).into_iter().enumerate() {
        idx.entry(h.trim().to_lowercase()).or_insert(i);
    }

    let missing = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !idx.contains_key(**c))
        .map(|c| c.to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(ImportFormatError::MissingColumns { missing });
    }

    Ok(ColumnMap {
        student_id: idx["student_id"],
        name: idx["name"],
        email: idx["email"],
        year: idx.get(OPTIONAL_YEAR_COLUMN).copied(),
    })
}

fn field(fields: &[String], col: usize) -> &str {
    fields.get(col).map(|s| s.trim()).unwrap_or("")
}

/// Parses and validates roster text against a snapshot of the emails that
/// already exist. Row problems are collected in `rejected`; only a malformed
/// file shape returns `Err`.
pub fn import_roster<I, S>(
    text: &str,
    existing_emails: I,
    rules: &ImportRules,
) -> Result<RosterImport, ImportFormatError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| (i + 1, l))
        .collect::<Vec<_>>();
    if lines.len() < 2 {
        return Err(ImportFormatError::TooFewLines);
    }

    let cols = map_columns(lines[0].1)?;

    let mut seen = existing_emails
        .into_iter()
        .map(|e| normalize_email(e.as_ref()))
        .collect::<HashSet<_>>();
    let mut out = RosterImport::default();

    for &(line, raw) in &lines[1..] {
        let fields = parse_csv_record(raw);
        let student_id = field(&fields, cols.student_id);
        let name = field(&fields, cols.name);
        let email = field(&fields, cols.email);

        let reason = if student_id.is_empty() || name.is_empty() || email.is_empty() {
            Some(RejectReason::MissingRequiredData)
        } else if !rules.is_valid_student_id(student_id) {
            Some(RejectReason::InvalidStudentId)
        } else if !email.contains('@') {
            Some(RejectReason::InvalidEmail)
        } else if seen.contains(&normalize_email(email)) {
            Some(RejectReason::DuplicateEmail)
        } else {
            None
        };

        if let Some(reason) = reason {
            tracing::debug!(line, reason = reason.code(), "roster row rejected");
            out.rejected.push(Rejection {
                line,
                reason,
                message: reason.message().to_string(),
                student_id: student_id.to_string(),
                email: email.to_string(),
            });
            continue;
        }

        seen.insert(normalize_email(email));
        let year = cols
            .year
            .map(|c| field(&fields, c))
            .filter(|y| !y.is_empty())
            .map(str::to_string);
        out.accepted.push(AcceptedRecord {
            line,
            student_id: student_id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            year,
            role: Role::Student,
            status: UserStatus::Active,
        });
    }

    out.summary = ImportSummary {
        total: out.accepted.len() + out.rejected.len(),
        accepted: out.accepted.len(),
        rejected: out.rejected.len(),
    };
    Ok(out)
}

/// Downloadable template matching the columns the importer reads.
pub fn roster_template(rules: &ImportRules) -> String {
    format!(
        "student_id,name,email,year\n{},John Doe,john.doe@university.edu,2024\n{},Jane Smith,jane.smith@university.edu,2024\n",
        rules.sample_student_id(1),
        rules.sample_student_id(2)
    )
}
