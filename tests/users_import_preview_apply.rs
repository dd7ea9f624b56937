mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar};

#[test]
fn users_import_preview_partitions_rows_without_writing() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let text = "student_id,name,email\n\
                6831503001,New Student,new.student@university.edu\n\
                6831503002,Duplicate John,JOHN@University.edu\n\
                12345,Bad Id,bad.id@university.edu\n\
                6831503004,,no.name@university.edu\n\
                6831503005,No At,no-at.university.edu\n";

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "users.previewImport",
        json!({ "text": text }),
    );
    assert_eq!(
        preview["summary"],
        json!({ "total": 5, "accepted": 1, "rejected": 4 })
    );
    assert_eq!(preview["accepted"][0]["studentId"], json!("6831503001"));
    assert_eq!(preview["accepted"][0]["role"], json!("student"));
    assert_eq!(preview["accepted"][0]["status"], json!("Active"));

    let reasons = preview["rejected"]
        .as_array()
        .expect("rejected array")
        .iter()
        .map(|r| (r["line"].as_i64().unwrap_or(0), r["reason"].as_str().unwrap_or("")))
        .collect::<Vec<_>>();
    assert_eq!(
        reasons,
        vec![
            (3, "duplicate_email"),
            (4, "invalid_student_id"),
            (5, "missing_required_data"),
            (6, "invalid_email"),
        ]
    );
    assert_eq!(preview["rejected"][0]["message"], json!("email already exists"));

    let users = request_ok(&mut stdin, &mut reader, "2", "users.list", json!({}));
    assert_eq!(users["count"], json!(6), "preview must not write: {}", users);
}

#[test]
fn users_apply_import_creates_students_and_second_run_is_all_duplicates() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let text = "student_id,name,email,year\n\
                6831503001,John Smith,john.smith@u.edu,2025\n\
                6831503001,Jane Roe,jane.roe@u.edu,\n";

    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "users.applyImport",
        json!({ "text": text }),
    );
    // student ids are not required to be unique, only emails
    assert_eq!(applied["summary"]["accepted"], json!(2));
    assert_eq!(
        applied["createdUserIds"].as_array().map(|a| a.len()),
        Some(2)
    );

    let students = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "users.list",
        json!({ "role": "student", "search": "6831503" }),
    );
    assert_eq!(students["count"], json!(0), "search matches name/email only");

    let students = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "users.list",
        json!({ "role": "student", "search": "@u.edu" }),
    );
    assert_eq!(students["count"], json!(2));
    let smith = students["users"]
        .as_array()
        .expect("users")
        .iter()
        .find(|u| u["email"] == json!("john.smith@u.edu"))
        .cloned()
        .expect("imported user");
    assert_eq!(smith["studentId"], json!("6831503001"));
    assert_eq!(smith["year"], json!("2025"));
    assert_eq!(smith["status"], json!("Active"));

    let again = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "users.applyImport",
        json!({ "text": text }),
    );
    assert_eq!(
        again["summary"],
        json!({ "total": 2, "accepted": 0, "rejected": 2 })
    );
    assert!(again["rejected"]
        .as_array()
        .expect("rejected")
        .iter()
        .all(|r| r["reason"] == json!("duplicate_email")));
}

#[test]
fn users_import_format_errors_abort_before_any_row() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let missing = request(
        &mut stdin,
        &mut reader,
        "1",
        "users.applyImport",
        json!({ "text": "name,email\nJohn,new@u.edu\n" }),
    );
    assert_eq!(error_code(&missing), Some("import_format"));
    assert_eq!(
        missing.pointer("/error/details/missingColumns"),
        Some(&json!(["student_id"]))
    );

    let header_only = request(
        &mut stdin,
        &mut reader,
        "2",
        "users.applyImport",
        json!({ "text": "student_id,name,email\n\n  \n" }),
    );
    assert_eq!(error_code(&header_only), Some("import_format"));

    let no_payload = request(&mut stdin, &mut reader, "3", "users.previewImport", json!({}));
    assert_eq!(error_code(&no_payload), Some("bad_params"));

    let users = request_ok(&mut stdin, &mut reader, "4", "users.list", json!({}));
    assert_eq!(users["count"], json!(6));
}
