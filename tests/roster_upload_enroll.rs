mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

fn course_id_by_code(courses: &serde_json::Value, code: &str) -> String {
    courses["courses"]
        .as_array()
        .expect("courses")
        .iter()
        .find(|c| c["courseCode"] == json!(code))
        .and_then(|c| c["id"].as_str())
        .expect("course id")
        .to_string()
}

#[test]
fn roster_apply_import_from_file_enrolls_accepted_students() {
    let workspace = temp_dir("rosterd-roster-upload");
    let csv_path = workspace.join("roster.csv");
    std::fs::write(
        &csv_path,
        "Student_ID , NAME, Email\n\n6831503101,Ada Lovelace,ada@u.edu\n6831503102,Alan Turing,jane@university.edu\n",
    )
    .expect("write roster csv");

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let courses = request_ok(&mut stdin, &mut reader, "1", "courses.list", json!({}));
    let cs402 = course_id_by_code(&courses, "CS402");
    assert_eq!(
        courses["courses"][1]["enrollmentCount"],
        json!(0),
        "{}",
        courses
    );

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "courses.roster.previewImport",
        json!({ "courseId": cs402, "inPath": csv_path.to_string_lossy() }),
    );
    assert_eq!(preview["summary"]["accepted"], json!(1));
    assert_eq!(preview["rejected"][0]["line"], json!(4));
    // Existing directory users are not enrolled by a roster upload.
    assert_eq!(preview["rejected"][0]["reason"], json!("duplicate_email"));

    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "courses.roster.applyImport",
        json!({ "courseId": cs402, "inPath": csv_path.to_string_lossy() }),
    );
    let enrolled = applied["enrolledUserIds"].as_array().expect("ids").clone();
    assert_eq!(enrolled.len(), 1);

    let roster = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "courses.roster.list",
        json!({ "courseId": cs402 }),
    );
    assert_eq!(roster["count"], json!(1));
    assert_eq!(roster["students"][0]["name"], json!("Ada Lovelace"));

    let removed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "courses.roster.remove",
        json!({ "courseId": cs402, "userId": enrolled[0] }),
    );
    assert_eq!(removed["ok"], json!(true));
    let again = request(
        &mut stdin,
        &mut reader,
        "6",
        "courses.roster.remove",
        json!({ "courseId": cs402, "userId": enrolled[0] }),
    );
    assert_eq!(error_code(&again), Some("not_found"));

    let courses = request_ok(&mut stdin, &mut reader, "7", "courses.list", json!({}));
    let cs402_row = courses["courses"]
        .as_array()
        .expect("courses")
        .iter()
        .find(|c| c["courseCode"] == json!("CS402"))
        .cloned()
        .expect("cs402");
    assert_eq!(cs402_row["enrollmentCount"], json!(0));
}

#[test]
fn roster_import_rejects_unknown_course_and_non_csv_paths() {
    let workspace = temp_dir("rosterd-roster-bad-input");
    let txt_path = workspace.join("roster.txt");
    std::fs::write(&txt_path, "student_id,name,email\n6831503101,Ada,ada@u.edu\n")
        .expect("write txt");

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let unknown = request(
        &mut stdin,
        &mut reader,
        "1",
        "courses.roster.applyImport",
        json!({ "courseId": "nope", "text": "student_id,name,email\n6831503101,Ada,ada@u.edu\n" }),
    );
    assert_eq!(error_code(&unknown), Some("not_found"));

    let courses = request_ok(&mut stdin, &mut reader, "2", "courses.list", json!({}));
    let cs401 = course_id_by_code(&courses, "CS401");
    let not_csv = request(
        &mut stdin,
        &mut reader,
        "3",
        "courses.roster.applyImport",
        json!({ "courseId": cs401, "inPath": txt_path.to_string_lossy() }),
    );
    assert_eq!(error_code(&not_csv), Some("bad_params"));

    let missing_file = request(
        &mut stdin,
        &mut reader,
        "4",
        "courses.roster.applyImport",
        json!({ "courseId": cs401, "inPath": workspace.join("absent.csv").to_string_lossy() }),
    );
    assert_eq!(error_code(&missing_file), Some("read_failed"));
}

#[test]
fn roster_template_is_accepted_by_the_importer() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let template = request_ok(&mut stdin, &mut reader, "1", "roster.template", json!({}));
    assert_eq!(template["fileName"], json!("student_roster_template.csv"));
    let text = template["text"].as_str().expect("template text").to_string();
    assert!(text.starts_with("student_id,name,email,year\n"));

    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "users.previewImport",
        json!({ "text": text }),
    );
    assert_eq!(
        preview["summary"],
        json!({ "total": 2, "accepted": 2, "rejected": 0 })
    );
}
