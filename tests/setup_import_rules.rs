mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, spawn_sidecar_with_env};

#[test]
fn setup_import_defaults_and_update_change_student_id_rule() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let setup = request_ok(&mut stdin, &mut reader, "1", "setup.get", json!({ "section": "import" }));
    assert_eq!(
        setup["import"],
        json!({ "studentIdPrefix": "6831503", "studentIdDigits": 3 })
    );

    let text = "student_id,name,email\n6831503001,Old Rule,old@u.edu\nAB1234,New Rule,new@u.edu\n";
    let before = request_ok(&mut stdin, &mut reader, "2", "users.previewImport", json!({ "text": text }));
    assert_eq!(before["accepted"][0]["email"], json!("old@u.edu"));
    assert_eq!(before["rejected"][0]["reason"], json!("invalid_student_id"));

    let bad = request(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "import", "patch": { "studentIdDigits": 12 } }),
    );
    assert_eq!(error_code(&bad), Some("bad_params"));
    let unknown = request(
        &mut stdin,
        &mut reader,
        "4",
        "setup.update",
        json!({ "section": "printer", "patch": {} }),
    );
    assert_eq!(error_code(&unknown), Some("bad_params"));

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "setup.update",
        json!({ "section": "import", "patch": { "studentIdPrefix": "AB", "studentIdDigits": 4 } }),
    );
    assert_eq!(updated["import"]["studentIdPrefix"], json!("AB"));

    let after = request_ok(&mut stdin, &mut reader, "6", "users.previewImport", json!({ "text": text }));
    assert_eq!(after["accepted"][0]["email"], json!("new@u.edu"));
    assert_eq!(after["rejected"][0]["line"], json!(2));

    let template = request_ok(&mut stdin, &mut reader, "7", "roster.template", json!({}));
    assert!(template["text"].as_str().unwrap_or("").contains("AB0001,"));
}

#[test]
fn env_config_sets_initial_rules_and_empty_store() {
    let (_child, mut stdin, mut reader) = spawn_sidecar_with_env(&[
        ("ROSTERD_STUDENT_ID_PREFIX", "99"),
        ("ROSTERD_STUDENT_ID_DIGITS", "2"),
        ("ROSTERD_SEED_DEMO", "false"),
    ]);
    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["userCount"], json!(0));
    assert_eq!(health["courseCount"], json!(0));

    let setup = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(setup["import"]["studentIdPrefix"], json!("99"));

    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "users.applyImport",
        json!({ "text": "student_id,name,email\n9901,A,a@x.edu\n6831503001,B,b@x.edu\n" }),
    );
    assert_eq!(
        applied["summary"],
        json!({ "total": 2, "accepted": 1, "rejected": 1 })
    );
}
