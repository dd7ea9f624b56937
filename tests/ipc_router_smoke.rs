mod test_support;

use serde_json::json;
use std::io::{BufRead, Write};
use test_support::{error_code, request, request_ok, spawn_sidecar};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["userCount"], json!(6));
    assert_eq!(health["courseCount"], json!(2));
    assert_eq!(health["projectCount"], json!(7));

    for (i, method) in [
        "users.list",
        "courses.list",
        "roster.template",
        "projects.list",
        "setup.get",
    ]
    .iter()
    .enumerate()
    {
        let resp = request(&mut stdin, &mut reader, &format!("m{}", i), method, json!({}));
        assert_eq!(resp["ok"], json!(true), "{} -> {}", method, resp);
    }

    for (i, method) in [
        "users.update",
        "users.delete",
        "courses.update",
        "courses.delete",
        "courses.roster.list",
        "courses.roster.remove",
        "courses.roster.previewImport",
        "courses.roster.applyImport",
        "projects.get",
        "projects.create",
        "projects.update",
        "projects.submit",
        "projects.review",
    ]
    .iter()
    .enumerate()
    {
        let resp = request(&mut stdin, &mut reader, &format!("p{}", i), method, json!({}));
        assert_eq!(error_code(&resp), Some("bad_params"), "{} -> {}", method, resp);
    }

    let unknown = request(&mut stdin, &mut reader, "2", "projects.delete", json!({}));
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    // Unparseable lines get an error without id and the loop keeps going.
    writeln!(stdin, "{{not json").expect("write bad line");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json response");
    let bad: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(error_code(&bad), Some("bad_json"));
    assert!(bad.get("id").is_none());

    let _ = request_ok(&mut stdin, &mut reader, "3", "health", json!({}));

    drop(stdin);
    let status = child.wait().expect("wait rosterd");
    assert!(status.success());
}
