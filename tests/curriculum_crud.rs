mod test_support;

use serde_json::json;
use test_support::{request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn classes_subjects_chapters_crud_round_trip() {
    let workspace = temp_dir("courseadmin-curriculum-crud");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "curriculum.classes.create",
        json!({ "name": "Class 9" }),
    );
    let class_id = created["classId"].as_str().expect("classId").to_string();

    let subject = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "curriculum.subjects.create",
        json!({ "classId": class_id, "name": "Physics" }),
    );
    let subject_id = subject["subjectId"].as_str().expect("subjectId").to_string();

    let chapter = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "curriculum.chapters.create",
        json!({ "subjectId": subject_id, "name": "Motion" }),
    );
    let chapter_id = chapter["chapterId"].as_str().expect("chapterId").to_string();

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "curriculum.classes.list",
        json!({}),
    );
    let classes = listed["classes"].as_array().expect("classes array");
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0]["name"].as_str(), Some("Class 9"));
    assert_eq!(classes[0]["subjectCount"].as_i64(), Some(1));
    assert_eq!(classes[0]["chapterCount"].as_i64(), Some(1));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "curriculum.subjects.rename",
        json!({ "subjectId": subject_id, "name": "Applied Physics" }),
    );
    let subjects = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "curriculum.subjects.list",
        json!({ "classId": class_id }),
    );
    let subjects = subjects["subjects"].as_array().expect("subjects array");
    assert_eq!(subjects.len(), 1);
    assert_eq!(subjects[0]["name"].as_str(), Some("Applied Physics"));
    assert_eq!(subjects[0]["className"].as_str(), Some("Class 9"));

    let chapters = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "curriculum.chapters.list",
        json!({ "subjectId": subject_id }),
    );
    let chapters = chapters["chapters"].as_array().expect("chapters array");
    assert_eq!(chapters.len(), 1);
    assert_eq!(chapters[0]["id"].as_str(), Some(chapter_id.as_str()));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "curriculum.chapters.delete",
        json!({ "chapterId": chapter_id }),
    );
    let chapters = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "curriculum.chapters.list",
        json!({}),
    );
    assert!(chapters["chapters"].as_array().expect("array").is_empty());
}

#[test]
fn class_delete_cascades_through_subjects_and_chapters() {
    let workspace = temp_dir("courseadmin-class-delete");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let class_id = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "curriculum.classes.create",
        json!({ "name": "Class 10" }),
    )["classId"]
        .as_str()
        .expect("classId")
        .to_string();
    let subject_id = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "curriculum.subjects.create",
        json!({ "classId": class_id, "name": "Chemistry" }),
    )["subjectId"]
        .as_str()
        .expect("subjectId")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "curriculum.chapters.create",
        json!({ "subjectId": subject_id, "name": "Acids" }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "curriculum.classes.delete",
        json!({ "classId": class_id }),
    );

    let subjects = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "curriculum.subjects.list",
        json!({}),
    );
    assert!(subjects["subjects"].as_array().expect("array").is_empty());
    let chapters = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "curriculum.chapters.list",
        json!({}),
    );
    assert!(chapters["chapters"].as_array().expect("array").is_empty());
}

#[test]
fn duplicate_class_names_conflict() {
    let workspace = temp_dir("courseadmin-class-conflict");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "curriculum.classes.create",
        json!({ "name": "Class 9" }),
    );
    let dup = request(
        &mut stdin,
        &mut reader,
        "3",
        "curriculum.classes.create",
        json!({ "name": "Class 9" }),
    );
    assert_eq!(dup["error"]["code"].as_str(), Some("conflict"));

    let other = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "curriculum.classes.create",
        json!({ "name": "Class 10" }),
    );
    let other_id = other["classId"].as_str().expect("classId");
    let renamed = request(
        &mut stdin,
        &mut reader,
        "5",
        "curriculum.classes.rename",
        json!({ "classId": other_id, "name": "Class 9" }),
    );
    assert_eq!(renamed["error"]["code"].as_str(), Some("conflict"));
}

#[test]
fn child_creation_requires_existing_parent() {
    let workspace = temp_dir("courseadmin-missing-parent");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "curriculum.subjects.create",
        json!({ "classId": "missing", "name": "Physics" }),
    );
    assert_eq!(resp["error"]["code"].as_str(), Some("not_found"));

    let resp = request(
        &mut stdin,
        &mut reader,
        "3",
        "curriculum.chapters.create",
        json!({ "subjectId": "missing", "name": "Motion" }),
    );
    assert_eq!(resp["error"]["code"].as_str(), Some("not_found"));
}
