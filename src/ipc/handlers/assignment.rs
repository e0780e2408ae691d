use crate::curriculum::{ChapterNode, ClassNode, HierarchyIndex, SubjectNode};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, AssignmentSession, Request};
use crate::selection::{
    build_bulk_classes_payload, build_single_class_payload, SelectionError, SelectionMode,
    SelectionState,
};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashSet;
use uuid::Uuid;

fn selection_err(req: &Request, e: SelectionError) -> serde_json::Value {
    err(&req.id, &e.code, e.message, None)
}

fn load_index(conn: &Connection) -> anyhow::Result<HierarchyIndex> {
    let mut stmt = conn.prepare("SELECT id, name FROM classes ORDER BY name")?;
    let classes = stmt
        .query_map([], |row| {
            Ok(ClassNode {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, s.class_id
         FROM subjects s
         JOIN classes c ON c.id = s.class_id
         ORDER BY c.name, s.name",
    )?;
    let subjects = stmt
        .query_map([], |row| {
            Ok(SubjectNode {
                id: row.get(0)?,
                name: row.get(1)?,
                class_id: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT ch.id, ch.name, ch.subject_id
         FROM chapters ch
         JOIN subjects s ON s.id = ch.subject_id
         ORDER BY s.name, ch.name",
    )?;
    let chapters = stmt
        .query_map([], |row| {
            Ok(ChapterNode {
                id: row.get(0)?,
                name: row.get(1)?,
                subject_id: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HierarchyIndex::build(classes, subjects, chapters))
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let course_id = match req.params.get("courseId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing courseId", None),
    };

    let course_exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM courses WHERE id = ?", [&course_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if course_exists.is_none() {
        return err(&req.id, "not_found", "course not found", None);
    }

    // Snapshot the curriculum for the lifetime of the session; the
    // selection engine only ever sees this index.
    let index = match load_index(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let class_count = index.classes().len();

    // Opening replaces any previous session (one workflow at a time).
    state.assignment = Some(AssignmentSession {
        course_id: course_id.clone(),
        index,
        selection: SelectionState::new(),
    });

    ok(
        &req.id,
        json!({ "courseId": course_id, "classCount": class_count }),
    )
}

fn handle_set_mode(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(session) = state.assignment.as_mut() else {
        return err(&req.id, "no_session", "open an assignment session first", None);
    };

    let mode = match req.params.get("mode").and_then(|v| v.as_str()) {
        Some("singleClass") => SelectionMode::SingleClass,
        Some("multipleClasses") => SelectionMode::MultipleClasses,
        Some(other) => {
            return err(
                &req.id,
                "bad_params",
                format!("unknown mode: {other}"),
                None,
            )
        }
        None => return err(&req.id, "bad_params", "missing mode", None),
    };

    session.selection.set_mode(mode);
    ok(&req.id, json!({ "ok": true }))
}

fn handle_select_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(session) = state.assignment.as_mut() else {
        return err(&req.id, "no_session", "open an assignment session first", None);
    };

    // Absent or null classId clears the selection; any other non-string
    // value is a malformed request, not a clear.
    let class_id = match req.params.get("classId") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => match v.as_str() {
            Some(s) => Some(s),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "classId must be a string or null",
                    None,
                )
            }
        },
    };

    if let Err(e) = session.selection.select_class(&session.index, class_id) {
        return selection_err(req, e);
    }
    ok(&req.id, selection_json(session))
}

fn handle_toggle_subject(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(session) = state.assignment.as_mut() else {
        return err(&req.id, "no_session", "open an assignment session first", None);
    };

    let subject_id = match req.params.get("subjectId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing subjectId", None),
    };
    let included = match req.params.get("included").and_then(|v| v.as_bool()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing included", None),
    };

    if let Err(e) = session
        .selection
        .toggle_subject(&session.index, &subject_id, included)
    {
        return selection_err(req, e);
    }
    ok(&req.id, selection_json(session))
}

fn handle_toggle_chapter(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(session) = state.assignment.as_mut() else {
        return err(&req.id, "no_session", "open an assignment session first", None);
    };

    let chapter_id = match req.params.get("chapterId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing chapterId", None),
    };
    let included = match req.params.get("included").and_then(|v| v.as_bool()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing included", None),
    };

    if let Err(e) = session
        .selection
        .toggle_chapter(&session.index, &chapter_id, included)
    {
        return selection_err(req, e);
    }
    ok(&req.id, selection_json(session))
}

fn handle_toggle_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(session) = state.assignment.as_mut() else {
        return err(&req.id, "no_session", "open an assignment session first", None);
    };

    let class_id = match req.params.get("classId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing classId", None),
    };
    let included = match req.params.get("included").and_then(|v| v.as_bool()) {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing included", None),
    };

    if let Err(e) = session
        .selection
        .toggle_bulk_class(&session.index, &class_id, included)
    {
        return selection_err(req, e);
    }
    ok(&req.id, selection_json(session))
}

fn handle_state(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(session) = state.assignment.as_ref() else {
        return err(&req.id, "no_session", "open an assignment session first", None);
    };
    ok(&req.id, selection_json(session))
}

fn selection_json(session: &AssignmentSession) -> serde_json::Value {
    let sel = &session.selection;
    let mode = match sel.mode {
        SelectionMode::SingleClass => "singleClass",
        SelectionMode::MultipleClasses => "multipleClasses",
    };
    json!({
        "courseId": session.course_id,
        "mode": mode,
        "classId": sel.class_id,
        "subjectIds": sel.subject_ids.iter().collect::<Vec<_>>(),
        "chapterIds": sel.chapter_ids.iter().collect::<Vec<_>>(),
        "classIds": sel.bulk_class_ids.iter().collect::<Vec<_>>(),
    })
}

fn insert_content(
    tx: &rusqlite::Transaction<'_>,
    course_id: &str,
    column: &str,
    node_id: &str,
) -> rusqlite::Result<usize> {
    // The partial unique indexes on course_content make re-attachment
    // a no-op.
    let sql = format!(
        "INSERT OR IGNORE INTO course_content(id, course_id, {column}) VALUES(?, ?, ?)"
    );
    tx.execute(&sql, (Uuid::new_v4().to_string(), course_id, node_id))
}

/// Expand one class attachment into course_content rows: the class
/// itself, every subject not excluded, and every chapter of those
/// subjects not excluded. Chapters of an excluded subject are skipped
/// wholesale; the subject exclusion already implies them.
fn apply_class_attachment(
    tx: &rusqlite::Transaction<'_>,
    index: &HierarchyIndex,
    course_id: &str,
    class_id: &str,
    exclude_subjects: &HashSet<&str>,
    exclude_chapters: &HashSet<&str>,
) -> rusqlite::Result<usize> {
    let mut written = insert_content(tx, course_id, "class_id", class_id)?;
    for subject in index.subjects_of(class_id) {
        if exclude_subjects.contains(subject.id.as_str()) {
            continue;
        }
        written += insert_content(tx, course_id, "subject_id", &subject.id)?;
        for chapter in index.chapters_of(&subject.id) {
            if exclude_chapters.contains(chapter.id.as_str()) {
                continue;
            }
            written += insert_content(tx, course_id, "chapter_id", &chapter.id)?;
        }
    }
    Ok(written)
}

fn handle_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(session) = state.assignment.as_ref() else {
        return err(&req.id, "no_session", "open an assignment session first", None);
    };

    // Exclusions are recomputed from the selection sets here, at submit
    // time, never tracked incrementally.
    let (payload_json, written) = match session.selection.mode {
        SelectionMode::SingleClass => {
            let payload = match build_single_class_payload(&session.selection, &session.index) {
                Ok(v) => v,
                Err(e) => return selection_err(req, e),
            };

            let tx = match conn.unchecked_transaction() {
                Ok(t) => t,
                Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
            };
            let exclude_subjects: HashSet<&str> = payload
                .exclude_subject_ids
                .iter()
                .map(|s| s.as_str())
                .collect();
            let exclude_chapters: HashSet<&str> = payload
                .exclude_chapter_ids
                .iter()
                .map(|s| s.as_str())
                .collect();

            let written = match apply_class_attachment(
                &tx,
                &session.index,
                &session.course_id,
                &payload.class_id,
                &exclude_subjects,
                &exclude_chapters,
            ) {
                Ok(v) => v,
                Err(e) => {
                    // Roll back and leave the selection untouched so
                    // the user can retry without re-selecting.
                    let _ = tx.rollback();
                    return err(
                        &req.id,
                        "db_insert_failed",
                        e.to_string(),
                        Some(json!({ "table": "course_content" })),
                    );
                }
            };
            if let Err(e) = tx.commit() {
                return err(&req.id, "db_commit_failed", e.to_string(), None);
            }

            (json!(payload), written)
        }
        SelectionMode::MultipleClasses => {
            let payload = match build_bulk_classes_payload(&session.selection) {
                Ok(v) => v,
                Err(e) => return selection_err(req, e),
            };

            let tx = match conn.unchecked_transaction() {
                Ok(t) => t,
                Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
            };
            let no_exclusions = HashSet::new();
            let mut written = 0usize;
            for class_id in &payload.class_ids {
                match apply_class_attachment(
                    &tx,
                    &session.index,
                    &session.course_id,
                    class_id,
                    &no_exclusions,
                    &no_exclusions,
                ) {
                    Ok(v) => written += v,
                    Err(e) => {
                        let _ = tx.rollback();
                        return err(
                            &req.id,
                            "db_insert_failed",
                            e.to_string(),
                            Some(json!({ "table": "course_content" })),
                        );
                    }
                }
            }
            if let Err(e) = tx.commit() {
                return err(&req.id, "db_commit_failed", e.to_string(), None);
            }

            (json!(payload), written)
        }
    };

    let course_id = session.course_id.clone();
    // Success ends the workflow; the next assignment starts clean.
    state.assignment = None;

    ok(
        &req.id,
        json!({
            "courseId": course_id,
            "payload": payload_json,
            "rowsWritten": written
        }),
    )
}

fn handle_cancel(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.assignment = None;
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assignment.open" => Some(handle_open(state, req)),
        "assignment.setMode" => Some(handle_set_mode(state, req)),
        "assignment.selectClass" => Some(handle_select_class(state, req)),
        "assignment.toggleSubject" => Some(handle_toggle_subject(state, req)),
        "assignment.toggleChapter" => Some(handle_toggle_chapter(state, req)),
        "assignment.toggleClass" => Some(handle_toggle_class(state, req)),
        "assignment.state" => Some(handle_state(state, req)),
        "assignment.submit" => Some(handle_submit(state, req)),
        "assignment.cancel" => Some(handle_cancel(state, req)),
        _ => None,
    }
}
