use serde::Serialize;
use std::collections::BTreeSet;

use crate::curriculum::HierarchyIndex;

pub const INVALID_REFERENCE: &str = "invalid_reference";
pub const PRECONDITION_NOT_MET: &str = "precondition_not_met";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionError {
    pub code: String,
    pub message: String,
}

impl SelectionError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }

    fn invalid_reference(message: impl Into<String>) -> Self {
        Self::new(INVALID_REFERENCE, message)
    }

    fn precondition(message: impl Into<String>) -> Self {
        Self::new(PRECONDITION_NOT_MET, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    SingleClass,
    MultipleClasses,
}

/// Selection state for one content-assignment session.
///
/// The default is include-everything: picking a class selects every
/// subject beneath it and every chapter beneath those, and the user
/// carves content out by deselecting. Submit-time payloads are computed
/// from these sets, never tracked incrementally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    pub mode: SelectionMode,
    pub class_id: Option<String>,
    pub subject_ids: BTreeSet<String>,
    pub chapter_ids: BTreeSet<String>,
    pub bulk_class_ids: BTreeSet<String>,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionState {
    pub fn new() -> Self {
        Self {
            mode: SelectionMode::SingleClass,
            class_id: None,
            subject_ids: BTreeSet::new(),
            chapter_ids: BTreeSet::new(),
            bulk_class_ids: BTreeSet::new(),
        }
    }

    /// Switching modes always starts from a clean slate, even when the
    /// requested mode is already active. Mixing a half-built
    /// single-class selection with a bulk one has no meaning.
    pub fn set_mode(&mut self, mode: SelectionMode) {
        self.mode = mode;
        self.class_id = None;
        self.subject_ids.clear();
        self.chapter_ids.clear();
        self.bulk_class_ids.clear();
    }

    pub fn reset_all(&mut self) {
        let mode = self.mode;
        self.set_mode(mode);
    }

    /// `None` clears the class and both child selections. `Some(id)`
    /// applies the full-select default: every subject of the class and
    /// every chapter of those subjects.
    pub fn select_class(
        &mut self,
        index: &HierarchyIndex,
        class_id: Option<&str>,
    ) -> Result<(), SelectionError> {
        if self.mode != SelectionMode::SingleClass {
            return Err(SelectionError::precondition(
                "not in single-class mode",
            ));
        }

        self.class_id = None;
        self.subject_ids.clear();
        self.chapter_ids.clear();

        let Some(class_id) = class_id else {
            return Ok(());
        };
        if !index.has_class(class_id) {
            return Err(SelectionError::invalid_reference(format!(
                "unknown class: {class_id}"
            )));
        }

        self.class_id = Some(class_id.to_string());
        for subject in index.subjects_of(class_id) {
            self.subject_ids.insert(subject.id.clone());
            for chapter in index.chapters_of(&subject.id) {
                self.chapter_ids.insert(chapter.id.clone());
            }
        }
        Ok(())
    }

    /// Cascades down only. Deselecting removes the subject's chapters
    /// regardless of individual chapter toggles; reselecting restores
    /// the subject's chapters to full.
    pub fn toggle_subject(
        &mut self,
        index: &HierarchyIndex,
        subject_id: &str,
        included: bool,
    ) -> Result<(), SelectionError> {
        if self.mode != SelectionMode::SingleClass {
            return Err(SelectionError::precondition(
                "not in single-class mode",
            ));
        }
        let Some(class_id) = self.class_id.as_deref() else {
            return Err(SelectionError::precondition("no class selected"));
        };
        match index.class_of_subject(subject_id) {
            None => {
                return Err(SelectionError::invalid_reference(format!(
                    "unknown subject: {subject_id}"
                )))
            }
            Some(owner) if owner != class_id => {
                return Err(SelectionError::invalid_reference(format!(
                    "subject {subject_id} does not belong to class {class_id}"
                )))
            }
            Some(_) => {}
        }

        if included {
            self.subject_ids.insert(subject_id.to_string());
            for chapter in index.chapters_of(subject_id) {
                self.chapter_ids.insert(chapter.id.clone());
            }
        } else {
            self.subject_ids.remove(subject_id);
            for chapter in index.chapters_of(subject_id) {
                self.chapter_ids.remove(&chapter.id);
            }
        }
        Ok(())
    }

    /// Leaf-level toggle; never touches subject selection. Adding a
    /// chapter requires its subject to be selected, otherwise the
    /// chapter set would no longer be covered by the selected subjects.
    pub fn toggle_chapter(
        &mut self,
        index: &HierarchyIndex,
        chapter_id: &str,
        included: bool,
    ) -> Result<(), SelectionError> {
        if self.mode != SelectionMode::SingleClass {
            return Err(SelectionError::precondition(
                "not in single-class mode",
            ));
        }
        let Some(subject_id) = index.subject_of_chapter(chapter_id) else {
            return Err(SelectionError::invalid_reference(format!(
                "unknown chapter: {chapter_id}"
            )));
        };

        if included {
            if !self.subject_ids.contains(subject_id) {
                return Err(SelectionError::invalid_reference(format!(
                    "chapter {chapter_id} belongs to an unselected subject"
                )));
            }
            self.chapter_ids.insert(chapter_id.to_string());
        } else {
            self.chapter_ids.remove(chapter_id);
        }
        Ok(())
    }

    pub fn toggle_bulk_class(
        &mut self,
        index: &HierarchyIndex,
        class_id: &str,
        included: bool,
    ) -> Result<(), SelectionError> {
        if self.mode != SelectionMode::MultipleClasses {
            return Err(SelectionError::precondition(
                "not in multiple-classes mode",
            ));
        }
        if !index.has_class(class_id) {
            return Err(SelectionError::invalid_reference(format!(
                "unknown class: {class_id}"
            )));
        }

        if included {
            self.bulk_class_ids.insert(class_id.to_string());
        } else {
            self.bulk_class_ids.remove(class_id);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleClassPayload {
    pub class_id: String,
    pub exclude_subject_ids: Vec<String>,
    pub exclude_chapter_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkClassesPayload {
    pub class_ids: Vec<String>,
}

/// Complement of the current selection against the full hierarchy,
/// recomputed from the authoritative sets at submit time.
///
/// Excluded chapters are collected over the *selected* subjects only:
/// excluding a subject already implies all of its chapters, so they are
/// not listed a second time. Output order follows the hierarchy index.
pub fn build_single_class_payload(
    state: &SelectionState,
    index: &HierarchyIndex,
) -> Result<SingleClassPayload, SelectionError> {
    let Some(class_id) = state.class_id.as_deref() else {
        return Err(SelectionError::precondition("no class selected"));
    };

    let mut exclude_subject_ids = Vec::new();
    let mut exclude_chapter_ids = Vec::new();
    for subject in index.subjects_of(class_id) {
        if !state.subject_ids.contains(&subject.id) {
            exclude_subject_ids.push(subject.id.clone());
            continue;
        }
        for chapter in index.chapters_of(&subject.id) {
            if !state.chapter_ids.contains(&chapter.id) {
                exclude_chapter_ids.push(chapter.id.clone());
            }
        }
    }

    Ok(SingleClassPayload {
        class_id: class_id.to_string(),
        exclude_subject_ids,
        exclude_chapter_ids,
    })
}

pub fn build_bulk_classes_payload(
    state: &SelectionState,
) -> Result<BulkClassesPayload, SelectionError> {
    if state.bulk_class_ids.is_empty() {
        return Err(SelectionError::precondition("no classes selected"));
    }
    Ok(BulkClassesPayload {
        class_ids: state.bulk_class_ids.iter().cloned().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::{ChapterNode, ClassNode, SubjectNode};

    // Class C has subjects S1 {A, B} and S2 {C, D}; class C2 has
    // subject S3 with no chapters.
    fn index() -> HierarchyIndex {
        let classes = vec![
            ClassNode {
                id: "C".into(),
                name: "Class 9".into(),
            },
            ClassNode {
                id: "C2".into(),
                name: "Class 10".into(),
            },
        ];
        let subjects = vec![
            SubjectNode {
                id: "S1".into(),
                name: "Physics".into(),
                class_id: "C".into(),
            },
            SubjectNode {
                id: "S2".into(),
                name: "Chemistry".into(),
                class_id: "C".into(),
            },
            SubjectNode {
                id: "S3".into(),
                name: "Biology".into(),
                class_id: "C2".into(),
            },
        ];
        let chapters = vec![
            ChapterNode {
                id: "A".into(),
                name: "Motion".into(),
                subject_id: "S1".into(),
            },
            ChapterNode {
                id: "B".into(),
                name: "Forces".into(),
                subject_id: "S1".into(),
            },
            ChapterNode {
                id: "Ch".into(),
                name: "Acids".into(),
                subject_id: "S2".into(),
            },
            ChapterNode {
                id: "D".into(),
                name: "Salts".into(),
                subject_id: "S2".into(),
            },
        ];
        HierarchyIndex::build(classes, subjects, chapters)
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn select_class_applies_full_default() {
        let idx = index();
        let mut st = SelectionState::new();
        st.select_class(&idx, Some("C")).expect("select class");

        assert_eq!(st.class_id.as_deref(), Some("C"));
        assert_eq!(st.subject_ids, set(&["S1", "S2"]));
        assert_eq!(st.chapter_ids, set(&["A", "B", "Ch", "D"]));
    }

    #[test]
    fn select_class_none_clears_selection() {
        let idx = index();
        let mut st = SelectionState::new();
        st.select_class(&idx, Some("C")).expect("select class");
        st.select_class(&idx, None).expect("clear class");

        assert_eq!(st.class_id, None);
        assert!(st.subject_ids.is_empty());
        assert!(st.chapter_ids.is_empty());
    }

    #[test]
    fn select_unknown_class_rejected() {
        let idx = index();
        let mut st = SelectionState::new();
        let err = st.select_class(&idx, Some("nope")).unwrap_err();
        assert_eq!(err.code, INVALID_REFERENCE);
        // A rejected select must not leave a half-applied selection.
        assert_eq!(st.class_id, None);
        assert!(st.subject_ids.is_empty());
    }

    #[test]
    fn deselect_subject_cascades_to_its_chapters_only() {
        let idx = index();
        let mut st = SelectionState::new();
        st.select_class(&idx, Some("C")).expect("select class");
        st.toggle_subject(&idx, "S2", false).expect("deselect S2");

        assert_eq!(st.subject_ids, set(&["S1"]));
        assert_eq!(st.chapter_ids, set(&["A", "B"]));
    }

    #[test]
    fn reselect_subject_restores_chapters_to_full() {
        let idx = index();
        let mut st = SelectionState::new();
        st.select_class(&idx, Some("C")).expect("select class");

        // Deselect one chapter of S2 individually, then toggle the
        // subject off and back on: the manual deselect does not survive.
        st.toggle_chapter(&idx, "D", false).expect("deselect D");
        st.toggle_subject(&idx, "S2", false).expect("deselect S2");
        st.toggle_subject(&idx, "S2", true).expect("reselect S2");

        assert_eq!(st.subject_ids, set(&["S1", "S2"]));
        assert_eq!(st.chapter_ids, set(&["A", "B", "Ch", "D"]));
    }

    #[test]
    fn chapter_toggles_never_cascade_upward() {
        let idx = index();
        let mut st = SelectionState::new();
        st.select_class(&idx, Some("C")).expect("select class");
        st.toggle_chapter(&idx, "A", false).expect("deselect A");
        st.toggle_chapter(&idx, "B", false).expect("deselect B");

        // Every chapter of S1 is gone, S1 itself stays selected.
        assert!(st.subject_ids.contains("S1"));
        assert_eq!(st.chapter_ids, set(&["Ch", "D"]));
    }

    #[test]
    fn chapter_toggle_is_idempotent() {
        let idx = index();
        let mut st = SelectionState::new();
        st.select_class(&idx, Some("C")).expect("select class");

        let before = st.chapter_ids.clone();
        st.toggle_chapter(&idx, "A", true).expect("re-add A");
        st.toggle_chapter(&idx, "A", true).expect("re-add A again");
        assert_eq!(st.chapter_ids, before);

        st.toggle_chapter(&idx, "A", false).expect("remove A");
        st.toggle_chapter(&idx, "A", false).expect("remove A again");
        assert!(!st.chapter_ids.contains("A"));
    }

    #[test]
    fn subject_toggle_rejects_foreign_and_unknown_ids() {
        let idx = index();
        let mut st = SelectionState::new();
        st.select_class(&idx, Some("C")).expect("select class");

        let err = st.toggle_subject(&idx, "S3", false).unwrap_err();
        assert_eq!(err.code, INVALID_REFERENCE);
        let err = st.toggle_subject(&idx, "nope", true).unwrap_err();
        assert_eq!(err.code, INVALID_REFERENCE);
        // Rejection leaves the selection untouched.
        assert_eq!(st.subject_ids, set(&["S1", "S2"]));
    }

    #[test]
    fn chapter_add_requires_selected_subject() {
        let idx = index();
        let mut st = SelectionState::new();
        st.select_class(&idx, Some("C")).expect("select class");
        st.toggle_subject(&idx, "S1", false).expect("deselect S1");

        let err = st.toggle_chapter(&idx, "A", true).unwrap_err();
        assert_eq!(err.code, INVALID_REFERENCE);
        // Removing a chapter of a deselected subject stays a no-op.
        st.toggle_chapter(&idx, "A", false).expect("remove is total");
        let err = st.toggle_chapter(&idx, "nope", false).unwrap_err();
        assert_eq!(err.code, INVALID_REFERENCE);
    }

    #[test]
    fn reset_all_clears_selection_but_keeps_mode() {
        let idx = index();
        let mut st = SelectionState::new();
        st.select_class(&idx, Some("C")).expect("select class");
        st.reset_all();

        assert_eq!(st.mode, SelectionMode::SingleClass);
        assert_eq!(st.class_id, None);
        assert!(st.subject_ids.is_empty());
        assert!(st.chapter_ids.is_empty());

        st.set_mode(SelectionMode::MultipleClasses);
        st.toggle_bulk_class(&idx, "C", true).expect("bulk add");
        st.reset_all();
        assert_eq!(st.mode, SelectionMode::MultipleClasses);
        assert!(st.bulk_class_ids.is_empty());
    }

    #[test]
    fn mode_switch_clears_everything() {
        let idx = index();
        let mut st = SelectionState::new();
        st.select_class(&idx, Some("C")).expect("select class");
        st.set_mode(SelectionMode::MultipleClasses);

        assert_eq!(st.class_id, None);
        assert!(st.subject_ids.is_empty());
        assert!(st.chapter_ids.is_empty());
        assert!(st.bulk_class_ids.is_empty());

        st.toggle_bulk_class(&idx, "C", true).expect("bulk add");
        st.set_mode(SelectionMode::SingleClass);
        assert!(st.bulk_class_ids.is_empty());
    }

    #[test]
    fn bulk_toggle_requires_bulk_mode() {
        let idx = index();
        let mut st = SelectionState::new();
        let err = st.toggle_bulk_class(&idx, "C", true).unwrap_err();
        assert_eq!(err.code, PRECONDITION_NOT_MET);

        st.set_mode(SelectionMode::MultipleClasses);
        st.toggle_bulk_class(&idx, "C", true).expect("bulk add");
        let err = st.select_class(&idx, Some("C")).unwrap_err();
        assert_eq!(err.code, PRECONDITION_NOT_MET);
        let err = st.toggle_bulk_class(&idx, "nope", true).unwrap_err();
        assert_eq!(err.code, INVALID_REFERENCE);
    }

    #[test]
    fn full_selection_builds_empty_exclusions() {
        let idx = index();
        let mut st = SelectionState::new();
        st.select_class(&idx, Some("C")).expect("select class");

        let payload = build_single_class_payload(&st, &idx).expect("payload");
        assert_eq!(payload.class_id, "C");
        assert!(payload.exclude_subject_ids.is_empty());
        assert!(payload.exclude_chapter_ids.is_empty());
    }

    #[test]
    fn partial_selection_excludes_complement_without_duplicates() {
        let idx = index();
        let mut st = SelectionState::new();
        st.select_class(&idx, Some("C")).expect("select class");
        st.toggle_subject(&idx, "S2", false).expect("deselect S2");
        st.toggle_chapter(&idx, "B", false).expect("deselect B");

        let payload = build_single_class_payload(&st, &idx).expect("payload");
        assert_eq!(payload.exclude_subject_ids, vec!["S2".to_string()]);
        // Chapters of the excluded S2 are implied by the subject
        // exclusion and must not be listed again.
        assert_eq!(payload.exclude_chapter_ids, vec!["B".to_string()]);
    }

    #[test]
    fn payload_without_class_is_a_precondition_failure() {
        let idx = index();
        let st = SelectionState::new();
        let err = build_single_class_payload(&st, &idx).unwrap_err();
        assert_eq!(err.code, PRECONDITION_NOT_MET);
    }

    #[test]
    fn bulk_payload_requires_at_least_one_class() {
        let idx = index();
        let mut st = SelectionState::new();
        st.set_mode(SelectionMode::MultipleClasses);

        let err = build_bulk_classes_payload(&st).unwrap_err();
        assert_eq!(err.code, PRECONDITION_NOT_MET);

        st.toggle_bulk_class(&idx, "C2", true).expect("bulk add");
        st.toggle_bulk_class(&idx, "C", true).expect("bulk add");
        let payload = build_bulk_classes_payload(&st).expect("payload");
        assert_eq!(payload.class_ids, vec!["C".to_string(), "C2".to_string()]);
    }
}
