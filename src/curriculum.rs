use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNode {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectNode {
    pub id: String,
    pub name: String,
    pub class_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterNode {
    pub id: String,
    pub name: String,
    pub subject_id: String,
}

/// Parent-to-child lookup over a class → subject → chapter snapshot.
///
/// Built once per assignment session from the flat curriculum lists and
/// never mutated; absent parents yield empty child lists rather than
/// errors. Child order follows input order, so lists read back in the
/// same order the curriculum query produced them.
#[derive(Debug, Clone, Default)]
pub struct HierarchyIndex {
    classes: Vec<ClassNode>,
    subjects_by_class: HashMap<String, Vec<SubjectNode>>,
    chapters_by_subject: HashMap<String, Vec<ChapterNode>>,
    class_of_subject: HashMap<String, String>,
    subject_of_chapter: HashMap<String, String>,
}

impl HierarchyIndex {
    pub fn build(
        classes: Vec<ClassNode>,
        subjects: Vec<SubjectNode>,
        chapters: Vec<ChapterNode>,
    ) -> Self {
        let mut subjects_by_class: HashMap<String, Vec<SubjectNode>> = HashMap::new();
        let mut class_of_subject: HashMap<String, String> = HashMap::new();
        for s in subjects {
            class_of_subject.insert(s.id.clone(), s.class_id.clone());
            subjects_by_class
                .entry(s.class_id.clone())
                .or_default()
                .push(s);
        }

        let mut chapters_by_subject: HashMap<String, Vec<ChapterNode>> = HashMap::new();
        let mut subject_of_chapter: HashMap<String, String> = HashMap::new();
        for c in chapters {
            subject_of_chapter.insert(c.id.clone(), c.subject_id.clone());
            chapters_by_subject
                .entry(c.subject_id.clone())
                .or_default()
                .push(c);
        }

        Self {
            classes,
            subjects_by_class,
            chapters_by_subject,
            class_of_subject,
            subject_of_chapter,
        }
    }

    pub fn classes(&self) -> &[ClassNode] {
        &self.classes
    }

    pub fn has_class(&self, class_id: &str) -> bool {
        self.classes.iter().any(|c| c.id == class_id)
    }

    pub fn subjects_of(&self, class_id: &str) -> &[SubjectNode] {
        self.subjects_by_class
            .get(class_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn chapters_of(&self, subject_id: &str) -> &[ChapterNode] {
        self.chapters_by_subject
            .get(subject_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn class_of_subject(&self, subject_id: &str) -> Option<&str> {
        self.class_of_subject.get(subject_id).map(|s| s.as_str())
    }

    pub fn subject_of_chapter(&self, chapter_id: &str) -> Option<&str> {
        self.subject_of_chapter.get(chapter_id).map(|s| s.as_str())
    }
}
