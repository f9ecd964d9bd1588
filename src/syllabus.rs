//! Syllabus loading and validation.
//!
//! A syllabus is the immutable input to a workflow run: a course title and an
//! ordered list of sections, each with learning objectives, key topics and a
//! duration allocation. Validation failures here are fatal; nothing starts
//! until the syllabus is well-formed.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SyllabusError;
use crate::ports::store::COURSE_ARTIFACT_ID;

/// One syllabus-defined unit of content, roughly a chapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyllabusSection {
    /// Unique identifier for the section.
    pub section_id: String,
    /// Human-readable section title.
    pub title: String,
    /// What the learner should be able to do after the section.
    pub learning_objectives: Vec<String>,
    /// Topics the section must cover; drives knowledge lookups.
    pub key_topics: Vec<String>,
    /// Duration allocated to the section, in minutes.
    pub estimated_duration_minutes: u32,
}

/// A parsed course syllabus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Syllabus {
    /// Course title used for the final transcript.
    pub course_title: String,
    /// Ordered sections; order is preserved through to the transcript.
    pub sections: Vec<SyllabusSection>,
}

impl Syllabus {
    /// Loads and validates a syllabus from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `SyllabusError` on IO failure, parse failure, or validation
    /// failure (empty syllabus, duplicate or reserved section ids, sections
    /// with no topics).
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SyllabusError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let syllabus: Syllabus = serde_yaml::from_str(&raw)?;
        syllabus.validate()?;
        Ok(syllabus)
    }

    /// Validates structural invariants of the syllabus.
    ///
    /// # Errors
    ///
    /// Returns `SyllabusError` if the syllabus is empty, a section id is
    /// duplicated or reserved, or a section has no title or key topics.
    pub fn validate(&self) -> Result<(), SyllabusError> {
        if self.sections.is_empty() {
            return Err(SyllabusError::Empty);
        }

        let mut seen = HashSet::new();
        for section in &self.sections {
            if section.section_id.is_empty() {
                return Err(SyllabusError::InvalidSection {
                    id: "<empty>".to_string(),
                    reason: "section_id cannot be empty".to_string(),
                });
            }

            if section.section_id == COURSE_ARTIFACT_ID {
                return Err(SyllabusError::ReservedSectionId(section.section_id.clone()));
            }

            if !seen.insert(section.section_id.clone()) {
                return Err(SyllabusError::DuplicateSectionId(section.section_id.clone()));
            }

            if section.title.is_empty() {
                return Err(SyllabusError::InvalidSection {
                    id: section.section_id.clone(),
                    reason: "title cannot be empty".to_string(),
                });
            }

            if section.key_topics.is_empty() {
                return Err(SyllabusError::InvalidSection {
                    id: section.section_id.clone(),
                    reason: "key_topics cannot be empty".to_string(),
                });
            }

            if section.estimated_duration_minutes == 0 {
                return Err(SyllabusError::InvalidSection {
                    id: section.section_id.clone(),
                    reason: "estimated_duration_minutes must be greater than 0".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Returns the ordered section ids.
    pub fn section_ids(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.section_id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str) -> SyllabusSection {
        SyllabusSection {
            section_id: id.to_string(),
            title: format!("Section {}", id),
            learning_objectives: vec!["understand the topic".to_string()],
            key_topics: vec!["topic".to_string()],
            estimated_duration_minutes: 30,
        }
    }

    #[test]
    fn test_valid_syllabus() {
        let syllabus = Syllabus {
            course_title: "Test Course".to_string(),
            sections: vec![section("s1"), section("s2")],
        };
        assert!(syllabus.validate().is_ok());
        assert_eq!(syllabus.section_ids(), vec!["s1", "s2"]);
    }

    #[test]
    fn test_empty_syllabus_rejected() {
        let syllabus = Syllabus {
            course_title: "Empty".to_string(),
            sections: vec![],
        };
        assert!(matches!(syllabus.validate(), Err(SyllabusError::Empty)));
    }

    #[test]
    fn test_duplicate_section_id_rejected() {
        let syllabus = Syllabus {
            course_title: "Dup".to_string(),
            sections: vec![section("s1"), section("s1")],
        };
        assert!(matches!(
            syllabus.validate(),
            Err(SyllabusError::DuplicateSectionId(id)) if id == "s1"
        ));
    }

    #[test]
    fn test_reserved_section_id_rejected() {
        let syllabus = Syllabus {
            course_title: "Reserved".to_string(),
            sections: vec![section(COURSE_ARTIFACT_ID)],
        };
        assert!(matches!(
            syllabus.validate(),
            Err(SyllabusError::ReservedSectionId(_))
        ));
    }

    #[test]
    fn test_section_without_topics_rejected() {
        let mut bad = section("s1");
        bad.key_topics.clear();
        let syllabus = Syllabus {
            course_title: "No topics".to_string(),
            sections: vec![bad],
        };
        let err = syllabus.validate().unwrap_err();
        assert!(err.to_string().contains("key_topics"));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let mut bad = section("s1");
        bad.estimated_duration_minutes = 0;
        let syllabus = Syllabus {
            course_title: "No time".to_string(),
            sections: vec![bad],
        };
        let err = syllabus.validate().unwrap_err();
        assert!(err.to_string().contains("estimated_duration_minutes"));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let yaml = r#"
course_title: Rust Fundamentals
sections:
  - section_id: intro
    title: Getting Started
    learning_objectives:
      - install the toolchain
    key_topics:
      - cargo
      - rustup
    estimated_duration_minutes: 45
"#;
        let syllabus: Syllabus = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(syllabus.course_title, "Rust Fundamentals");
        assert_eq!(syllabus.sections.len(), 1);
        assert_eq!(syllabus.sections[0].key_topics.len(), 2);
        assert!(syllabus.validate().is_ok());
    }
}
