//! To-do records and their creation/update parameters
//!
//! Parameters arrive as loosely-typed request data and are validated one
//! item at a time, so a batch can reject a bad item without rejecting its
//! neighbours.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Longest accepted title, in characters
pub const MAX_TITLE_LEN: usize = 200;

/// Longest accepted description, in characters
pub const MAX_DESCRIPTION_LEN: usize = 2000;

/// Validation errors for to-do parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is empty or absent
    #[error("Required field missing: {field}")]
    RequiredFieldMissing {
        /// Field name
        field: &'static str,
    },

    /// A text field is too long
    #[error("Value exceeds maximum length for {field}: {length} > {max}")]
    LengthExceeded {
        /// Field name
        field: &'static str,
        /// Length in characters
        length: usize,
        /// Largest accepted length
        max: usize,
    },

    /// A value is outside its enumerated set
    #[error("Invalid value for {field}: {value} (expected one of low, medium, high)")]
    InvalidEnumValue {
        /// Field name
        field: &'static str,
        /// Rejected input
        value: String,
    },

    /// A patch sets no field at all
    #[error("Update contains no fields")]
    EmptyPatch,
}

/// To-do priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Whenever there is time
    Low,
    /// Default priority
    #[default]
    Medium,
    /// Do first
    High,
}

impl Priority {
    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(ValidationError::InvalidEnumValue {
                field: "priority",
                value: s.to_string(),
            }),
        }
    }
}

/// Whether a record is live or soft-deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Lifecycle {
    /// Visible to reads and listings
    Active,
    /// Soft-deleted; kept in storage
    Deleted {
        /// When the record was deleted
        at: DateTime<Utc>,
    },
}

impl Lifecycle {
    /// Whether the record is live
    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active)
    }

    /// Deletion time, if soft-deleted
    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Lifecycle::Active => None,
            Lifecycle::Deleted { at } => Some(*at),
        }
    }
}

/// A stored to-do record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    /// Assigned at creation
    pub id: Uuid,
    /// Trimmed, non-empty title
    pub title: String,
    /// Optional free text
    pub description: Option<String>,
    /// Priority, `medium` unless given
    pub priority: Priority,
    /// Whether the task is done
    pub completed: bool,
    /// Live or soft-deleted
    pub lifecycle: Lifecycle,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Time of the last change, deletion and restore included
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    /// Build a new active record from validated parameters
    pub fn from_validated(params: ValidatedTodo, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: params.title,
            description: params.description,
            priority: params.priority,
            completed: false,
            lifecycle: Lifecycle::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the record is live
    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    /// Apply a validated patch
    pub fn apply(&mut self, patch: ValidatedPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        self.updated_at = now;
    }
}

/// Raw creation parameters for one to-do
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTodo {
    /// Required; surrounding whitespace is trimmed
    #[serde(default)]
    pub title: String,
    /// Optional free text
    #[serde(default)]
    pub description: Option<String>,
    /// One of `low`, `medium`, `high`
    #[serde(default)]
    pub priority: Option<String>,
}

impl NewTodo {
    /// Parameters with only a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the raw priority
    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    /// Check this item on its own
    pub fn validate(&self) -> Result<ValidatedTodo, ValidationError> {
        let title = validate_title(&self.title)?;
        let description = self
            .description
            .as_deref()
            .map(validate_description)
            .transpose()?;
        let priority = match self.priority.as_deref() {
            Some(raw) => raw.parse::<Priority>()?,
            None => Priority::default(),
        };

        Ok(ValidatedTodo {
            title,
            description,
            priority,
        })
    }
}

/// Creation parameters that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTodo {
    title: String,
    description: Option<String>,
    priority: Priority,
}

impl ValidatedTodo {
    /// Trimmed title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Parsed priority
    pub fn priority(&self) -> Priority {
        self.priority
    }
}

/// Raw partial update for one to-do
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoPatch {
    /// New title
    #[serde(default)]
    pub title: Option<String>,
    /// New description
    #[serde(default)]
    pub description: Option<String>,
    /// New raw priority
    #[serde(default)]
    pub priority: Option<String>,
    /// New completion flag
    #[serde(default)]
    pub completed: Option<bool>,
}

impl TodoPatch {
    /// Check every present field; at least one must be set
    pub fn validate(&self) -> Result<ValidatedPatch, ValidationError> {
        if self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.completed.is_none()
        {
            return Err(ValidationError::EmptyPatch);
        }

        Ok(ValidatedPatch {
            title: self.title.as_deref().map(validate_title).transpose()?,
            description: self
                .description
                .as_deref()
                .map(validate_description)
                .transpose()?,
            priority: self.priority.as_deref().map(str::parse::<Priority>).transpose()?,
            completed: self.completed,
        })
    }
}

/// Partial update that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPatch {
    title: Option<String>,
    description: Option<String>,
    priority: Option<Priority>,
    completed: Option<bool>,
}

fn validate_title(raw: &str) -> Result<String, ValidationError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ValidationError::RequiredFieldMissing { field: "title" });
    }
    let length = title.chars().count();
    if length > MAX_TITLE_LEN {
        return Err(ValidationError::LengthExceeded {
            field: "title",
            length,
            max: MAX_TITLE_LEN,
        });
    }
    Ok(title.to_string())
}

fn validate_description(raw: &str) -> Result<String, ValidationError> {
    let length = raw.chars().count();
    if length > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::LengthExceeded {
            field: "description",
            length,
            max: MAX_DESCRIPTION_LEN,
        });
    }
    Ok(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_new_todo_defaults_to_medium_priority() {
        let validated = NewTodo::new("  write docs  ").validate().unwrap();
        assert_eq!(validated.title(), "write docs");
        assert_eq!(validated.priority(), Priority::Medium);
    }

    #[test]
    fn test_new_todo_rejects_blank_title() {
        let err = NewTodo::new("   ").validate().unwrap_err();
        assert_eq!(err, ValidationError::RequiredFieldMissing { field: "title" });
    }

    #[test]
    fn test_new_todo_rejects_long_title() {
        let err = NewTodo::new("x".repeat(MAX_TITLE_LEN + 1))
            .validate()
            .unwrap_err();
        assert!(matches!(err, ValidationError::LengthExceeded { field: "title", .. }));
    }

    #[test]
    fn test_priority_must_be_enumerated() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);

        let err = NewTodo::new("ship it")
            .with_priority("urgent")
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidEnumValue {
                field: "priority",
                value: "urgent".to_string()
            }
        );
    }

    #[test]
    fn test_missing_title_deserializes_then_fails_validation() {
        let raw: NewTodo = serde_json::from_value(json!({ "priority": "low" })).unwrap();
        assert!(raw.validate().is_err());
    }

    #[test]
    fn test_patch_validation() {
        assert_eq!(TodoPatch::default().validate().unwrap_err(), ValidationError::EmptyPatch);

        let patch = TodoPatch {
            completed: Some(true),
            priority: Some("low".to_string()),
            ..Default::default()
        };
        let mut todo = Todo::from_validated(NewTodo::new("a").validate().unwrap(), Utc::now());
        let before = todo.updated_at;
        todo.apply(patch.validate().unwrap(), before + chrono::Duration::seconds(1));

        assert!(todo.completed);
        assert_eq!(todo.priority, Priority::Low);
        assert!(todo.updated_at > before);
    }

    #[test]
    fn test_lifecycle_json_shape() {
        let at = Utc::now();
        let value = serde_json::to_value(Lifecycle::Deleted { at }).unwrap();
        assert_eq!(value["state"], json!("deleted"));
        assert_eq!(Lifecycle::Deleted { at }.deleted_at(), Some(at));
        assert_eq!(serde_json::to_value(Lifecycle::Active).unwrap(), json!({ "state": "active" }));
    }
}
