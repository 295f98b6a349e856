use std::fmt;
use std::sync::Arc;

use crate::record::{Auxiliary, FieldValue, Record};
use crate::sort::SortDirection;

pub const UNKNOWN_LABEL: &str = "Unknown";
pub const ONLINE: &str = "online";
pub const OFFLINE: &str = "offline";

/// A value computed at projection time from a record and auxiliary data.
/// Never stored on the record.
pub trait DerivedField: Send + Sync + fmt::Debug {
    fn resolve(&self, record: &Record, aux: &Auxiliary) -> String;
}

/// Resolves a foreign key through the lookup, e.g. `section_id` to the
/// section name.
#[derive(Debug)]
pub struct GroupLabel {
    pub field: String,
}

impl DerivedField for GroupLabel {
    fn resolve(&self, record: &Record, aux: &Auxiliary) -> String {
        let key = record.get(&self.field);
        if key.is_missing() {
            return UNKNOWN_LABEL.to_string();
        }
        aux.label(&key.to_string())
            .unwrap_or(UNKNOWN_LABEL)
            .to_string()
    }
}

/// `online` when the record (or the identifier in `key_field`) is in the
/// live-status set, `offline` otherwise.
#[derive(Debug)]
pub struct PresenceStatus {
    pub key_field: Option<String>,
}

impl DerivedField for PresenceStatus {
    fn resolve(&self, record: &Record, aux: &Auxiliary) -> String {
        let live = match &self.key_field {
            Some(field) => aux.is_live(&record.text(field)),
            None => aux.is_live(&record.id),
        };
        let status = if live { ONLINE } else { OFFLINE };
        status.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Date,
    Mixed,
}

#[derive(Debug, Clone)]
pub enum ValueSource {
    Field { name: String, kind: FieldKind },
    Derived(Arc<dyn DerivedField>),
}

impl ValueSource {
    pub fn field(name: &str, kind: FieldKind) -> Self {
        ValueSource::Field {
            name: name.to_string(),
            kind,
        }
    }

    pub fn derived(resolver: impl DerivedField + 'static) -> Self {
        ValueSource::Derived(Arc::new(resolver))
    }

    pub fn value(&self, record: &Record, aux: &Auxiliary) -> FieldValue {
        match self {
            ValueSource::Field { name, .. } => record.get(name).clone(),
            ValueSource::Derived(resolver) => FieldValue::Text(resolver.resolve(record, aux)),
        }
    }

    pub fn text(&self, record: &Record, aux: &Auxiliary) -> String {
        match self {
            ValueSource::Field { name, .. } => record.text(name),
            ValueSource::Derived(resolver) => resolver.resolve(record, aux),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub key: String,
    pub title: String,
    pub source: ValueSource,
}

impl ColumnSpec {
    pub fn new(key: &str, title: &str, source: ValueSource) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            source,
        }
    }
}

/// A filter dimension. `column` names the display column whose cells select
/// values for this dimension.
#[derive(Debug, Clone)]
pub struct FilterDimension {
    pub key: String,
    pub column: String,
    pub source: ValueSource,
}

impl FilterDimension {
    pub fn new(key: &str, column: &str, source: ValueSource) -> Self {
        Self {
            key: key.to_string(),
            column: column.to_string(),
            source,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NameFields {
    pub last: String,
    pub first: String,
    pub middle: Option<String>,
}

/// Which fields feed free-text search.
#[derive(Debug, Clone, Default)]
pub struct SearchFields {
    pub reference: Option<String>,
    pub names: Option<NameFields>,
    pub fields: Vec<String>,
    /// Keys of derived columns whose resolved values are searched.
    pub derived: Vec<String>,
}

/// Parametrizes the view-model for one entity type.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    pub search: SearchFields,
    pub filters: Vec<FilterDimension>,
    pub default_sort: (String, SortDirection),
}

impl TableSchema {
    pub fn column(&self, key: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.key == key)
    }

    pub fn dimension(&self, key: &str) -> Option<&FilterDimension> {
        self.filters.iter().find(|d| d.key == key)
    }

    pub fn dimension_for_column(&self, column: &str) -> Option<&FilterDimension> {
        self.filters.iter().find(|d| d.column == column)
    }

    /// Unknown keys fall back to a raw field compared as mixed values.
    pub fn sort_source(&self, key: &str) -> ValueSource {
        self.column(key)
            .map(|c| c.source.clone())
            .unwrap_or_else(|| ValueSource::field(key, FieldKind::Mixed))
    }

    pub fn filter_source(&self, key: &str) -> ValueSource {
        self.dimension(key)
            .map(|d| d.source.clone())
            .unwrap_or_else(|| ValueSource::field(key, FieldKind::Mixed))
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "students" => Some(Self::students()),
            "sections" => Some(Self::sections()),
            "attempts" => Some(Self::attempts()),
            _ => None,
        }
    }

    pub fn students() -> Self {
        let section = ValueSource::derived(GroupLabel {
            field: "section_id".into(),
        });
        let status = ValueSource::derived(PresenceStatus { key_field: None });
        Self {
            name: "students".into(),
            columns: vec![
                ColumnSpec::new("status", "Status", status.clone()),
                ColumnSpec::new(
                    "student_no",
                    "Student No.",
                    ValueSource::field("student_no", FieldKind::Text),
                ),
                ColumnSpec::new(
                    "last_name",
                    "Last Name",
                    ValueSource::field("last_name", FieldKind::Text),
                ),
                ColumnSpec::new(
                    "first_name",
                    "First Name",
                    ValueSource::field("first_name", FieldKind::Text),
                ),
                ColumnSpec::new(
                    "middle_name",
                    "Middle Name",
                    ValueSource::field("middle_name", FieldKind::Text),
                ),
                ColumnSpec::new("section", "Section", section),
                ColumnSpec::new(
                    "created_at",
                    "Created",
                    ValueSource::field("created_at", FieldKind::Date),
                ),
                ColumnSpec::new(
                    "last_active",
                    "Last Active",
                    ValueSource::field("last_active", FieldKind::Date),
                ),
            ],
            search: SearchFields {
                reference: Some("student_no".into()),
                names: Some(NameFields {
                    last: "last_name".into(),
                    first: "first_name".into(),
                    middle: Some("middle_name".into()),
                }),
                fields: Vec::new(),
                derived: vec!["section".into()],
            },
            filters: vec![
                FilterDimension::new(
                    "section_id",
                    "section",
                    ValueSource::field("section_id", FieldKind::Text),
                ),
                FilterDimension::new("status", "status", status),
            ],
            default_sort: ("status".into(), SortDirection::Ascending),
        }
    }

    pub fn sections() -> Self {
        Self {
            name: "sections".into(),
            columns: vec![
                ColumnSpec::new("code", "Code", ValueSource::field("code", FieldKind::Text)),
                ColumnSpec::new("name", "Name", ValueSource::field("name", FieldKind::Text)),
                ColumnSpec::new(
                    "grade_level",
                    "Grade",
                    ValueSource::field("grade_level", FieldKind::Number),
                ),
                ColumnSpec::new(
                    "adviser",
                    "Adviser",
                    ValueSource::field("adviser", FieldKind::Text),
                ),
                ColumnSpec::new(
                    "created_at",
                    "Created",
                    ValueSource::field("created_at", FieldKind::Date),
                ),
            ],
            search: SearchFields {
                reference: Some("code".into()),
                names: None,
                fields: vec!["name".into(), "adviser".into()],
                derived: Vec::new(),
            },
            filters: vec![FilterDimension::new(
                "grade_level",
                "grade_level",
                ValueSource::field("grade_level", FieldKind::Number),
            )],
            default_sort: ("name".into(), SortDirection::Ascending),
        }
    }

    pub fn attempts() -> Self {
        let section = ValueSource::derived(GroupLabel {
            field: "section_id".into(),
        });
        let status = ValueSource::derived(PresenceStatus {
            key_field: Some("student_id".into()),
        });
        Self {
            name: "attempts".into(),
            columns: vec![
                ColumnSpec::new("status", "Status", status.clone()),
                ColumnSpec::new(
                    "assessment",
                    "Assessment",
                    ValueSource::field("assessment", FieldKind::Text),
                ),
                ColumnSpec::new(
                    "last_name",
                    "Last Name",
                    ValueSource::field("last_name", FieldKind::Text),
                ),
                ColumnSpec::new(
                    "first_name",
                    "First Name",
                    ValueSource::field("first_name", FieldKind::Text),
                ),
                ColumnSpec::new("section", "Section", section),
                ColumnSpec::new("score", "Score", ValueSource::field("score", FieldKind::Number)),
                ColumnSpec::new(
                    "submitted_at",
                    "Submitted",
                    ValueSource::field("submitted_at", FieldKind::Date),
                ),
            ],
            search: SearchFields {
                reference: Some("assessment".into()),
                names: Some(NameFields {
                    last: "last_name".into(),
                    first: "first_name".into(),
                    middle: None,
                }),
                fields: Vec::new(),
                derived: vec!["section".into()],
            },
            filters: vec![
                FilterDimension::new(
                    "section_id",
                    "section",
                    ValueSource::field("section_id", FieldKind::Text),
                ),
                FilterDimension::new("status", "status", status),
            ],
            default_sort: ("submitted_at".into(), SortDirection::Descending),
        }
    }
}
