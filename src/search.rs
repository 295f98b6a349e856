use crate::record::{Auxiliary, Record};
use crate::schema::{SearchFields, TableSchema};

/// Normalized free-text query: trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchQuery {
    term: String,
}

impl SearchQuery {
    pub fn new(text: &str) -> Self {
        Self {
            term: text.trim().to_lowercase(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.term.is_empty()
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    /// True if any searchable projection of `record` contains the term.
    pub fn matches(&self, record: &Record, schema: &TableSchema, aux: &Auxiliary) -> bool {
        if self.is_empty() {
            return true;
        }
        projections(&schema.search, record, schema, aux)
            .iter()
            .any(|p| p.contains(&self.term))
    }
}

fn lower(record: &Record, field: &str) -> String {
    record.text(field).to_lowercase()
}

fn projections(
    fields: &SearchFields,
    record: &Record,
    schema: &TableSchema,
    aux: &Auxiliary,
) -> Vec<String> {
    let mut out = Vec::with_capacity(8);
    if let Some(reference) = &fields.reference {
        out.push(lower(record, reference));
    }
    if let Some(names) = &fields.names {
        let last = lower(record, &names.last);
        let first = lower(record, &names.first);
        let middle = names
            .middle
            .as_deref()
            .map(|m| lower(record, m))
            .unwrap_or_default();
        // Both entry conventions: "last first middle" and "first last".
        out.push(format!("{last} {first} {middle}"));
        out.push(format!("{first} {last}"));
        out.push(last);
        out.push(first);
        out.push(middle);
    }
    out.extend(fields.fields.iter().map(|f| lower(record, f)));
    out.extend(
        fields
            .derived
            .iter()
            .filter_map(|key| schema.column(key))
            .map(|c| c.source.text(record, aux).to_lowercase()),
    );
    out
}
