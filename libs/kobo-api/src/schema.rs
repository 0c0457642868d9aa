// ════════════════════════════════════════════════════════════════
//  Field Type
// ════════════════════════════════════════════════════════════════

/// Storage type of one column.
///
/// `Text` is the universal fallback. The other tags are narrower and only
/// `Integer`/`Decimal` combine into something other than `Text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldType {
    /// ISO-8601 date-time string. PG: `timestamp`.
    Timestamp,
    /// `lat,long` string. PG: `point`.
    GeoPoint,
    /// Object or array at any depth. PG: `jsonb`.
    JsonDocument,
    Boolean,
    /// PG: `bigint`.
    Integer,
    /// PG: `numeric`.
    Decimal,
    Text,
}

impl FieldType {
    /// PostgreSQL column type for this tag.
    pub fn pg_type(self) -> &'static str {
        match self {
            FieldType::Timestamp => "timestamp",
            FieldType::GeoPoint => "point",
            FieldType::JsonDocument => "jsonb",
            FieldType::Boolean => "boolean",
            FieldType::Integer => "bigint",
            FieldType::Decimal => "numeric",
            FieldType::Text => "text",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Timestamp => write!(f, "TIMESTAMP"),
            FieldType::GeoPoint => write!(f, "GEO_POINT"),
            FieldType::JsonDocument => write!(f, "JSON_DOCUMENT"),
            FieldType::Boolean => write!(f, "BOOLEAN"),
            FieldType::Integer => write!(f, "INTEGER"),
            FieldType::Decimal => write!(f, "DECIMAL"),
            FieldType::Text => write!(f, "TEXT"),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Column & Schema
// ════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Raw field name, used verbatim as the column identifier.
    pub name: String,
    pub field_type: FieldType,
}

impl Column {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Column set of one destination table.
///
/// Column order is the order of first appearance in the batch and drives
/// DDL column order. Each name appears once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new() -> Self {
        Self { columns: Vec::new() }
    }

    /// Add a column, or retype it in place if the name is already present.
    pub fn set(&mut self, name: impl Into<String>, field_type: FieldType) {
        let name = name.into();
        if let Some(col) = self.columns.iter_mut().find(|c| c.name == name) {
            col.field_type = field_type;
        } else {
            self.columns.push(Column::new(name, field_type));
        }
    }

    pub fn get(&self, name: &str) -> Option<FieldType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.field_type)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<Column> for Schema {
    fn from_iter<I: IntoIterator<Item = Column>>(iter: I) -> Self {
        let mut schema = Schema::new();
        for col in iter {
            schema.set(col.name, col.field_type);
        }
        schema
    }
}

// ════════════════════════════════════════════════════════════════
//  Table Identity
// ════════════════════════════════════════════════════════════════

/// Namespace + table name of the destination.
///
/// Stable for a given source identifier, so re-runs hit the same table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIdentity {
    pub namespace: String,
    pub name: String,
}

impl TableIdentity {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// `<namespace>.<prefix><source_id>`, source id kept verbatim.
    pub fn for_source(namespace: &str, prefix: &str, source_id: &str) -> Self {
        Self::new(namespace, format!("{prefix}{source_id}"))
    }

    /// Table named after the survey's display name, see [`clean_survey_name`].
    pub fn for_survey_name(namespace: &str, survey_name: &str) -> Self {
        Self::new(namespace, clean_survey_name(survey_name))
    }
}

impl std::fmt::Display for TableIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Turn a survey display name into a table name: lowercase, drop anything
/// that is not a word character, whitespace or `-`, then collapse each run
/// of whitespace/`-` into a single `_`.
pub fn clean_survey_name(survey_name: &str) -> String {
    let mut out = String::with_capacity(survey_name.len());
    let mut in_separator = false;
    for c in survey_name.to_lowercase().chars() {
        if c.is_whitespace() || c == '-' {
            if !in_separator {
                out.push('_');
                in_separator = true;
            }
        } else if c.is_alphanumeric() || c == '_' {
            out.push(c);
            in_separator = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_keeps_first_appearance_order() {
        let mut schema = Schema::new();
        schema.set("b", FieldType::Integer);
        schema.set("a", FieldType::Text);
        schema.set("b", FieldType::Decimal);
        let names: Vec<&str> = schema.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(schema.get("b"), Some(FieldType::Decimal));
    }

    #[test]
    fn test_table_for_source_is_verbatim() {
        let table = TableIdentity::for_source("dsa", "kobo_", "aBc123XyZ");
        assert_eq!(table.to_string(), "dsa.kobo_aBc123XyZ");
    }

    #[test]
    fn test_clean_survey_name() {
        assert_eq!(clean_survey_name("Encuesta Hogares 2024"), "encuesta_hogares_2024");
        assert_eq!(clean_survey_name("Salud -- Norte (v2)"), "salud_norte_v2");
        assert_eq!(clean_survey_name("Año_Base"), "año_base");
    }

    #[test]
    fn test_field_type_display_and_pg_type() {
        assert_eq!(FieldType::GeoPoint.to_string(), "GEO_POINT");
        assert_eq!(FieldType::JsonDocument.pg_type(), "jsonb");
        assert_eq!(FieldType::Integer.pg_type(), "bigint");
    }
}
