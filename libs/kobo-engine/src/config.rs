/// Loader settings, passed in at construction. No process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadConfig {
    /// Survey identifier handed to the record source.
    pub source_id: String,
    /// Field used as the primary key and conflict target.
    pub natural_key: String,
}

pub const DEFAULT_NATURAL_KEY: &str = "_id";

impl LoadConfig {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            natural_key: DEFAULT_NATURAL_KEY.to_string(),
        }
    }

    pub fn with_natural_key(mut self, natural_key: impl Into<String>) -> Self {
        self.natural_key = natural_key.into();
        self
    }
}
