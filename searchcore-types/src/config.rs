use crate::schema::{ConfigurationError, SchemaConfig, SchemaObjectRepresentation};
use serde::{Deserialize, Serialize};

/// Options supplied once when the search module is constructed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchModuleOptions {
    /// Entities, parents and link services to index.
    pub schema: SchemaConfig,
}

impl SearchModuleOptions {
    /// Validate the schema section and build its representation.
    pub fn build_schema(&self) -> Result<SchemaObjectRepresentation, ConfigurationError> {
        SchemaObjectRepresentation::from_config(self.schema.clone())
    }
}
