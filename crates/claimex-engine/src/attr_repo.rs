//! # Issuer Attribute Repository
//!
//! Raw attribute values an issuer will attest, filed under (schema, prover
//! id). Adding attributes is an upsert: filing the same set twice leaves one
//! record, and filing a partial set only overwrites the named attributes.

use std::collections::BTreeMap;

use claimex_core::{Attributes, SchemaKey};
use parking_lot::RwLock;

/// Attribute records keyed by schema and prover id.
#[derive(Debug, Default)]
pub struct AttributeRepo {
    records: RwLock<BTreeMap<(SchemaKey, String), Attributes>>,
}

impl AttributeRepo {
    /// An empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `attributes` into the record for (`schema_key`, `user_id`).
    pub fn add_attributes(&self, schema_key: &SchemaKey, user_id: &str, attributes: Attributes) {
        let mut records = self.records.write();
        records
            .entry((schema_key.clone(), user_id.to_string()))
            .or_default()
            .extend(attributes);
    }

    /// The record for (`schema_key`, `user_id`).
    pub fn get_attributes(&self, schema_key: &SchemaKey, user_id: &str) -> Option<Attributes> {
        self.records
            .read()
            .get(&(schema_key.clone(), user_id.to_string()))
            .cloned()
    }

    /// Number of distinct records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no records are filed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
