use std::collections::BTreeSet;

use anyhow::{bail, Result};

use crate::model::issue::{Field, IssueSnapshot, StoredIssue};

/// The fields whose change causes a card to be printed again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerFieldSet(BTreeSet<Field>);

impl TriggerFieldSet {
    pub fn new(fields: impl IntoIterator<Item = Field>) -> Result<Self> {
        let set: BTreeSet<Field> = fields.into_iter().collect();
        if set.is_empty() {
            bail!("Trigger field set cannot be empty");
        }
        Ok(Self(set))
    }

    /// Parse field names as written in config.toml.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut fields = Vec::with_capacity(names.len());
        for name in names {
            match Field::parse(name.as_ref()) {
                Some(field) => fields.push(field),
                None => bail!("Unknown trigger field {:?}", name.as_ref()),
            }
        }
        Self::new(fields)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.contains(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = Field> + '_ {
        self.0.iter().copied()
    }
}

impl Default for TriggerFieldSet {
    fn default() -> Self {
        Self(BTreeSet::from([
            Field::Summary,
            Field::Priority,
            Field::Type,
            Field::Detail,
        ]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    New,
    /// Lists the trigger fields that differ.
    Changed(Vec<Field>),
    Unchanged,
}

impl Classification {
    pub fn needs_render(&self) -> bool {
        !matches!(self, Classification::Unchanged)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    fields: TriggerFieldSet,
}

impl ChangeDetector {
    pub fn new(fields: TriggerFieldSet) -> Self {
        Self { fields }
    }

    pub fn trigger_fields(&self) -> &TriggerFieldSet {
        &self.fields
    }

    pub fn classify(&self, incoming: &IssueSnapshot, existing: Option<&StoredIssue>) -> Classification {
        let Some(existing) = existing else {
            return Classification::New;
        };

        let differing: Vec<Field> = self
            .fields
            .iter()
            .filter(|&field| incoming.field(field) != existing.snapshot.field(field))
            .collect();

        if differing.is_empty() {
            Classification::Unchanged
        } else {
            Classification::Changed(differing)
        }
    }
}
