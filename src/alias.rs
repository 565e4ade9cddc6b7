// alias.rs

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::{Result, RiboError};

/// A one-to-one mapping from transcript reference names to user-facing
/// aliases, in reference order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasMap {
    forward: IndexMap<String, String>,
    /// Alias -> position in `forward`.
    reverse: HashMap<String, usize>,
}

impl AliasMap {
    /// Build from parallel name and alias lists. Rejects length mismatches,
    /// repeated reference names, and repeated aliases.
    pub fn new(names: &[String], aliases: Vec<String>) -> Result<Self> {
        if names.len() != aliases.len() {
            return Err(RiboError::InvalidFormat(format!(
                "{} aliases for {} reference names",
                aliases.len(),
                names.len()
            )));
        }

        let mut forward = IndexMap::with_capacity(names.len());
        let mut reverse = HashMap::with_capacity(names.len());
        for (i, (name, alias)) in names.iter().zip(aliases).enumerate() {
            if forward.contains_key(name) {
                return Err(RiboError::InvalidFormat(format!(
                    "duplicate reference name '{}'",
                    name
                )));
            }
            if reverse.insert(alias.clone(), i).is_some() {
                return Err(RiboError::InvalidFormat(format!(
                    "alias '{}' is assigned to more than one transcript",
                    alias
                )));
            }
            forward.insert(name.clone(), alias);
        }

        Ok(Self { forward, reverse })
    }

    /// Build by applying a renaming function to every reference name.
    pub fn from_fn<F>(names: &[String], rename: F) -> Result<Self>
    where
        F: Fn(&str) -> String,
    {
        let aliases = names.iter().map(|name| rename(name)).collect();
        Self::new(names, aliases)
    }

    pub fn alias(&self, name: &str) -> Option<&str> {
        self.forward.get(name).map(String::as_str)
    }

    /// Reference-order index of the transcript carrying `alias`.
    pub fn index_of_alias(&self, alias: &str) -> Option<usize> {
        self.reverse.get(alias).copied()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forward.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Conventional alias for GENCODE transcript names, which pack several
/// identifiers into one pipe-delimited string:
/// `ENST…|ENSG…|OTTHUMG…|OTTHUMT…|GENE-201|GENE|1234|protein_coding|`.
/// The fifth field (the transcript name) is used. Names with fewer fields
/// are returned as is.
pub fn default_alias(name: &str) -> String {
    name.split('|')
        .nth(4)
        .filter(|field| !field.is_empty())
        .unwrap_or(name)
        .to_string()
}

/// The transcript labels for a query: reference names, or their aliases in
/// the same order.
pub fn resolve_names(
    reference_names: &[String],
    aliases: Option<&AliasMap>,
    alias: bool,
) -> Result<Vec<String>> {
    if !alias {
        return Ok(reference_names.to_vec());
    }

    let aliases = aliases.ok_or_else(|| {
        RiboError::InternalConsistency("alias mode without an alias map".to_string())
    })?;

    reference_names
        .iter()
        .map(|name| {
            aliases.alias(name).map(str::to_string).ok_or_else(|| {
                RiboError::InternalConsistency(format!("no alias for transcript '{}'", name))
            })
        })
        .collect()
}
