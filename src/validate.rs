// validate.rs

//! Query checks. All of these run against cached metadata only, so a
//! failing query never touches the file's datasets.

use indexmap::IndexMap;
use tracing::warn;

use crate::{
    alias::AliasMap,
    error::{CapabilityWarning, Result, RiboError, ValidationError},
    region::{Dataset, Region},
    store::{ExperimentInfo, RiboInfo},
};

/// The outcome of a capability filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filtered {
    /// Experiments carrying the dataset, in request order.
    pub kept: Vec<String>,
    /// One warning per dropped experiment.
    pub warnings: Vec<CapabilityWarning>,
}

/// Every requested experiment must exist. Repeated names collapse to their
/// first occurrence; the result keeps request order.
pub fn check_experiments(
    available: &IndexMap<String, ExperimentInfo>,
    requested: &[String],
) -> std::result::Result<Vec<String>, ValidationError> {
    if requested.is_empty() {
        return Err(ValidationError::NoExperiments);
    }
    let mut unique: Vec<String> = Vec::with_capacity(requested.len());
    let mut unknown = Vec::new();
    for name in requested {
        if !available.contains_key(name.as_str()) {
            unknown.push(name.clone());
        } else if !unique.contains(name) {
            unique.push(name.clone());
        }
    }
    if unknown.is_empty() {
        Ok(unique)
    } else {
        Err(ValidationError::UnknownExperiments(unknown))
    }
}

/// Keep the requested experiments that carry `dataset`, warning about each
/// one that does not. Fails only if none remain.
pub fn check_capability(
    available: &IndexMap<String, ExperimentInfo>,
    requested: &[String],
    dataset: Dataset,
) -> Result<Filtered> {
    let mut kept = Vec::with_capacity(requested.len());
    let mut warnings = Vec::new();
    for name in requested {
        let capable = available
            .get(name.as_str())
            .map_or(false, |experiment| experiment.has(dataset));
        if capable {
            kept.push(name.clone());
        } else {
            let warning = CapabilityWarning {
                experiment: name.clone(),
                dataset,
            };
            warn!("{}", warning);
            warnings.push(warning);
        }
    }

    if kept.is_empty() {
        return Err(RiboError::NoValidExperiments { dataset });
    }
    Ok(Filtered { kept, warnings })
}

pub fn check_rnaseq(
    available: &IndexMap<String, ExperimentInfo>,
    requested: &[String],
) -> Result<Filtered> {
    check_capability(available, requested, Dataset::RnaSeq)
}

pub fn check_coverage(
    available: &IndexMap<String, ExperimentInfo>,
    requested: &[String],
) -> Result<Filtered> {
    check_capability(available, requested, Dataset::Coverage)
}

/// Parse region names, keeping the first occurrence of duplicates.
pub fn check_regions<S: AsRef<str>>(
    names: &[S],
) -> std::result::Result<Vec<Region>, ValidationError> {
    if names.is_empty() {
        return Err(ValidationError::NoRegions);
    }
    let mut regions = Vec::with_capacity(names.len());
    let mut unknown = Vec::new();
    for name in names {
        match name.as_ref().parse::<Region>() {
            Ok(region) if !regions.contains(&region) => regions.push(region),
            Ok(_) => {}
            Err(_) => unknown.push(name.as_ref().to_string()),
        }
    }
    if unknown.is_empty() {
        Ok(regions)
    } else {
        Err(ValidationError::UnknownRegions(unknown))
    }
}

pub fn check_alias(
    aliases: Option<&AliasMap>,
    alias: bool,
) -> std::result::Result<(), ValidationError> {
    match aliases {
        _ if !alias => Ok(()),
        Some(map) if !map.is_empty() => Ok(()),
        _ => Err(ValidationError::MissingAliases),
    }
}

/// Resolve an optional read length range against the file's bounds.
/// `None` means every stored length.
pub fn check_length_range(
    info: &RiboInfo,
    range: Option<(u32, u32)>,
) -> std::result::Result<(u32, u32), ValidationError> {
    let (lower, upper) = range.unwrap_or((info.length_min, info.length_max));
    if lower > upper || lower < info.length_min || upper > info.length_max {
        return Err(ValidationError::LengthRange {
            lower,
            upper,
            min: info.length_min,
            max: info.length_max,
        });
    }
    Ok((lower, upper))
}

/// Normalizing by library size needs a positive read total.
pub fn check_total_reads(
    available: &IndexMap<String, ExperimentInfo>,
    experiments: &[String],
) -> std::result::Result<(), ValidationError> {
    let missing: Vec<String> = experiments
        .iter()
        .filter(|name| {
            available
                .get(name.as_str())
                .map_or(true, |experiment| experiment.total_reads == 0)
        })
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingTotalReads(missing))
    }
}
