// store.rs

use std::path::{Path, PathBuf};

use hdf5::types::{VarLenAscii, VarLenUnicode};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    alias::AliasMap,
    error::{Result, RiboError, ValidationError},
    region::{Dataset, Site},
};

pub(crate) const EXPERIMENTS_GROUP: &str = "experiments";
const REFERENCE_GROUP: &str = "reference";
const REFERENCE_NAMES: &str = "reference_names";
const REFERENCE_LENGTHS: &str = "reference_lengths";
const REFERENCE_ALIASES: &str = "aliases";
const METADATA_ATTR: &str = "metadata";
const TOTAL_READS_ATTR: &str = "total_reads";

/// File-level parameters, read from the root attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiboInfo {
    pub format_version: u64,
    /// Name of the transcriptome annotation the file was built against.
    pub reference: String,
    pub length_min: u32,
    pub length_max: u32,
    pub left_span: u32,
    pub right_span: u32,
    pub metagene_radius: u32,
    pub has_metadata: bool,
}

impl RiboInfo {
    /// Number of read lengths stored per transcript.
    pub fn n_lengths(&self) -> usize {
        (self.length_max - self.length_min) as usize + 1
    }
}

/// One experiment and the datasets it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExperimentInfo {
    pub name: String,
    pub total_reads: u64,
    pub has_region_counts: bool,
    pub has_metagene: bool,
    pub has_coverage: bool,
    pub has_rnaseq: bool,
    pub has_metadata: bool,
}

impl ExperimentInfo {
    pub fn has(&self, dataset: Dataset) -> bool {
        match dataset {
            Dataset::RegionCounts => self.has_region_counts,
            Dataset::Metagene => self.has_metagene,
            Dataset::Coverage => self.has_coverage,
            Dataset::RnaSeq => self.has_rnaseq,
        }
    }
}

/// An open .ribo file with its metadata cached. All accessors take a
/// `&Ribo`; the file is closed when the handle is dropped.
#[derive(Debug)]
pub struct Ribo {
    path: PathBuf,
    file: hdf5::File,
    info: RiboInfo,
    experiments: IndexMap<String, ExperimentInfo>,
    reference_names: Vec<String>,
    reference_lengths: Vec<u64>,
    aliases: Option<AliasMap>,
}

type Renamer = Box<dyn Fn(&str) -> String>;

/// Open-time options for a [`Ribo`].
pub struct RiboBuilder {
    path: PathBuf,
    rename: Option<Renamer>,
}

impl RiboBuilder {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            rename: None,
        }
    }

    /// Derive transcript aliases from reference names with `rename`,
    /// replacing any alias table stored in the file.
    pub fn rename<F>(mut self, rename: F) -> Self
    where
        F: Fn(&str) -> String + 'static,
    {
        self.rename = Some(Box::new(rename));
        self
    }

    pub fn open(self) -> Result<Ribo> {
        Ribo::open_with(&self.path, self.rename.as_deref())
    }
}

impl Ribo {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path.as_ref(), None)
    }

    pub fn builder(path: impl AsRef<Path>) -> RiboBuilder {
        RiboBuilder::new(path)
    }

    fn open_with(path: &Path, rename: Option<&dyn Fn(&str) -> String>) -> Result<Self> {
        let file = hdf5::File::open(path)?;
        let info = read_info(&file)?;

        let reference = file.group(REFERENCE_GROUP)?;
        let reference_names = read_strings(&reference.dataset(REFERENCE_NAMES)?)?;
        let reference_lengths = reference
            .dataset(REFERENCE_LENGTHS)?
            .read_1d::<u64>()?
            .to_vec();
        if reference_lengths.len() != reference_names.len() {
            return Err(RiboError::InvalidFormat(format!(
                "{} reference lengths for {} reference names",
                reference_lengths.len(),
                reference_names.len()
            )));
        }

        let aliases = match rename {
            Some(rename) => Some(AliasMap::from_fn(&reference_names, rename)?),
            None if reference.link_exists(REFERENCE_ALIASES) => {
                let aliases = read_strings(&reference.dataset(REFERENCE_ALIASES)?)?;
                Some(AliasMap::new(&reference_names, aliases)?)
            }
            None => None,
        };

        let mut experiments = IndexMap::new();
        if file.link_exists(EXPERIMENTS_GROUP) {
            let group = file.group(EXPERIMENTS_GROUP)?;
            for name in group.member_names()? {
                let experiment = read_experiment(&group.group(&name)?, &name)?;
                debug!(
                    experiment = %name,
                    coverage = experiment.has_coverage,
                    rnaseq = experiment.has_rnaseq,
                    "found experiment"
                );
                experiments.insert(name, experiment);
            }
        }

        info!(
            path = %path.display(),
            experiments = experiments.len(),
            transcripts = reference_names.len(),
            "opened ribo file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            info,
            experiments,
            reference_names,
            reference_lengths,
            aliases,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &RiboInfo {
        &self.info
    }

    /// Experiments in stored order.
    pub fn experiments(&self) -> &IndexMap<String, ExperimentInfo> {
        &self.experiments
    }

    pub fn experiment_names(&self) -> Vec<String> {
        self.experiments.keys().cloned().collect()
    }

    pub fn experiment(&self, name: &str) -> Option<&ExperimentInfo> {
        self.experiments.get(name)
    }

    pub fn reference_names(&self) -> &[String] {
        &self.reference_names
    }

    pub fn reference_lengths(&self) -> &[u64] {
        &self.reference_lengths
    }

    pub fn n_transcripts(&self) -> usize {
        self.reference_names.len()
    }

    pub fn aliases(&self) -> Option<&AliasMap> {
        self.aliases.as_ref()
    }

    /// Parsed YAML metadata of the file (`None`) or of one experiment.
    /// Returns `Ok(None)` when no metadata was recorded.
    pub fn metadata(&self, experiment: Option<&str>) -> Result<Option<serde_yaml::Value>> {
        let raw = match experiment {
            None => read_string_attr(&self.file, METADATA_ATTR)?,
            Some(name) => {
                if !self.experiments.contains_key(name) {
                    return Err(ValidationError::UnknownExperiments(vec![name.to_string()]).into());
                }
                let group = self.file.group(&experiment_path(name))?;
                read_string_attr(&group, METADATA_ATTR)?
            }
        };
        raw.map(|text| serde_yaml::from_str::<serde_yaml::Value>(&text).map_err(RiboError::from))
            .transpose()
    }

    pub(crate) fn file(&self) -> &hdf5::File {
        &self.file
    }

    /// Index of a transcript given by reference name, or by alias when
    /// `alias` is set.
    pub(crate) fn transcript_index(&self, name: &str, alias: bool) -> Option<usize> {
        if alias {
            self.aliases.as_ref()?.index_of_alias(name)
        } else {
            self.reference_names.iter().position(|n| n == name)
        }
    }

    /// Offset of a transcript in the concatenated transcriptome.
    pub(crate) fn transcript_offset(&self, index: usize) -> u64 {
        self.reference_lengths[..index].iter().sum()
    }

    pub(crate) fn transcriptome_length(&self) -> u64 {
        self.reference_lengths.iter().sum()
    }
}

pub(crate) fn experiment_path(name: &str) -> String {
    format!("{}/{}", EXPERIMENTS_GROUP, name)
}

fn read_info(file: &hdf5::File) -> Result<RiboInfo> {
    let reference = read_string_attr(file, "reference")?.unwrap_or_default();
    let info = RiboInfo {
        format_version: read_u64_attr(file, "format_version")?,
        reference,
        length_min: read_u32_attr(file, "length_min")?,
        length_max: read_u32_attr(file, "length_max")?,
        left_span: read_u32_attr(file, "left_span")?,
        right_span: read_u32_attr(file, "right_span")?,
        metagene_radius: read_u32_attr(file, "metagene_radius")?,
        has_metadata: has_attr(file, METADATA_ATTR)?,
    };
    check_length_bounds(&info)?;
    Ok(info)
}

/// `[length_min, length_max]` must be non-empty, and its size must fit a
/// `u32` so per-length row arithmetic cannot overflow.
fn check_length_bounds(info: &RiboInfo) -> Result<()> {
    info.length_max
        .checked_sub(info.length_min)
        .and_then(|span| span.checked_add(1))
        .map(|_| ())
        .ok_or_else(|| {
            RiboError::InvalidFormat(format!(
                "invalid read length bounds [{}, {}]",
                info.length_min, info.length_max
            ))
        })
}

fn read_experiment(group: &hdf5::Group, name: &str) -> Result<ExperimentInfo> {
    let total_reads = if has_attr(group, TOTAL_READS_ATTR)? {
        group.attr(TOTAL_READS_ATTR)?.read_scalar::<u64>()?
    } else {
        0
    };
    let has_path = |path: &str| {
        let mut parts = path.splitn(2, '/');
        match (parts.next(), parts.next()) {
            (Some(sub), Some(ds)) => {
                group.link_exists(sub)
                    && group.group(sub).map_or(false, |g| g.link_exists(ds))
            }
            _ => false,
        }
    };
    let dataset_path = |dataset: Dataset| dataset.path().map_or(false, has_path);

    Ok(ExperimentInfo {
        name: name.to_string(),
        total_reads,
        has_region_counts: dataset_path(Dataset::RegionCounts),
        has_metagene: has_path(Site::Start.path()) && has_path(Site::Stop.path()),
        has_coverage: dataset_path(Dataset::Coverage),
        has_rnaseq: dataset_path(Dataset::RnaSeq),
        has_metadata: has_attr(group, METADATA_ATTR)?,
    })
}

fn has_attr(loc: &hdf5::Location, name: &str) -> Result<bool> {
    Ok(loc.attr_names()?.iter().any(|n| n == name))
}

fn read_u64_attr(loc: &hdf5::Location, name: &str) -> Result<u64> {
    if !has_attr(loc, name)? {
        return Err(RiboError::InvalidFormat(format!(
            "missing attribute '{}'",
            name
        )));
    }
    Ok(loc.attr(name)?.read_scalar::<u64>()?)
}

fn read_u32_attr(loc: &hdf5::Location, name: &str) -> Result<u32> {
    let value = read_u64_attr(loc, name)?;
    u32::try_from(value).map_err(|_| {
        RiboError::InvalidFormat(format!("attribute '{}' out of range: {}", name, value))
    })
}

fn read_string_attr(loc: &hdf5::Location, name: &str) -> Result<Option<String>> {
    if !has_attr(loc, name)? {
        return Ok(None);
    }
    let attr = loc.attr(name)?;
    // Writers differ in whether they store UTF-8 or ASCII strings.
    match attr.read_scalar::<VarLenUnicode>() {
        Ok(s) => Ok(Some(s.as_str().to_string())),
        Err(_) => Ok(Some(attr.read_scalar::<VarLenAscii>()?.as_str().to_string())),
    }
}

fn read_strings(ds: &hdf5::Dataset) -> Result<Vec<String>> {
    match ds.read_1d::<VarLenUnicode>() {
        Ok(values) => Ok(values.iter().map(|s| s.as_str().to_string()).collect()),
        Err(_) => Ok(ds
            .read_1d::<VarLenAscii>()?
            .iter()
            .map(|s| s.as_str().to_string())
            .collect()),
    }
}
