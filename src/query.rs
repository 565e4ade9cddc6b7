// query.rs

//! One accessor per dataset family. Each follows the same steps: validate
//! the request against cached metadata, drop experiments lacking the
//! dataset (with a warning), resolve transcript labels, read one slice per
//! experiment, stack the slices into a wide table, then optionally melt it
//! into tidy form and encode its string columns as factors.

use std::ops::Range;

use ndarray::{concatenate, Array2, ArrayView2, Axis};

use crate::{
    alias::resolve_names,
    error::{Result, RiboError, ValidationError},
    fetch::{collapse, Strided},
    region::{Dataset, Region, Site},
    store::{Ribo, RiboInfo},
    table::{Column, Table},
    validate::{
        check_alias, check_capability, check_experiments, check_length_range, check_regions,
        check_rnaseq, check_total_reads,
    },
};

const REGION_COUNTS_PATH: &str = "region_counts/region_counts";
const COVERAGE_PATH: &str = "coverage/coverage";
const RNASEQ_PATH: &str = "rnaseq/rnaseq";
const N_REGIONS: usize = Region::ALL.len();
const COUNTS_PER: f64 = 1e6;

macro_rules! experiments_setter {
    () => {
        /// Restrict the query to these experiments, in this order.
        /// By default every experiment in the file is used.
        pub fn experiments<I, S>(mut self, experiments: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.experiments = Some(experiments.into_iter().map(Into::into).collect());
            self
        }
    };
}

macro_rules! flag_setters {
    ($($field:ident),* $(,)?) => {
        $(
            pub fn $field(mut self, $field: bool) -> Self {
                self.$field = $field;
                self
            }
        )*
    };
}

macro_rules! range_setter {
    () => {
        /// Only use reads with lengths in `[lower, upper]`.
        pub fn range(mut self, lower: u32, upper: u32) -> Self {
            self.range = Some((lower, upper));
            self
        }
    };
}

fn region_names(regions: &[Region]) -> Vec<String> {
    regions.iter().map(|r| r.name().to_string()).collect()
}

/// RNA-seq abundance per transcript and region.
#[derive(Debug, Clone, PartialEq)]
pub struct RnaSeqQuery {
    pub experiments: Option<Vec<String>>,
    pub regions: Vec<String>,
    pub alias: bool,
    pub tidy: bool,
    pub compact: bool,
}

impl Default for RnaSeqQuery {
    fn default() -> Self {
        Self {
            experiments: None,
            regions: region_names(&Region::ALL),
            alias: false,
            tidy: true,
            compact: true,
        }
    }
}

impl RnaSeqQuery {
    pub fn new() -> Self {
        Self::default()
    }

    experiments_setter!();
    flag_setters!(alias, tidy, compact);

    pub fn regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }
}

/// Ribosome footprint counts per region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCountsQuery {
    pub experiments: Option<Vec<String>>,
    pub regions: Vec<String>,
    pub range: Option<(u32, u32)>,
    /// Sum over read lengths.
    pub sum_lengths: bool,
    /// Sum over transcripts.
    pub sum_transcripts: bool,
    /// Report counts per million reads of each experiment.
    pub normalize: bool,
    pub alias: bool,
    pub tidy: bool,
    pub compact: bool,
}

impl Default for RegionCountsQuery {
    fn default() -> Self {
        Self {
            experiments: None,
            regions: region_names(&Region::DEFAULT_COUNTS),
            range: None,
            sum_lengths: true,
            sum_transcripts: true,
            normalize: false,
            alias: false,
            tidy: true,
            compact: true,
        }
    }
}

impl RegionCountsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    experiments_setter!();
    range_setter!();
    flag_setters!(sum_lengths, sum_transcripts, normalize, alias, tidy, compact);

    pub fn regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }
}

/// Read length distribution of one region, summed over transcripts.
#[derive(Debug, Clone, PartialEq)]
pub struct LengthDistributionQuery {
    pub experiments: Option<Vec<String>>,
    pub region: String,
    pub range: Option<(u32, u32)>,
    pub normalize: bool,
    pub compact: bool,
}

impl Default for LengthDistributionQuery {
    fn default() -> Self {
        Self {
            experiments: None,
            region: Region::Cds.name().to_string(),
            range: None,
            normalize: false,
            compact: true,
        }
    }
}

impl LengthDistributionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    experiments_setter!();
    range_setter!();
    flag_setters!(normalize, compact);

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }
}

/// Footprint counts by position relative to start or stop codons.
#[derive(Debug, Clone, PartialEq)]
pub struct MetageneQuery {
    pub experiments: Option<Vec<String>>,
    pub site: Site,
    pub range: Option<(u32, u32)>,
    pub sum_lengths: bool,
    pub sum_transcripts: bool,
    pub normalize: bool,
    pub alias: bool,
    pub tidy: bool,
    pub compact: bool,
}

impl Default for MetageneQuery {
    fn default() -> Self {
        Self {
            experiments: None,
            site: Site::Start,
            range: None,
            sum_lengths: true,
            sum_transcripts: true,
            normalize: false,
            alias: false,
            tidy: true,
            compact: true,
        }
    }
}

impl MetageneQuery {
    pub fn new() -> Self {
        Self::default()
    }

    experiments_setter!();
    range_setter!();
    flag_setters!(sum_lengths, sum_transcripts, normalize, alias, tidy, compact);

    pub fn site(mut self, site: Site) -> Self {
        self.site = site;
        self
    }
}

/// Nucleotide coverage of a single transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageQuery {
    pub experiments: Option<Vec<String>>,
    /// Reference name, or alias when `alias` is set.
    pub transcript: String,
    pub range: Option<(u32, u32)>,
    pub sum_lengths: bool,
    pub alias: bool,
    pub tidy: bool,
    pub compact: bool,
}

impl CoverageQuery {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            experiments: None,
            transcript: transcript.into(),
            range: None,
            sum_lengths: true,
            alias: false,
            tidy: true,
            compact: true,
        }
    }

    experiments_setter!();
    range_setter!();
    flag_setters!(sum_lengths, alias, tidy, compact);
}

/// Values a wide table can hold.
trait Measure: Copy {
    fn into_column(values: Vec<Self>) -> Column;
}

impl Measure for u64 {
    fn into_column(values: Vec<Self>) -> Column {
        Column::Count(values)
    }
}

impl Measure for f64 {
    fn into_column(values: Vec<Self>) -> Column {
        Column::Float(values)
    }
}

/// Row labels within one experiment's block. When both are present, rows
/// are length-major: all transcripts of the first length, then the next.
struct RowLayout {
    transcripts: Option<Vec<String>>,
    lengths: Option<Vec<i64>>,
}

impl RowLayout {
    fn new(transcripts: Option<Vec<String>>, lengths: Option<Vec<i64>>) -> Self {
        Self {
            transcripts,
            lengths,
        }
    }

    fn n_transcripts(&self) -> usize {
        self.transcripts.as_ref().map_or(1, Vec::len)
    }

    fn nrows(&self) -> usize {
        self.n_transcripts() * self.lengths.as_ref().map_or(1, Vec::len)
    }

    fn id_columns(&self) -> Vec<&'static str> {
        let mut ids = vec!["experiment"];
        if self.transcripts.is_some() {
            ids.push("transcript");
        }
        if self.lengths.is_some() {
            ids.push("length");
        }
        ids
    }
}

/// Stack per-experiment blocks (same layout, in experiment order) into a
/// wide table: id columns followed by one column per `value_names` entry.
fn assemble<T: Measure>(
    experiments: &[String],
    blocks: &[Array2<T>],
    layout: &RowLayout,
    value_names: &[String],
) -> Result<Table> {
    let rows = layout.nrows();
    if let Some(block) = blocks
        .iter()
        .find(|b| b.nrows() != rows || b.ncols() != value_names.len())
    {
        return Err(RiboError::InternalConsistency(format!(
            "block of shape {:?}, expected ({}, {})",
            block.shape(),
            rows,
            value_names.len()
        )));
    }

    let n_tx = layout.n_transcripts();
    let mut table = Table::new();

    let experiment: Vec<String> = experiments
        .iter()
        .flat_map(|e| std::iter::repeat(e.clone()).take(rows))
        .collect();
    table.push("experiment", Column::Text(experiment))?;

    if let Some(transcripts) = &layout.transcripts {
        let labels: Vec<String> = (0..rows).map(|r| transcripts[r % n_tx].clone()).collect();
        table.push("transcript", Column::Text(labels).tile(experiments.len()))?;
    }
    if let Some(lengths) = &layout.lengths {
        let labels: Vec<i64> = (0..rows).map(|r| lengths[r / n_tx]).collect();
        table.push("length", Column::Int(labels).tile(experiments.len()))?;
    }

    let views: Vec<ArrayView2<T>> = blocks.iter().map(|b| b.view()).collect();
    let stacked = concatenate(Axis(0), &views)?;
    for (j, name) in value_names.iter().enumerate() {
        table.push(name.clone(), T::into_column(stacked.column(j).to_vec()))?;
    }

    Ok(table)
}

enum Shape {
    Wide,
    /// Melt the value columns into `var` and `count`; `numeric` turns the
    /// `var` labels (positions) into integers.
    Tidy { var: &'static str, numeric: bool },
}

fn finish(wide: Table, ids: &[&str], shape: Shape, compact: bool) -> Result<Table> {
    let mut table = match shape {
        Shape::Wide => wide,
        Shape::Tidy { var, numeric } => {
            let mut tidy = wide.melt(ids, var, "count")?;
            if numeric {
                let positions = tidy
                    .column(var)
                    .and_then(Column::strings)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|s| {
                        s.parse::<i64>().map_err(|_| {
                            RiboError::InternalConsistency(format!("non-numeric position '{}'", s))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                tidy.replace(var, Column::Int(positions))?;
            }
            tidy
        }
    };
    if compact {
        table = table.compact();
    }
    Ok(table)
}

fn shape(tidy: bool, var: &'static str, numeric: bool) -> Shape {
    if tidy {
        Shape::Tidy { var, numeric }
    } else {
        Shape::Wide
    }
}

fn requested(ribo: &Ribo, experiments: &Option<Vec<String>>) -> Vec<String> {
    experiments.clone().unwrap_or_else(|| ribo.experiment_names())
}

/// Rows of a length-major dataset holding the reads with lengths in
/// `[lower, upper]`.
fn length_rows(info: &RiboInfo, (lower, upper): (u32, u32), n_transcripts: usize) -> Range<usize> {
    let start = (lower - info.length_min) as usize * n_transcripts;
    let end = (upper - info.length_min + 1) as usize * n_transcripts;
    start..end
}

fn length_labels((lower, upper): (u32, u32)) -> Vec<i64> {
    (lower..=upper).map(i64::from).collect()
}

fn normalized(ribo: &Ribo, experiments: &[String], blocks: Vec<Array2<u64>>) -> Vec<Array2<f64>> {
    experiments
        .iter()
        .zip(blocks)
        .map(|(name, block)| {
            let total = ribo.experiment(name).map_or(0, |e| e.total_reads) as f64;
            block.mapv(|c| c as f64 * COUNTS_PER / total)
        })
        .collect()
}

/// Read and collapse the region count slice of each experiment.
fn region_count_blocks(
    ribo: &Ribo,
    experiments: &[String],
    regions: &[Region],
    range: (u32, u32),
    sum_lengths: bool,
    sum_transcripts: bool,
) -> Result<Vec<Array2<u64>>> {
    let info = ribo.info();
    let n_tx = ribo.n_transcripts();
    let shape = [info.n_lengths() * n_tx, N_REGIONS];
    let rows = length_rows(info, range, n_tx);
    let n_lengths = (range.1 - range.0 + 1) as usize;
    let columns: Vec<usize> = regions.iter().map(|r| r.index()).collect();

    experiments
        .iter()
        .map(|name| {
            let block =
                ribo.read_columns::<u64>(name, REGION_COUNTS_PATH, shape, rows.clone(), &columns)?;
            collapse(block, n_lengths, n_tx, sum_lengths, sum_transcripts)
        })
        .collect()
}

/// RNA-seq abundance for every transcript of the requested experiments.
///
/// Wide output has columns `experiment, transcript, <regions…>`; tidy output
/// has `experiment, transcript, region, count`. Experiments without RNA-seq
/// data are dropped with a warning.
pub fn get_rnaseq(ribo: &Ribo, query: &RnaSeqQuery) -> Result<Table> {
    let requested = requested(ribo, &query.experiments);
    let requested = check_experiments(ribo.experiments(), &requested)?;
    let regions = check_regions(&query.regions)?;
    check_alias(ribo.aliases(), query.alias)?;

    let experiments = check_rnaseq(ribo.experiments(), &requested)?.kept;
    let transcripts = resolve_names(ribo.reference_names(), ribo.aliases(), query.alias)?;

    let n_tx = ribo.n_transcripts();
    let columns: Vec<usize> = regions.iter().map(|r| r.index()).collect();
    let blocks = experiments
        .iter()
        .map(|name| {
            ribo.read_columns::<f64>(name, RNASEQ_PATH, [n_tx, N_REGIONS], 0..n_tx, &columns)
        })
        .collect::<Result<Vec<_>>>()?;

    let layout = RowLayout::new(Some(transcripts), None);
    let wide = assemble(&experiments, &blocks, &layout, &region_names(&regions))?;
    finish(
        wide,
        &layout.id_columns(),
        shape(query.tidy, "region", false),
        query.compact,
    )
}

/// Footprint counts per region, optionally split by transcript and read
/// length.
pub fn get_region_counts(ribo: &Ribo, query: &RegionCountsQuery) -> Result<Table> {
    let requested = requested(ribo, &query.experiments);
    let requested = check_experiments(ribo.experiments(), &requested)?;
    let regions = check_regions(&query.regions)?;
    check_alias(ribo.aliases(), query.alias)?;
    let range = check_length_range(ribo.info(), query.range)?;

    let experiments = check_capability(ribo.experiments(), &requested, Dataset::RegionCounts)?.kept;
    if query.normalize {
        check_total_reads(ribo.experiments(), &experiments)?;
    }
    let transcripts = resolve_names(ribo.reference_names(), ribo.aliases(), query.alias)?;

    let blocks = region_count_blocks(
        ribo,
        &experiments,
        &regions,
        range,
        query.sum_lengths,
        query.sum_transcripts,
    )?;

    let layout = RowLayout::new(
        (!query.sum_transcripts).then_some(transcripts),
        (!query.sum_lengths).then(|| length_labels(range)),
    );
    let names = region_names(&regions);
    let wide = if query.normalize {
        assemble(&experiments, &normalized(ribo, &experiments, blocks), &layout, &names)?
    } else {
        assemble(&experiments, &blocks, &layout, &names)?
    };
    finish(
        wide,
        &layout.id_columns(),
        shape(query.tidy, "region", false),
        query.compact,
    )
}

/// Read counts by length for one region, summed over transcripts. The
/// output is always long: `experiment, length, count`.
pub fn get_length_distribution(ribo: &Ribo, query: &LengthDistributionQuery) -> Result<Table> {
    let requested = requested(ribo, &query.experiments);
    let requested = check_experiments(ribo.experiments(), &requested)?;
    let regions = check_regions(&[query.region.as_str()])?;
    let range = check_length_range(ribo.info(), query.range)?;

    let experiments = check_capability(ribo.experiments(), &requested, Dataset::RegionCounts)?.kept;
    if query.normalize {
        check_total_reads(ribo.experiments(), &experiments)?;
    }

    let blocks = region_count_blocks(ribo, &experiments, &regions, range, false, true)?;
    let layout = RowLayout::new(None, Some(length_labels(range)));
    let names = vec!["count".to_string()];
    let table = if query.normalize {
        assemble(&experiments, &normalized(ribo, &experiments, blocks), &layout, &names)?
    } else {
        assemble(&experiments, &blocks, &layout, &names)?
    };
    finish(table, &layout.id_columns(), Shape::Wide, query.compact)
}

/// Metagene counts around start or stop codons. Wide output has one column
/// per position `-radius..=radius`; tidy output has integer `position` and
/// `count` columns.
pub fn get_metagene(ribo: &Ribo, query: &MetageneQuery) -> Result<Table> {
    let requested = requested(ribo, &query.experiments);
    let requested = check_experiments(ribo.experiments(), &requested)?;
    check_alias(ribo.aliases(), query.alias)?;
    let range = check_length_range(ribo.info(), query.range)?;

    let experiments = check_capability(ribo.experiments(), &requested, Dataset::Metagene)?.kept;
    if query.normalize {
        check_total_reads(ribo.experiments(), &experiments)?;
    }
    let transcripts = resolve_names(ribo.reference_names(), ribo.aliases(), query.alias)?;

    let info = ribo.info();
    let n_tx = ribo.n_transcripts();
    let radius = i64::from(info.metagene_radius);
    let width = (2 * radius + 1) as usize;
    let shape_2d = [info.n_lengths() * n_tx, width];
    let rows = length_rows(info, range, n_tx);
    let n_lengths = (range.1 - range.0 + 1) as usize;

    let blocks = experiments
        .iter()
        .map(|name| {
            let block =
                ribo.read_rows::<u64>(name, query.site.path(), shape_2d, rows.clone(), 0..width)?;
            collapse(block, n_lengths, n_tx, query.sum_lengths, query.sum_transcripts)
        })
        .collect::<Result<Vec<_>>>()?;

    let layout = RowLayout::new(
        (!query.sum_transcripts).then_some(transcripts),
        (!query.sum_lengths).then(|| length_labels(range)),
    );
    let positions: Vec<String> = (-radius..=radius).map(|p| p.to_string()).collect();
    let wide = if query.normalize {
        assemble(&experiments, &normalized(ribo, &experiments, blocks), &layout, &positions)?
    } else {
        assemble(&experiments, &blocks, &layout, &positions)?
    };
    finish(
        wide,
        &layout.id_columns(),
        shape(query.tidy, "position", true),
        query.compact,
    )
}

/// Per-nucleotide coverage of one transcript. Wide output has one column
/// per position `1..=length`; tidy output has integer `position` and
/// `count` columns.
pub fn get_coverage(ribo: &Ribo, query: &CoverageQuery) -> Result<Table> {
    let requested = requested(ribo, &query.experiments);
    let requested = check_experiments(ribo.experiments(), &requested)?;
    check_alias(ribo.aliases(), query.alias)?;
    let index = ribo
        .transcript_index(&query.transcript, query.alias)
        .ok_or_else(|| ValidationError::UnknownTranscript(query.transcript.clone()))?;
    let range = check_length_range(ribo.info(), query.range)?;

    let experiments = check_capability(ribo.experiments(), &requested, Dataset::Coverage)?.kept;

    let info = ribo.info();
    let total = ribo.transcriptome_length() as usize;
    let offset = ribo.transcript_offset(index) as usize;
    let tx_len = ribo.reference_lengths()[index] as usize;
    let len = info.n_lengths() * total;

    // One block per selected read length, `total` apart.
    let strided = Strided {
        start: (range.0 - info.length_min) as usize * total + offset,
        step: total,
        count: (range.1 - range.0 + 1) as usize,
        block: tx_len,
    };
    let blocks = experiments
        .iter()
        .map(|name| -> Result<Array2<u64>> {
            let block = ribo.read_strided::<u64>(name, COVERAGE_PATH, len, strided)?;
            Ok(if query.sum_lengths {
                block.sum_axis(Axis(0)).insert_axis(Axis(0))
            } else {
                block
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let layout = RowLayout::new(None, (!query.sum_lengths).then(|| length_labels(range)));
    let positions: Vec<String> = (1..=tx_len).map(|p| p.to_string()).collect();
    let wide = assemble(&experiments, &blocks, &layout, &positions)?;
    finish(
        wide,
        &layout.id_columns(),
        shape(query.tidy, "position", true),
        query.compact,
    )
}

/// Transcript lengths as a table of `transcript, length`.
pub fn get_reference_lengths(ribo: &Ribo, alias: bool) -> Result<Table> {
    check_alias(ribo.aliases(), alias)?;
    let transcripts = resolve_names(ribo.reference_names(), ribo.aliases(), alias)?;
    Table::new()
        .with_column("transcript", Column::Text(transcripts))?
        .with_column("length", Column::Count(ribo.reference_lengths().to_vec()))
}
