// tests/common/mod.rs
#![allow(dead_code)]

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use hdf5::types::VarLenUnicode;
use ndarray::{Array1, Array2};

pub struct TestDir {
    dir: PathBuf,
    #[allow(dead_code)]
    temp_dir: Option<tempfile::TempDir>,
}

impl TestDir {
    pub fn new(prefix: &str) -> std::io::Result<Self> {
        let keep_output = env::var("KEEP_TEST_OUTPUT").is_ok();
        if keep_output {
            let output_dir = env::current_dir()?.join("test_output").join(prefix);
            std::fs::create_dir_all(&output_dir)?;
            Ok(TestDir {
                dir: output_dir,
                temp_dir: None,
            })
        } else {
            let temp_dir = tempfile::tempdir()?;
            let dir = temp_dir.path().to_path_buf();
            Ok(TestDir {
                dir,
                temp_dir: Some(temp_dir),
            })
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub const LENGTH_MIN: u32 = 28;
pub const LENGTH_MAX: u32 = 30;
pub const RADIUS: u32 = 2;

pub struct ExperimentFixture {
    pub name: &'static str,
    pub total_reads: u64,
    pub rnaseq: bool,
    pub coverage: bool,
    pub metadata: Option<&'static str>,
    /// Store a malformed RNA-seq dataset, so any read of it fails.
    pub broken_rnaseq: bool,
}

impl ExperimentFixture {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            total_reads: 500_000,
            rnaseq: true,
            coverage: true,
            metadata: None,
            broken_rnaseq: false,
        }
    }
}

/// Everything needed to write a small but complete ribo file. Dataset
/// values are deterministic functions of their coordinates (see the
/// `*_value` functions) so tests can compute expectations.
pub struct RiboFixture {
    pub transcripts: Vec<String>,
    pub lengths: Vec<u64>,
    pub aliases: Option<Vec<String>>,
    pub metadata: Option<&'static str>,
    pub experiments: Vec<ExperimentFixture>,
}

impl Default for RiboFixture {
    fn default() -> Self {
        Self {
            transcripts: vec![
                "ENST01|ENSG01|-|-|GAPDH-201|GAPDH|6|protein_coding|".to_string(),
                "ENST02|ENSG02|-|-|VEGFA-201|VEGFA|4|protein_coding|".to_string(),
                "ENST03|ENSG03|-|-|MYC-201|MYC|5|protein_coding|".to_string(),
                "ENST04|ENSG04|-|-|ACTB-201|ACTB|3|protein_coding|".to_string(),
            ],
            lengths: vec![6, 4, 5, 3],
            aliases: Some(vec![
                "GAPDH".to_string(),
                "VEGFA".to_string(),
                "MYC".to_string(),
                "ACTB".to_string(),
            ]),
            metadata: Some("aligner: bowtie2\nlink: https://example.org/ribo\n"),
            experiments: vec![
                ExperimentFixture::new("Hela_1"),
                ExperimentFixture::new("Hela_2"),
                ExperimentFixture::new("WT_1"),
            ],
        }
    }
}

pub fn n_lengths() -> usize {
    (LENGTH_MAX - LENGTH_MIN + 1) as usize
}

pub fn region_count_value(experiment: usize, length: usize, transcript: usize, region: usize) -> u64 {
    ((experiment + 1) * 1000 + length * 100 + transcript * 10 + region) as u64
}

pub fn metagene_value(
    experiment: usize,
    stop: bool,
    length: usize,
    transcript: usize,
    position: usize,
) -> u64 {
    let site = if stop { 5000 } else { 0 };
    (site + (experiment + 1) * 1000 + length * 100 + transcript * 10 + position) as u64
}

/// `position` is the offset in the concatenated transcriptome.
pub fn coverage_value(experiment: usize, length: usize, position: usize) -> u64 {
    ((experiment + 1) * 1000 + length * 100 + position) as u64
}

pub fn rnaseq_value(experiment: usize, transcript: usize, region: usize) -> f64 {
    (experiment + 1) as f64 * 100.0 + transcript as f64 * 10.0 + region as f64 + 0.5
}

fn unicode(values: &[String]) -> Array1<VarLenUnicode> {
    values
        .iter()
        .map(|s| VarLenUnicode::from_str(s).expect("valid UTF-8"))
        .collect()
}

fn write_u64_attr(loc: &hdf5::Location, name: &str, value: u64) -> hdf5::Result<()> {
    loc.new_attr::<u64>().create(name)?.write_scalar(&value)
}

fn write_str_attr(loc: &hdf5::Location, name: &str, value: &str) -> hdf5::Result<()> {
    let value = VarLenUnicode::from_str(value).expect("valid UTF-8");
    loc.new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)
}

impl RiboFixture {
    pub fn write(&self, path: &Path) -> hdf5::Result<()> {
        let file = hdf5::File::create(path)?;
        write_u64_attr(&file, "format_version", 1)?;
        write_str_attr(&file, "reference", "appris-v1")?;
        write_u64_attr(&file, "length_min", LENGTH_MIN as u64)?;
        write_u64_attr(&file, "length_max", LENGTH_MAX as u64)?;
        write_u64_attr(&file, "left_span", 35)?;
        write_u64_attr(&file, "right_span", 10)?;
        write_u64_attr(&file, "metagene_radius", RADIUS as u64)?;
        if let Some(metadata) = self.metadata {
            write_str_attr(&file, "metadata", metadata)?;
        }

        let reference = file.create_group("reference")?;
        reference
            .new_dataset_builder()
            .with_data(&unicode(&self.transcripts))
            .create("reference_names")?;
        reference
            .new_dataset_builder()
            .with_data(&Array1::from(self.lengths.clone()))
            .create("reference_lengths")?;
        if let Some(aliases) = &self.aliases {
            reference
                .new_dataset_builder()
                .with_data(&unicode(aliases))
                .create("aliases")?;
        }

        let experiments = file.create_group("experiments")?;
        for (e, experiment) in self.experiments.iter().enumerate() {
            let group = experiments.create_group(experiment.name)?;
            self.write_experiment(&group, e, experiment)?;
        }
        Ok(())
    }

    fn write_experiment(
        &self,
        group: &hdf5::Group,
        e: usize,
        experiment: &ExperimentFixture,
    ) -> hdf5::Result<()> {
        let n_tx = self.transcripts.len();
        let rows = n_lengths() * n_tx;

        write_u64_attr(group, "total_reads", experiment.total_reads)?;
        if let Some(metadata) = experiment.metadata {
            write_str_attr(group, "metadata", metadata)?;
        }

        let counts = Array2::from_shape_fn((rows, 5), |(row, region)| {
            region_count_value(e, row / n_tx, row % n_tx, region)
        });
        group
            .create_group("region_counts")?
            .new_dataset_builder()
            .with_data(&counts)
            .create("region_counts")?;

        let width = (2 * RADIUS + 1) as usize;
        let metagene = group.create_group("metagene")?;
        for (site, stop) in [("start", false), ("stop", true)] {
            let values = Array2::from_shape_fn((rows, width), |(row, position)| {
                metagene_value(e, stop, row / n_tx, row % n_tx, position)
            });
            metagene
                .new_dataset_builder()
                .with_data(&values)
                .create(site)?;
        }

        if experiment.coverage {
            let total: usize = self.lengths.iter().sum::<u64>() as usize;
            let values = Array1::from_shape_fn(n_lengths() * total, |i| {
                coverage_value(e, i / total, i % total)
            });
            group
                .create_group("coverage")?
                .new_dataset_builder()
                .with_data(&values)
                .create("coverage")?;
        }

        if experiment.broken_rnaseq {
            group
                .create_group("rnaseq")?
                .new_dataset_builder()
                .with_data(&Array1::from(vec![1.0f64, 2.0]))
                .create("rnaseq")?;
        } else if experiment.rnaseq {
            let values =
                Array2::from_shape_fn((n_tx, 5), |(t, region)| rnaseq_value(e, t, region));
            group
                .create_group("rnaseq")?
                .new_dataset_builder()
                .with_data(&values)
                .create("rnaseq")?;
        }
        Ok(())
    }

    /// Write the fixture into a fresh test directory and return the path.
    pub fn create(&self, dir: &TestDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        self.write(&path).expect("Failed to write ribo fixture");
        path
    }
}
