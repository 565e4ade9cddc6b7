// fetch.rs

//! Hyperslab reads against per-experiment datasets. Every read requests
//! exactly the rows and columns a query needs, nothing in between.

use std::ops::Range;

use hdf5::{H5Type, Hyperslab, Selection, SliceOrIndex};
use ndarray::{concatenate, s, Array2, ArrayView2, Axis};
use tracing::debug;

use crate::{
    error::{Result, RiboError},
    store::{experiment_path, Ribo},
};

impl Ribo {
    fn experiment_dataset(&self, experiment: &str, path: &str) -> Result<hdf5::Dataset> {
        Ok(self
            .file()
            .dataset(&format!("{}/{}", experiment_path(experiment), path))?)
    }

    /// Read `rows × cols` of a 2-D per-experiment dataset whose full shape
    /// must be `shape`.
    pub(crate) fn read_rows<T: H5Type>(
        &self,
        experiment: &str,
        path: &str,
        shape: [usize; 2],
        rows: Range<usize>,
        cols: Range<usize>,
    ) -> Result<Array2<T>> {
        let ds = self.experiment_dataset(experiment, path)?;
        let found = ds.shape();
        if found != shape {
            return Err(RiboError::InvalidFormat(format!(
                "{}/{} has shape {:?}, expected {:?}",
                experiment, path, found, shape
            )));
        }
        if rows.end > shape[0] || cols.end > shape[1] {
            return Err(RiboError::InternalConsistency(format!(
                "rows {:?} and columns {:?} exceed shape {:?}",
                rows, cols, shape
            )));
        }
        debug!(experiment, path, ?rows, ?cols, "reading block");
        Ok(ds.read_slice_2d::<T, _>(s![rows.start..rows.end, cols.start..cols.end])?)
    }

    /// Read `strided.count` equally spaced blocks of `strided.block`
    /// elements from a 1-D per-experiment dataset of length `len`, as one
    /// hyperslab. Row `i` of the result is the `i`-th block.
    pub(crate) fn read_strided<T: H5Type>(
        &self,
        experiment: &str,
        path: &str,
        len: usize,
        strided: Strided,
    ) -> Result<Array2<T>> {
        let ds = self.experiment_dataset(experiment, path)?;
        let found = ds.shape();
        if found != [len] {
            return Err(RiboError::InvalidFormat(format!(
                "{}/{} has shape {:?}, expected [{}]",
                experiment, path, found, len
            )));
        }
        if strided.end() > len {
            return Err(RiboError::InternalConsistency(format!(
                "{:?} exceeds length {}",
                strided, len
            )));
        }
        if strided.count == 0 || strided.block == 0 {
            return Ok(Array2::from_shape_vec((strided.count, strided.block), Vec::new())?);
        }
        debug!(experiment, path, ?strided, "reading strided blocks");
        let values = ds.read_slice_1d::<T, _>(strided.selection())?;
        Ok(values.into_shape((strided.count, strided.block))?)
    }

    /// Read the columns `wanted` (any order) of the given rows. Only those
    /// columns are requested: one hyperslab per run of adjacent columns.
    pub(crate) fn read_columns<T: H5Type + Clone>(
        &self,
        experiment: &str,
        path: &str,
        shape: [usize; 2],
        rows: Range<usize>,
        wanted: &[usize],
    ) -> Result<Array2<T>> {
        let runs = column_runs(wanted);
        if runs.is_empty() {
            return Err(RiboError::InternalConsistency(
                "column read with no columns".to_string(),
            ));
        }
        let blocks = runs
            .iter()
            .map(|run| self.read_rows::<T>(experiment, path, shape, rows.clone(), run.clone()))
            .collect::<Result<Vec<_>>>()?;
        let views: Vec<ArrayView2<T>> = blocks.iter().map(|b| b.view()).collect();
        let read = concatenate(Axis(1), &views)?;

        let order: Vec<usize> = runs.iter().flat_map(|run| run.clone()).collect();
        let local = wanted
            .iter()
            .map(|c| order.iter().position(|o| o == c))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| RiboError::InternalConsistency("column not read".to_string()))?;
        Ok(read.select(Axis(1), &local))
    }
}

/// Maximal runs of adjacent column indices covering `wanted` exactly, in
/// ascending order.
pub(crate) fn column_runs(wanted: &[usize]) -> Vec<Range<usize>> {
    let mut sorted = wanted.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let mut runs: Vec<Range<usize>> = Vec::new();
    for c in sorted {
        match runs.last_mut() {
            Some(run) if run.end == c => run.end = c + 1,
            _ => runs.push(c..c + 1),
        }
    }
    runs
}

/// A regular 1-D hyperslab: `count` blocks of `block` elements, the first
/// at `start` and each `step` after the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Strided {
    pub start: usize,
    pub step: usize,
    pub count: usize,
    pub block: usize,
}

impl Strided {
    /// One past the last selected element.
    pub fn end(&self) -> usize {
        match self.count {
            0 => self.start,
            n => self.start + (n - 1) * self.step + self.block,
        }
    }

    fn selection(&self) -> Selection {
        // HDF5 requires step >= block even when only one block is selected.
        Selection::from(Hyperslab::from(vec![SliceOrIndex::SliceCount {
            start: self.start,
            step: self.step.max(self.block),
            count: self.count,
            block: self.block,
        }]))
    }
}

/// Sum a length-major block (`n_lengths · n_transcripts` rows) over read
/// lengths and/or transcripts. Rows of the result are, respectively:
/// transcripts, lengths, a single total row, or the block unchanged.
pub(crate) fn collapse<T>(
    block: Array2<T>,
    n_lengths: usize,
    n_transcripts: usize,
    sum_lengths: bool,
    sum_transcripts: bool,
) -> Result<Array2<T>>
where
    T: Clone + num_traits::Zero,
{
    let ncols = block.ncols();
    if !sum_lengths && !sum_transcripts {
        return Ok(block);
    }
    let cube = block
        .as_standard_layout()
        .into_owned()
        .into_shape((n_lengths, n_transcripts, ncols))?;
    Ok(match (sum_lengths, sum_transcripts) {
        (true, true) => cube
            .sum_axis(Axis(0))
            .sum_axis(Axis(0))
            .insert_axis(Axis(0)),
        (true, false) => cube.sum_axis(Axis(0)),
        _ => cube.sum_axis(Axis(1)),
    })
}
