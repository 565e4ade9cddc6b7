// region.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Annotated transcript segments. The discriminant order matches the column
/// order of every region-shaped array in a ribo file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    Utr5,
    Utr5j,
    Cds,
    Utr3j,
    Utr3,
}

impl Region {
    pub const ALL: [Region; 5] = [
        Region::Utr5,
        Region::Utr5j,
        Region::Cds,
        Region::Utr3j,
        Region::Utr3,
    ];

    /// Regions reported by region count queries unless asked otherwise.
    pub const DEFAULT_COUNTS: [Region; 3] = [Region::Utr5, Region::Cds, Region::Utr3];

    /// Column index in the underlying (transcripts × regions) arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Region::Utr5 => "UTR5",
            Region::Utr5j => "UTR5J",
            Region::Cds => "CDS",
            Region::Utr3j => "UTR3J",
            Region::Utr3 => "UTR3",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Region {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UTR5" => Ok(Region::Utr5),
            "UTR5J" | "UTR5_JUNCTION" => Ok(Region::Utr5j),
            "CDS" => Ok(Region::Cds),
            "UTR3J" | "UTR3_JUNCTION" => Ok(Region::Utr3j),
            "UTR3" => Ok(Region::Utr3),
            _ => Err(ValidationError::UnknownRegions(vec![s.to_string()])),
        }
    }
}

/// The dataset families an experiment may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dataset {
    RegionCounts,
    Metagene,
    Coverage,
    RnaSeq,
}

impl Dataset {
    /// Path of the dataset relative to an experiment group. Metagene data
    /// is split by site and has no single path.
    pub(crate) fn path(self) -> Option<&'static str> {
        match self {
            Dataset::RegionCounts => Some("region_counts/region_counts"),
            Dataset::Metagene => None,
            Dataset::Coverage => Some("coverage/coverage"),
            Dataset::RnaSeq => Some("rnaseq/rnaseq"),
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dataset::RegionCounts => "region count",
            Dataset::Metagene => "metagene",
            Dataset::Coverage => "coverage",
            Dataset::RnaSeq => "RNA-seq",
        };
        f.write_str(name)
    }
}

/// Metagene anchor: start or stop codon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Site {
    #[default]
    Start,
    Stop,
}

impl Site {
    pub(crate) fn path(self) -> &'static str {
        match self {
            Site::Start => "metagene/start",
            Site::Stop => "metagene/stop",
        }
    }
}

impl FromStr for Site {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" => Ok(Site::Start),
            "stop" => Ok(Site::Stop),
            _ => Err(ValidationError::UnknownSite(s.to_string())),
        }
    }
}
