pub mod alias;
pub mod error;
mod fetch;
pub mod query;
pub mod region;
pub mod store;
pub mod table;
pub mod validate;

pub use alias::{default_alias, resolve_names, AliasMap};
pub use error::{CapabilityWarning, Result, RiboError, ValidationError};
pub use query::{
    get_coverage, get_length_distribution, get_metagene, get_reference_lengths,
    get_region_counts, get_rnaseq, CoverageQuery, LengthDistributionQuery, MetageneQuery,
    RegionCountsQuery, RnaSeqQuery,
};
pub use region::{Dataset, Region, Site};
pub use store::{ExperimentInfo, Ribo, RiboBuilder, RiboInfo};
pub use table::{Column, Factor, Table, Value};
