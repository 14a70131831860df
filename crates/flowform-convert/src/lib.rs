//! Flowform Convert: exporter, importer and layout inference between flow
//! graphs and relational questionnaire records

pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod layout;
pub mod pk;


#[cfg(test)]
pub mod test_utils;

pub use config::{CONFIG_FILE, ConvertConfig, DEFAULT_GRAPH_NAME, LayoutConfig};
pub use error::{ConvertError, Result};
pub use export::{Exporter, export};
pub use import::{ImportedFlow, Importer, import};
pub use layout::{Layout, LayoutInferencer, split_pair};
pub use pk::{NUMERIC_PK_PREFIX, PkGenerator, RandomPks, SequentialPks};
