//! # otree-db-api
//!
//! The embedding surface for OTree tables: open a table directory, write
//! batches with index options, read the table or a uniform sample back, and
//! run the `ANALYZE` / `OPTIMIZE` maintenance commands.
//!
//! ```ignore
//! use otree_db_api::{Table, WriteOptions};
//! use otree_db_core::EngineConfig;
//!
//! let table = Table::open("/data/store_sales", EngineConfig::default()).await?;
//! let options = WriteOptions::new()
//!     .with_columns_to_index("ss_cdemo_sk,ss_hdemo_sk")
//!     .with_cube_size(300_000);
//! table.write(&batch, &options).await?;
//!
//! let sample = table.sample(0.1).await?;
//! ```

pub mod error;
pub mod options;
pub mod table;

pub use error::{ApiError, Result};
pub use options::{WriteOptions, COLUMNS_TO_INDEX, CUBE_SIZE, STAGING_SIZE_IN_BYTES};
pub use table::Table;
