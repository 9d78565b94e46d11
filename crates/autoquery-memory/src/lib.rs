//! In-memory implementations of the autoquery `QueryDataSource` contract
//!
//! - [`MemorySource`]: every operator, joins and aggregates over rows held in
//!   memory. The reference backend.
//! - [`PartitionedMemorySource`]: a hash/range key table that answers key
//!   conditions natively and everything else as post-filters, failing fast on
//!   operator combinations it cannot express.
//!
//! ## Example
//!
//! ```rust,ignore
//! use autoquery_memory::MemorySource;
//!
//! let source = MemorySource::new().with_table(&rockstars)?;
//! let autoquery = AutoQuery::builder(AutoQueryConfig::default())
//!     .add_data_source::<Rockstar>(Arc::new(source))
//!     .register::<QueryRockstars>()?
//!     .build()?;
//! ```

mod cursor;
mod factory;
mod partitioned;
mod rows;
mod source;

pub use cursor::Cursor;
pub use factory::MemorySourceFactory;
pub use partitioned::PartitionedMemorySource;
pub use rows::to_rows;
pub use source::MemorySource;
