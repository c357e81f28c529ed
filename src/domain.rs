//! Domain module - catalog types, normalization rules and pipeline ports
//!
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod category;
pub mod errors;
pub mod normalize;
pub mod pagination;
pub mod product;
pub mod schema;
pub mod services;

pub use category::Category;
pub use errors::{CrawlError, CrawlResult, NavigationError, SchemaError};
pub use pagination::{PageAddressing, PagePlan};
pub use product::{CategoryResult, FieldValue, ProductRecord, ProductRef, SpecGroup, SpecValue};
pub use schema::{SchemaEntry, SchemaPolicy, SchemaRegistry, SerializationType};
