// src/wide_column/mod.rs

pub mod memory;
pub mod repository;
pub mod schema;
pub mod session;
pub mod value;

pub use memory::MemoryCluster;
pub use repository::WideColumnRepository;
pub use schema::{Column, Direction, OrderBy, Table};
pub use session::{Consistency, CqlSession, Statement, StatementKind};
pub use value::{ColumnValues, CqlValue, Row};
