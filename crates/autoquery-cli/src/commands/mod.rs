pub mod describe;
pub mod query;

pub use describe::DescribeCommand;
pub use query::QueryCommand;
