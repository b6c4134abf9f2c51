pub mod cats;
pub mod modify;
pub mod report;
pub mod schema;
pub mod seed;
