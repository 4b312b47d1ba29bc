pub mod asserts;
pub mod clients;
pub mod fixtures;
pub mod testing;

pub use asserts::*;
pub use clients::*;
pub use fixtures::*;
pub use testing::*;
