pub mod loader;
#[cfg(test)]
pub mod test_fixtures;
pub mod types;

pub use loader::*;
pub use types::*;
