pub mod aggregate;
pub mod careplan;
pub mod error;
pub mod horizon;
pub mod input;
pub mod normalize;
pub mod report;
pub mod tier;

pub use aggregate::*;
pub use careplan::*;
pub use error::*;
pub use horizon::*;
pub use input::*;
pub use normalize::*;
pub use report::*;
pub use tier::*;
