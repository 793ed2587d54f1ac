pub mod query;
pub mod records;
pub mod search;
pub mod stringing;
pub mod validation;

pub use query::{Filter, FilterError, ListOptions};
pub use records::*;
pub use validation::FieldError;
