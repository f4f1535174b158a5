pub mod validation;

pub use validation::{AppJson, AppPath, ValidatedJson};
