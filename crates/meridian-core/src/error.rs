// This crate does not define its own error enum. Unlike the teacher, where
// the loop crate grew an error type independent of its contracts crate, the
// whole Meridian workspace shares one taxonomy (`meridian_contracts::error`)
// so a tool failure, a budget overrun and a resume-validation failure all
// carry the same `kind()` through to the API and CLI.

pub use meridian_contracts::error::MeridianError as CoreError;
pub use meridian_contracts::error::Result;
