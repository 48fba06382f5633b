pub mod run;
pub mod sessions;
pub mod workflows;
