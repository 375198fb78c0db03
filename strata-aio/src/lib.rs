// strata-aio/src/lib.rs
pub mod fs;
pub mod git;
pub mod json_io;
pub mod process;
