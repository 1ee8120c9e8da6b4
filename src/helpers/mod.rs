//! Small pure helpers shared by commands: check dates and stored file names.

pub mod date;
pub mod file;
