pub mod csv;
pub mod wfdb;
