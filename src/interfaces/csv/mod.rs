//! CSV command scripts in, balance reports out.

pub mod command_reader;
pub mod report_writer;
pub mod script_runner;
