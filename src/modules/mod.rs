//! Pipeline building blocks on top of the engines
//!
//! `seq` generates synthetic sequence data, `io` loads genomes and pattern
//! sets and writes match tables.

pub mod seq;
pub mod io;
