pub mod cli;
pub mod config;
pub mod model;
pub mod parse;
pub mod query;
pub mod scan;
pub mod stream;
pub mod watch;
pub mod web;
