pub mod builder;
pub mod config;
pub mod dry_run;
