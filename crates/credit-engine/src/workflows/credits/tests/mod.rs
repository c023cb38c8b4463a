mod common;
mod report;
