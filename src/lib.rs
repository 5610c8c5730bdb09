pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod export;
pub mod page;
pub mod query;
pub mod records;
pub mod store;
pub mod view;

#[cfg(test)]
mod tests;
