pub mod calendar;
pub mod client;
pub mod context;
pub mod prompts;
pub mod provider;
pub mod schema;
