pub mod adapter;
pub mod configuration;
pub mod errors;
pub mod markup;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod session;
pub mod transcript;
