pub mod item_store;
pub mod orchestrator;
pub mod prompt_builder;
pub mod provider_registry;
pub mod response_parser;
