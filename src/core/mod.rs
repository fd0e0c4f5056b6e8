pub mod logging;

// Document store capability: Elasticsearch client + in-memory evaluator
pub mod store;

pub mod trademark;
