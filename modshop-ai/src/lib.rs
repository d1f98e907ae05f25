pub mod extract;
pub mod models;
pub mod prompt;
pub mod provider;

// Re-export public APIs
pub use models::VisionConfig;
pub use provider::VisionReceiptAnalyzer;
