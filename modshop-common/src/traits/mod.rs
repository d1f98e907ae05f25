pub mod messaging_traits;
pub mod receipt_traits;
pub mod repository_traits;
