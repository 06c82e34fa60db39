pub mod error_tests;
pub mod inference_tests;
pub mod linking_tests;
pub mod mapping_tests;
pub mod model_tests;
pub mod schema_loader_tests;
