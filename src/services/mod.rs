pub mod analytics_service;
pub mod api_client;
pub mod candidate_store;
pub mod creator_service;
pub mod keep_alive;
pub mod student_service;
pub mod test_builder;
pub mod test_manifest;
