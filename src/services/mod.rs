pub mod attempt_service;
pub mod candidate_service;
pub mod eligibility;
pub mod notification_service;
pub mod question_pool;
pub mod scoring;
pub mod test_service;
