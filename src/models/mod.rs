pub mod candidate;
pub mod cv;
pub mod question;
pub mod test_definition;
pub mod test_result;
pub mod user_answer;
pub mod webhook_log;
