pub mod admin_dto;
pub mod attempt_dto;
pub mod candidate_dto;
