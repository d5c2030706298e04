pub mod directory_repo;
pub mod email_log_repo;
pub mod event_repo;
pub mod survey_repo;
pub mod user_repo;
