pub mod answer;
pub mod candidate;
pub mod question;
pub mod resume_request;
pub mod test;
pub mod test_attempt;
