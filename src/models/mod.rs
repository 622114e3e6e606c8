pub mod company;
pub mod job;
pub mod job_record;
pub mod target;
