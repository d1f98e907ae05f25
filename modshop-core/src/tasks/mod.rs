pub mod job_poller;
