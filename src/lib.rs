pub mod batch;
pub mod dictionary;
pub mod fetch;
pub mod period;
pub mod process;
