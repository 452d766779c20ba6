pub mod buffer;
pub mod worker;
