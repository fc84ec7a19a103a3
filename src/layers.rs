pub mod hub;
pub mod stdio;
