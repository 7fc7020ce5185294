pub mod config;
pub mod feedback;
pub mod health;
pub mod review;
pub mod verify;
