pub mod controller;
pub mod hints;
pub mod hub;
pub mod scoring;
pub mod timer;
