// Application layer - Use cases and collaborator seams
pub mod charging_service;
pub mod insight;
pub mod session_repository;
pub mod session_tracker;
