pub mod admin;
pub mod auth;
pub mod clusters;
pub mod people;
pub mod resources;
pub mod root;
