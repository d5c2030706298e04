pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mailer;
pub mod middleware;
pub mod repos;
pub mod routes;
pub mod state;
