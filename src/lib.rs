#![doc = "The `todoapp` library crate."]
#![doc = ""]
#![doc = "Session-authenticated to-do lists: registration, login/logout, a session-held"]
#![doc = "password reset, and per-user task CRUD. The binary (`main.rs`) wires the"]
#![doc = "middleware stack and routes declared here into an `HttpServer`."]

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod views;

pub use crate::error::AppError;
