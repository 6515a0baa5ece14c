pub mod config;
pub mod events;
pub mod facts;
pub mod handlers;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;
