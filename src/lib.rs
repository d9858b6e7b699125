pub mod applications;
pub mod auth;
pub mod clock;
pub mod codes;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod response;
pub mod routes;
pub mod schema;
pub mod seed;
pub mod sla;
pub mod state;
pub mod users;
