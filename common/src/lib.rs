mod db;
mod error;
mod helpers;
mod provider;
mod schema;
mod service;
mod transfer;
mod webhook;

pub use db::*;
pub use error::*;
pub use helpers::*;
pub use provider::*;
pub use schema::*;
pub use service::*;
pub use transfer::*;
pub use webhook::*;
