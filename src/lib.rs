use std::sync::Arc;

use config::Config;
use database::Datastore;
use gateway::Gateway;

pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Datastore>,
    pub gateway: Gateway,
}
