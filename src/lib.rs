use std::sync::Arc;

use redis::Client as RedisClient;
use sqlx::PgPool;

use collab::room::TripRooms;
use config::Config;
use geo::cache::GeoService;

pub mod collab;
pub mod config;
pub mod geo;
pub mod middleware;
pub mod utils;

pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub redis: Arc<RedisClient>,
    pub rooms: Arc<TripRooms>,
    pub geo: Arc<GeoService>,
}
