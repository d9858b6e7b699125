use std::sync::Arc;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    auth::jwt::JwtService,
    clock::{Clock, SystemClock},
    codes::DisplayCodeIssuer,
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub jwt: JwtService,
    pub clock: Arc<dyn Clock>,
    pub display_codes: Arc<DisplayCodeIssuer>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig, jwt: JwtService) -> Self {
        Self::with_clock(pool, config, jwt, Arc::new(SystemClock))
    }

    pub fn with_clock(
        pool: PgPool,
        config: AppConfig,
        jwt: JwtService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            jwt,
            clock,
            display_codes: Arc::new(DisplayCodeIssuer::new()),
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }
}
