use std::env;
use std::sync::Arc;

use anyhow::{anyhow, ensure, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, NaiveDateTime};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use http_body_util::BodyExt;
use loan_origination::auth::{jwt::JwtService, password};
use loan_origination::clock::FixedClock;
use loan_origination::config::AppConfig;
use loan_origination::db::{self, PgPool};
use loan_origination::domain::Role;
use loan_origination::models::NewUser;
use loan_origination::routes;
use loan_origination::state::AppState;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub struct TestApp {
    pub state: AppState,
    pub clock: Arc<FixedClock>,
    router: Router,
}

impl TestApp {
    /// Builds the app against `TEST_DATABASE_URL`.
    pub async fn new() -> Result<Self> {
        Self::with_database(test_database_url()?, "production").await
    }

    pub async fn with_database(database_url: String, app_env: &str) -> Result<Self> {
        let config = AppConfig {
            database_url,
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            cors_allowed_origin: None,
            app_env: app_env.to_string(),
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let clock = Arc::new(FixedClock::new(start_of_test_day()));
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::with_clock(pool, config, jwt, clock.clone());
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            clock,
            router,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(truncate_all).await
    }

    #[allow(dead_code)]
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub async fn insert_user(&self, email: &str, password: &str, role: Role) -> Result<Uuid> {
        let email = email.to_string();
        let password = password.to_string();
        self.with_conn(move |conn| {
            let password_hash = password::hash_password(&password)?;
            let user = NewUser {
                id: Uuid::new_v4(),
                name: email.split('@').next().unwrap_or("user").to_string(),
                email,
                password_hash,
                phone: None,
                agent_code: None,
                role,
            };
            diesel::insert_into(loan_origination::schema::users::table)
                .values(&user)
                .execute(conn)
                .context("failed to insert user")?;
            Ok(user.id)
        })
        .await
    }

    pub async fn login_token(&self, email: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            email: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json("/api/auth/login", &LoginPayload { email, password }, None)
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = json_body(response).await?;
        body["data"]["access_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("login response carried no access token"))
    }

    /// Inserts a user with `role` and returns `(user_id, token)`.
    #[allow(dead_code)]
    pub async fn user_with_token(&self, email: &str, role: Role) -> Result<(Uuid, String)> {
        let password = "s3cret-pass";
        let id = self.insert_user(email, password, role).await?;
        let token = self.login_token(email, password).await?;
        Ok((id, token))
    }

    /// Submits a valid application and returns its response `data`.
    #[allow(dead_code)]
    pub async fn submit_application(&self, token: &str) -> Result<Value> {
        let response = self
            .post_json("/api/applications", &sample_application(), Some(token))
            .await?;
        ensure!(
            response.status() == StatusCode::CREATED,
            "application submission failed with status {}",
            response.status()
        );
        let body = json_body(response).await?;
        Ok(body["data"].clone())
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PUT, path, payload, token).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::DELETE).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub fn test_database_url() -> Result<String> {
    env::var("TEST_DATABASE_URL").context("TEST_DATABASE_URL must be set for integration tests")
}

pub fn sample_application() -> Value {
    serde_json::json!({
        "national_id": "3275125009750002",
        "full_name": "Rina Wulandari",
        "address": "Jl. Asia Afrika 8, Bandung",
        "birth_place": "Bandung",
        "birth_date": "1988-06-21",
        "loan_type": "mortgage",
        "collateral_type": "CERTIFICATE",
        "ceiling_amount": "350000000.00"
    })
}

pub fn start_of_test_day() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2025-05-05 08:00:00", "%Y-%m-%d %H:%M:%S")
        .expect("valid fixture timestamp")
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn json_body(response: hyper::Response<Body>) -> Result<Value> {
    let bytes = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&bytes).context("response body was not JSON")
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        db::run_migrations(&mut conn)?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE application_sla, application_status, credit_applications, users \
         RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
