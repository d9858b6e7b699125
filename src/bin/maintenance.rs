use std::env;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use loan_origination::{
    applications, clock::SystemClock, codes::DisplayCodeIssuer, config::AppConfig, db, seed, sla,
};

const USAGE: &str = "Usage: maintenance <migrate | seed | sla-report <application-code>>";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("migrate") => migrate()?,
        Some("seed") => seed_demo_data()?,
        Some("sla-report") => match args.next() {
            Some(code) => sla_report(&code)?,
            None => {
                eprintln!("{USAGE}");
                std::process::exit(1);
            }
        },
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn connect() -> Result<db::PgPool> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded configuration"
    );
    db::init_pool_with_size(&config.database_url, 1)
}

fn migrate() -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;
    let applied = db::run_migrations(&mut conn)?;
    println!("Applied {applied} migration(s).");
    Ok(())
}

fn seed_demo_data() -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;
    db::run_migrations(&mut conn)?;

    let password = env::var("SEED_PASSWORD").unwrap_or_else(|_| seed::DEFAULT_PASSWORD.to_string());
    let summary = seed::seed_demo_data(&mut conn, &DisplayCodeIssuer::new(), &SystemClock, &password)
        .context("failed to seed demo data")?;

    println!(
        "Seeded {} user(s), {} application(s), {} status entries.",
        summary.users, summary.applications, summary.statuses
    );
    println!("Sign in as admin@example.com, agent@example.com or sulthan@example.com.");
    Ok(())
}

fn sla_report(identifier: &str) -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let application = applications::resolve_application(&mut conn, identifier)
        .with_context(|| format!("failed to look up application {identifier}"))?;
    let summary = sla::summarize_by_application(&mut conn, application.id)
        .context("failed to load SLA transitions")?;

    println!("SLA report for {}", application.display_code);
    if summary.transitions.is_empty() {
        println!("No status transitions recorded yet.");
    }
    for transition in &summary.transitions {
        println!(
            "  {} -> {}  {:>6} min  ({} .. {})",
            transition.from_status,
            transition.to_status,
            transition.duration_minutes,
            transition.start_time,
            transition.end_time
        );
    }
    println!(
        "Total: {} minutes, {} hours, {} days",
        summary.total_minutes, summary.total_hours, summary.total_days
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
