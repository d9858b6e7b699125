//! Human-facing identifiers: sequential application display codes
//! (`L-0001`) and random agent codes (`AG-7KX2PD`).

use std::sync::atomic::{AtomicU32, Ordering};

use diesel::{dsl::exists, prelude::*, select, PgConnection};
use rand::Rng;
use thiserror::Error;

use crate::schema::{credit_applications, users};

pub const MAX_CODE_ATTEMPTS: u32 = 10;
pub const DISPLAY_CODE_PREFIX: &str = "L-";
const AGENT_CODE_PREFIX: &str = "AG-";
const AGENT_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ123456789";
const AGENT_CODE_LENGTH: usize = 6;

#[derive(Debug, Error)]
pub enum CodeGenerationError {
    #[error("failed to generate a unique {kind} after {attempts} attempts")]
    Exhausted { kind: &'static str, attempts: u32 },
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

/// Draws candidates until one is free, giving up after `max_attempts`.
pub fn generate_unique<G, T>(
    kind: &'static str,
    max_attempts: u32,
    mut generate: G,
    mut is_taken: T,
) -> Result<String, CodeGenerationError>
where
    G: FnMut() -> String,
    T: FnMut(&str) -> Result<bool, diesel::result::Error>,
{
    for _ in 0..max_attempts {
        let candidate = generate();
        if !is_taken(&candidate)? {
            return Ok(candidate);
        }
    }

    Err(CodeGenerationError::Exhausted {
        kind,
        attempts: max_attempts,
    })
}

/// Runs `attempt` until it succeeds or fails with something other than a
/// collision. Collisions past `max_attempts` become [`CodeGenerationError::Exhausted`].
pub fn retry_on_collision<T, E, F, C>(
    kind: &'static str,
    max_attempts: u32,
    mut attempt: F,
    is_collision: C,
) -> Result<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
    C: Fn(&E) -> bool,
    E: From<CodeGenerationError>,
{
    for attempt_number in 1..=max_attempts {
        match attempt(attempt_number) {
            Err(err) if is_collision(&err) => {
                tracing::warn!(kind, attempt = attempt_number, "code collision, retrying");
            }
            other => return other,
        }
    }

    Err(CodeGenerationError::Exhausted {
        kind,
        attempts: max_attempts,
    }
    .into())
}

pub fn random_agent_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let suffix: String = (0..AGENT_CODE_LENGTH)
        .map(|_| AGENT_CODE_ALPHABET[rng.gen_range(0..AGENT_CODE_ALPHABET.len())] as char)
        .collect();
    format!("{AGENT_CODE_PREFIX}{suffix}")
}

pub fn generate_agent_code(conn: &mut PgConnection) -> Result<String, CodeGenerationError> {
    let mut rng = rand::thread_rng();
    generate_unique(
        "agent code",
        MAX_CODE_ATTEMPTS,
        || random_agent_code(&mut rng),
        |candidate| {
            select(exists(
                users::table.filter(users::agent_code.eq(candidate)),
            ))
            .get_result(&mut *conn)
        },
    )
}

pub fn format_display_code(number: u32) -> String {
    format!("{DISPLAY_CODE_PREFIX}{number:04}")
}

pub fn parse_display_number(code: &str) -> Option<u32> {
    let digits = code.strip_prefix(DISPLAY_CODE_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

pub fn highest_display_number<'a>(codes: impl IntoIterator<Item = &'a str>) -> u32 {
    codes
        .into_iter()
        .filter_map(parse_display_number)
        .max()
        .unwrap_or(0)
}

/// Remembers the highest display number handed out by this process so a
/// deleted tail application never gives its code to a newer one.
#[derive(Debug, Default)]
pub struct DisplayCodeIssuer {
    last_issued: AtomicU32,
}

impl DisplayCodeIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_number(&self, highest_existing: u32) -> u32 {
        highest_existing.max(self.last_issued.load(Ordering::SeqCst)) + 1
    }

    pub fn record_issued(&self, number: u32) {
        self.last_issued.fetch_max(number, Ordering::SeqCst);
    }

    /// Scans stored codes and proposes the next one.
    pub fn propose(&self, conn: &mut PgConnection) -> Result<u32, diesel::result::Error> {
        let codes: Vec<String> = credit_applications::table
            .filter(credit_applications::display_code.like(format!("{DISPLAY_CODE_PREFIX}%")))
            .select(credit_applications::display_code)
            .load(conn)?;
        let highest = highest_display_number(codes.iter().map(String::as_str));
        Ok(self.next_number(highest))
    }
}
