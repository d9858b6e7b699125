//! Closed value sets used across the store, the ledger and the HTTP layer.
//!
//! Each enum is persisted as its canonical upper-case name in a varchar
//! column. Database values are matched exactly; user input goes through
//! [`FromStr`](std::str::FromStr), which normalizes case and separators once.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{value}', expected one of: {allowed}")]
pub struct InvalidEnumValue {
    pub kind: &'static str,
    pub value: String,
    pub allowed: String,
}

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsExpression,
            FromSqlRow,
        )]
        #[diesel(sql_type = Text)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            fn from_canonical(value: &str) -> Option<Self> {
                match value {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = InvalidEnumValue;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                $name::from_canonical(&normalize_enum_input(value)).ok_or_else(|| {
                    InvalidEnumValue {
                        kind: $kind,
                        value: value.to_string(),
                        allowed: $name::ALL
                            .iter()
                            .map(|item| item.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    }
                })
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let raw = std::str::from_utf8(bytes.as_bytes())?;
                $name::from_canonical(raw)
                    .ok_or_else(|| format!("unrecognized {} '{}' in database", $kind, raw).into())
            }
        }
    };
}

text_enum! {
    /// Position of a credit application in the review workflow.
    ApplicationStatus, "status" {
        Submitted => "SUBMITTED",
        InReview => "IN_REVIEW",
        Approved => "APPROVED",
        Rejected => "REJECTED",
    }
}

text_enum! {
    LoanType, "loan type" {
        ProductiveCredit => "PRODUCTIVE_CREDIT",
        Multipurpose => "MULTIPURPOSE",
        Mortgage => "MORTGAGE",
        Pension => "PENSION",
    }
}

text_enum! {
    CollateralType, "collateral type" {
        Certificate => "CERTIFICATE",
        VehicleTitle => "VEHICLE_TITLE",
        EmploymentLetter => "EMPLOYMENT_LETTER",
    }
}

text_enum! {
    /// Principal role. `Admin` is the elevated role.
    Role, "role" {
        Admin => "ADMIN",
        Agent => "AGENT",
        Customer => "CUSTOMER",
    }
}

impl Role {
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

fn normalize_enum_input(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|ch| match ch {
            ' ' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}
