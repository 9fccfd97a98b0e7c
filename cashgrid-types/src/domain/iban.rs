//! Turkish IBAN value type.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

const TR_IBAN_LENGTH: usize = 26;

/// A validated, normalized Turkish IBAN.
///
/// Normalization strips whitespace and uppercases before validation, so
/// `"tr33 0006 ..."` and `"TR330006..."` compare equal. Validation enforces
/// the TR length/shape and the ISO 7064 mod-97 checksum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Iban(String);

impl Iban {
    /// Parses and validates an IBAN from user input.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let iban: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if iban.len() != TR_IBAN_LENGTH {
            return Err(DomainError::InvalidIban(format!(
                "IBAN must be {TR_IBAN_LENGTH} characters, got {}",
                iban.len()
            )));
        }
        if !iban.starts_with("TR") {
            return Err(DomainError::InvalidIban(
                "IBAN must start with TR".into(),
            ));
        }
        if !iban[2..].bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::InvalidIban(
                "IBAN must be digits after the country code".into(),
            ));
        }
        if mod_97(&iban) != 1 {
            return Err(DomainError::InvalidIban("IBAN checksum failed".into()));
        }

        Ok(Self(iban))
    }

    /// Returns the normalized IBAN string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// ISO 7064 mod-97: first four chars moved to the end, letters expanded to
/// two-digit values, remainder computed incrementally to avoid bignums.
fn mod_97(iban: &str) -> u32 {
    let rearranged = iban[4..].bytes().chain(iban[..4].bytes());

    let mut rem: u32 = 0;
    for b in rearranged {
        if b.is_ascii_digit() {
            rem = (rem * 10 + (b - b'0') as u32) % 97;
        } else {
            let v = (b - b'A') as u32 + 10;
            rem = (rem * 100 + v) % 97;
        }
    }
    rem
}

impl fmt::Display for Iban {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Iban {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Iban::parse(&value)
    }
}

impl From<Iban> for String {
    fn from(iban: Iban) -> Self {
        iban.0
    }
}

impl std::str::FromStr for Iban {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Iban::parse(s)
    }
}
