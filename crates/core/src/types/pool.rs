//! Digital inventory pool entries.
//!
//! A pool entry is one unit of digital inventory - a gift-card code or an
//! account credential pair - with a single-use `used` flag. This module holds
//! the entry types, the bulk-paste parsers the admin surface uses to load
//! pools, and the reference implementation of the selection policy:
//! first-available in pool order, all-or-none per requested quantity.
//!
//! The storefront's SQL claim statement implements the same policy against
//! the persistent store; [`claim_first_unused`] is the in-memory equivalent
//! that pins the semantics down in tests.

use serde::{Deserialize, Serialize};

/// One unused-or-consumed gift-card code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftCode {
    /// The secret code value delivered to the buyer.
    pub code: String,
    /// Whether this entry has been consumed by a fulfillment.
    pub used: bool,
}

/// One unused-or-consumed account credential pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCredential {
    pub username: String,
    /// The account password delivered to the buyer.
    pub secret: String,
    /// Whether this entry has been consumed by a fulfillment.
    pub used: bool,
}

/// Common view over pool entry types for the selection policy.
pub trait PoolUnit {
    fn is_used(&self) -> bool;
    fn mark_used(&mut self);
}

impl PoolUnit for GiftCode {
    fn is_used(&self) -> bool {
        self.used
    }

    fn mark_used(&mut self) {
        self.used = true;
    }
}

impl PoolUnit for AccountCredential {
    fn is_used(&self) -> bool {
        self.used
    }

    fn mark_used(&mut self) {
        self.used = true;
    }
}

/// Number of entries still available for allocation.
#[must_use]
pub fn unused_count<T: PoolUnit>(entries: &[T]) -> usize {
    entries.iter().filter(|e| !e.is_used()).count()
}

/// Claim the first `quantity` unused entries in pool order, all-or-none.
///
/// Returns the claimed indices in pool order, or `None` if fewer than
/// `quantity` entries are available - in which case no entry is touched.
/// This is the shortfall side of the best-effort fulfillment policy: a line
/// that cannot be fully served is skipped entirely rather than partially
/// allocated.
#[must_use]
pub fn claim_first_unused<T: PoolUnit>(entries: &mut [T], quantity: u32) -> Option<Vec<usize>> {
    let quantity = quantity as usize;
    let picked: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.is_used())
        .map(|(i, _)| i)
        .take(quantity)
        .collect();

    if picked.len() < quantity {
        return None;
    }
    for &i in &picked {
        if let Some(entry) = entries.get_mut(i) {
            entry.mark_used();
        }
    }
    Some(picked)
}

/// Errors from parsing bulk-pasted pool input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolParseError {
    /// An account line is missing the `username:password` separator.
    #[error("line {line}: expected username:password")]
    MissingSeparator {
        /// 1-based line number in the pasted input.
        line: usize,
    },
    /// An account line has an empty username or password.
    #[error("line {line}: username and password must be non-empty")]
    EmptyField {
        /// 1-based line number in the pasted input.
        line: usize,
    },
}

/// Parse newline-delimited gift-card codes.
///
/// Blank lines are skipped, values are trimmed; every parsed entry starts
/// unused. Insertion order is preserved - it determines allocation order.
#[must_use]
pub fn parse_code_lines(input: &str) -> Vec<GiftCode> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| GiftCode {
            code: line.to_owned(),
            used: false,
        })
        .collect()
}

/// Parse newline-delimited `username:password` account lines.
///
/// Blank lines are skipped. Passwords may themselves contain `:`; only the
/// first separator splits.
///
/// # Errors
///
/// Returns [`PoolParseError`] for a line without a separator or with an
/// empty username/password, identified by its 1-based line number.
pub fn parse_account_lines(input: &str) -> Result<Vec<AccountCredential>, PoolParseError> {
    let mut entries = Vec::new();
    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let line_no = idx + 1;
        let (username, secret) = line
            .split_once(':')
            .ok_or(PoolParseError::MissingSeparator { line: line_no })?;
        let username = username.trim();
        let secret = secret.trim();
        if username.is_empty() || secret.is_empty() {
            return Err(PoolParseError::EmptyField { line: line_no });
        }
        entries.push(AccountCredential {
            username: username.to_owned(),
            secret: secret.to_owned(),
            used: false,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(specs: &[(&str, bool)]) -> Vec<GiftCode> {
        specs
            .iter()
            .map(|&(code, used)| GiftCode {
                code: code.to_owned(),
                used,
            })
            .collect()
    }

    #[test]
    fn test_claim_takes_first_unused_in_pool_order() {
        let mut pool = codes(&[("A", true), ("B", false), ("C", false), ("D", false)]);
        let claimed = claim_first_unused(&mut pool, 2).expect("enough entries");
        assert_eq!(claimed, vec![1, 2]);
        assert!(pool[1].used && pool[2].used);
        assert!(!pool[3].used);
        assert_eq!(unused_count(&pool), 1);
    }

    #[test]
    fn test_claim_shortfall_touches_nothing() {
        let mut pool = codes(&[("A", false), ("B", true)]);
        assert_eq!(claim_first_unused(&mut pool, 2), None);
        // Entries unchanged on shortfall.
        assert!(!pool[0].used);
        assert_eq!(unused_count(&pool), 1);
    }

    #[test]
    fn test_claim_exact_pool_size() {
        let mut pool = codes(&[("A", false), ("B", false)]);
        let claimed = claim_first_unused(&mut pool, 2).expect("exactly enough");
        assert_eq!(claimed, vec![0, 1]);
        assert_eq!(unused_count(&pool), 0);
        // Pool is now exhausted; any further claim is a shortfall.
        assert_eq!(claim_first_unused(&mut pool, 1), None);
    }

    #[test]
    fn test_claim_zero_quantity() {
        let mut pool = codes(&[("A", false)]);
        assert_eq!(claim_first_unused(&mut pool, 0), Some(Vec::new()));
        assert_eq!(unused_count(&pool), 1);
    }

    #[test]
    fn test_unused_count_bounds() {
        let pool = codes(&[("A", true), ("B", false), ("C", true)]);
        let available = unused_count(&pool);
        assert!(available <= pool.len());
        assert_eq!(available, 1);
    }

    #[test]
    fn test_parse_code_lines() {
        let parsed = parse_code_lines("AAAA-1111\n\n  BBBB-2222  \nCCCC-3333\n");
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].code, "AAAA-1111");
        assert_eq!(parsed[1].code, "BBBB-2222");
        assert!(parsed.iter().all(|c| !c.used));
    }

    #[test]
    fn test_parse_account_lines() {
        let parsed =
            parse_account_lines("alice:hunter2\nbob:pa:ss:word\n").expect("valid input");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].username, "alice");
        assert_eq!(parsed[0].secret, "hunter2");
        // Only the first colon splits.
        assert_eq!(parsed[1].secret, "pa:ss:word");
    }

    #[test]
    fn test_parse_account_lines_errors() {
        assert_eq!(
            parse_account_lines("alice:hunter2\nno-separator\n"),
            Err(PoolParseError::MissingSeparator { line: 2 })
        );
        assert_eq!(
            parse_account_lines(":empty-user\n"),
            Err(PoolParseError::EmptyField { line: 1 })
        );
        assert_eq!(
            parse_account_lines("alice:\n"),
            Err(PoolParseError::EmptyField { line: 1 })
        );
    }
}
