//! Rule families, one module per statement family.
//!
//! Every check appends to the [`StatementRecord`] through `report` (rule
//! levels) or `append_warning` / `append_error` (limits and hard errors), so
//! severity only ever rises.

pub(crate) mod alter;
pub(crate) mod column;
pub(crate) mod create;
pub(crate) mod dml;
pub(crate) mod index;
pub(crate) mod must_have;

use sqlward_core::{RuleSettings, StatementRecord};
use sqlward_sql::Predicate;

/// Lowercase letters, digits and underscores, not starting with a digit.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Whether `limit` is enabled and `value` exceeds it.
pub(crate) fn exceeds(value: usize, limit: u64) -> bool {
    limit > 0 && value as u64 > limit
}

/// `None` when the charset is allowed (or no whitelist is configured).
pub(crate) fn disallowed_charset<'c>(rules: &RuleSettings, charset: Option<&'c str>) -> Option<&'c str> {
    let charset = charset?;
    let allowed = rules.allowed_charsets();
    if allowed.is_empty() || allowed.iter().any(|a| a.eq_ignore_ascii_case(charset)) {
        None
    } else {
        Some(charset)
    }
}

pub(crate) fn check_in_lists(
    rules: &RuleSettings,
    predicate: Option<&Predicate>,
    record: &mut StatementRecord,
) {
    let max = rules.limits.max_in_count;
    let Some(predicate) = predicate else {
        return;
    };
    for len in predicate.in_list_sizes() {
        if exceeds(len, max) {
            record.append_warning(format!("IN clause has {len} items, exceeds max {max}."));
        }
    }
}
