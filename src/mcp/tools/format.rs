//! Small text helpers shared by the tool renderers.

use chrono::{DateTime, Utc};

use crate::mcp::tableau::model::display_timestamp;

/// `1234567` → `"1,234,567"`.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Splits a CamelCase site role into words: `ExplorerCanPublish` → `Explorer Can Publish`.
pub fn humanize_role(role: &str) -> String {
    if role.is_empty() {
        return "Unknown".to_string();
    }
    let mut out = String::with_capacity(role.len() + 4);
    let mut prev_lower = false;
    for ch in role.chars() {
        if ch.is_uppercase() && prev_lower {
            out.push(' ');
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        out.push(ch);
    }
    out
}

pub fn last_login(ts: Option<&DateTime<Utc>>) -> String {
    ts.map_or_else(|| "Never".to_string(), |t| display_timestamp(Some(t)))
}

/// Groups `items` by `key`, keeping groups in first-seen order.
pub fn group_in_order<'a, T, K: PartialEq>(items: &'a [T], key: impl Fn(&'a T) -> K) -> Vec<(K, Vec<&'a T>)> {
    let mut groups: Vec<(K, Vec<&T>)> = Vec::new();
    for item in items {
        let k = key(item);
        match groups.iter_mut().find(|(existing, _)| *existing == k) {
            Some((_, members)) => members.push(item),
            None => groups.push((k, vec![item])),
        }
    }
    groups
}
