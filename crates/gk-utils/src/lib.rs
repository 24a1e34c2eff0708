//! Shared naming and display helpers for Groupkeep.

use std::collections::HashSet;

/// Placeholder shown for an entry value that was left blank.
pub const BLANK_VALUE: &str = "-";

/// Trim a user-provided name, returning `None` when nothing is left.
pub fn normalize_name(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Return every name that appears more than once, in first-repeat order.
pub fn duplicate_names<'a, I>(names: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for name in names {
        if !seen.insert(name) && !duplicates.contains(&name) {
            duplicates.push(name);
        }
    }
    duplicates
}

/// Human-readable entry counter, e.g. "1 entry" or "3 entries".
pub fn entry_count_label(count: usize) -> String {
    if count == 1 {
        "1 entry".to_string()
    } else {
        format!("{count} entries")
    }
}

/// Up to `limit` field names followed by a "+N more" badge for the rest.
pub fn field_preview<'a, I>(names: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = names.into_iter().collect();
    let mut badges: Vec<String> = names
        .iter()
        .take(limit)
        .map(|name| (*name).to_string())
        .collect();
    if names.len() > limit {
        badges.push(format!("+{} more", names.len() - limit));
    }
    badges
}

/// Render an entry value, substituting a dash for blanks.
pub fn display_value(value: &str) -> &str {
    if value.is_empty() {
        BLANK_VALUE
    } else {
        value
    }
}

/// Input hint for an entry field, e.g. "Enter email...".
pub fn field_placeholder(field_name: &str) -> String {
    format!("Enter {}...", field_name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rejects_whitespace() {
        assert_eq!(normalize_name("   \t"), None);
        assert_eq!(normalize_name("  Contacts "), Some("Contacts".to_string()));
    }

    #[test]
    fn duplicates_reported_once() {
        let names = ["Email", "Phone", "Email", "Email", "Phone"];
        assert_eq!(duplicate_names(names), vec!["Email", "Phone"]);
        assert!(duplicate_names(["Email", "email"]).is_empty());
    }

    #[test]
    fn entry_labels_pluralize() {
        insta::assert_snapshot!(entry_count_label(0), @"0 entries");
        insta::assert_snapshot!(entry_count_label(1), @"1 entry");
        insta::assert_snapshot!(entry_count_label(12), @"12 entries");
    }

    #[test]
    fn preview_collapses_extra_fields() {
        let names = ["Email", "Phone", "Address", "Birthday", "Notes"];
        assert_eq!(
            field_preview(names, 3),
            vec!["Email", "Phone", "Address", "+2 more"]
        );
        assert_eq!(field_preview(["Email"], 3), vec!["Email"]);
    }

    #[test]
    fn blank_values_show_dash() {
        assert_eq!(display_value(""), "-");
        assert_eq!(display_value("a@b.com"), "a@b.com");
    }

    #[test]
    fn placeholder_lowercases_field() {
        insta::assert_snapshot!(field_placeholder("Email Address"), @"Enter email address...");
    }
}
