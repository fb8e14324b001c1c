//! Filters sent with the `List` requests of the `get` and `delete` commands.
use objectl_core::expr::quote;

const NOT_DELETED_FILTER: &str = "!has(this.metadata.deletion_timestamp)";

/// Matches objects whose identifier or name is one of the keys.
pub fn keys_filter(keys: &[String]) -> Option<String> {
    if keys.is_empty() {
        return None;
    }
    let list = keys
        .iter()
        .map(|key| quote(key))
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!(
        "this.id in [{list}] || this.metadata.name in [{list}]"
    ))
}

/// Matches the object whose identifier or name is the key.
pub fn key_filter(key: &str) -> String {
    let key = quote(key);
    format!("this.id == {key} || this.metadata.name == {key}")
}

/// Combines the keys, the filter given by the user and, unless deleted objects are wanted, the
/// condition that excludes them.
pub fn list_filter(keys: &[String], filter: Option<&str>, include_deleted: bool) -> Option<String> {
    let filter = filter.filter(|f| !f.trim().is_empty());
    let combined = match (keys_filter(keys), filter) {
        (Some(keys), Some(filter)) => Some(format!("({keys}) && ({filter})")),
        (Some(keys), None) => Some(keys),
        (None, Some(filter)) => Some(filter.to_string()),
        (None, None) => None,
    };
    if include_deleted {
        return combined;
    }
    Some(match combined {
        Some(combined) => format!("{NOT_DELETED_FILTER} && ({combined})"),
        None => NOT_DELETED_FILTER.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_key_filter() {
        assert_eq!(
            key_filter("my \"x\""),
            r#"this.id == "my \"x\"" || this.metadata.name == "my \"x\"""#
        );
    }

    #[test]
    fn test_no_arguments() {
        assert_eq!(
            list_filter(&[], None, false).as_deref(),
            Some("!has(this.metadata.deletion_timestamp)")
        );
        assert_eq!(list_filter(&[], None, true), None);
        assert_eq!(list_filter(&[], Some("  "), true), None);
    }

    #[test]
    fn test_keys_and_filter() {
        assert_eq!(
            list_filter(&keys(&["a", "my \"x\""]), Some("this.status.state == 2"), false).as_deref(),
            Some(
                r#"!has(this.metadata.deletion_timestamp) && ((this.id in ["a", "my \"x\""] || this.metadata.name in ["a", "my \"x\""]) && (this.status.state == 2))"#
            )
        );
        assert_eq!(
            list_filter(&[], Some("this.id == 'a'"), true).as_deref(),
            Some("this.id == 'a'")
        );
    }
}
