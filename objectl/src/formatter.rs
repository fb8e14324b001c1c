use colored::*;

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

/// The object types supported by the server: full name, singular and plural.
pub struct TypeList(pub Vec<(String, String, String)>);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.0)
    }
}

impl From<serde_json::Value> for FormattedString {
    fn from(value: serde_json::Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

impl From<anyhow::Error> for FormattedString {
    fn from(err: anyhow::Error) -> Self {
        let mut out = format!("{} {}", "Error:".red().bold(), err);
        for cause in err.chain().skip(1) {
            out.push_str(&format!("\n  {} {}", "caused by:".yellow(), cause));
        }
        FormattedString(out)
    }
}

impl From<TypeList> for FormattedString {
    fn from(TypeList(types): TypeList) -> Self {
        if types.is_empty() {
            return FormattedString("No object types found.".yellow().to_string());
        }

        let width = types.iter().map(|(name, _, _)| name.len()).max().unwrap_or_default();
        let mut out = String::new();
        out.push_str("Available Types:\n");
        for (name, singular, plural) in types {
            out.push_str(&format!(
                "  - {}  {} / {}\n",
                format!("{name:<width$}").green(),
                singular.cyan(),
                plural.cyan()
            ));
        }
        FormattedString(out.trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_list() {
        colored::control::set_override(false);
        let list = TypeList(vec![
            ("private.v1.Hub".into(), "hub".into(), "hubs".into()),
            ("fulfillment.v1.Cluster".into(), "cluster".into(), "clusters".into()),
        ]);
        assert_eq!(
            FormattedString::from(list).0,
            "Available Types:\n  - private.v1.Hub          hub / hubs\n  - fulfillment.v1.Cluster  cluster / clusters"
        );
    }

    #[test]
    fn test_error_chain() {
        colored::control::set_override(false);
        let err = anyhow::anyhow!("inner").context("outer");
        assert_eq!(
            FormattedString::from(err).0,
            "Error: outer\n  caused by: inner"
        );
    }
}
