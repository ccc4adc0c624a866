use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_value<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let value = serde_json::to_value(value)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&value)?),
        OutputFormat::Table => println!("{}", render_table(&value)),
    }
    Ok(())
}

pub fn print_success(msg: &str) {
    eprintln!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Arrays of objects become one row per element; a single object becomes a
/// field/value table.
fn render_table(value: &Value) -> String {
    match value {
        Value::Array(rows) if rows.is_empty() => "No results.".to_string(),
        Value::Array(rows) => {
            let columns: Vec<String> = rows
                .iter()
                .filter_map(Value::as_object)
                .flat_map(|o| o.keys().cloned())
                .fold(Vec::new(), |mut acc, k| {
                    if !acc.contains(&k) {
                        acc.push(k);
                    }
                    acc
                });
            let mut builder = Builder::default();
            builder.push_record(columns.iter().cloned());
            for row in rows {
                builder.push_record(columns.iter().map(|c| cell(row.get(c))));
            }
            builder.build().with(Style::rounded()).to_string()
        }
        Value::Object(fields) => {
            let mut builder = Builder::default();
            builder.push_record(["Field", "Value"]);
            for (k, v) in fields {
                builder.push_record([k.clone(), cell(Some(v))]);
            }
            builder.build().with(Style::rounded()).to_string()
        }
        other => cell(Some(other)),
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items.iter().map(|i| cell(Some(i))).collect::<Vec<_>>().join(", "),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rows_share_the_union_of_columns() {
        let table = render_table(&json!([
            { "userId": "U1", "loginIds": ["a", "b"] },
            { "userId": "U2", "email": "u2@example.com" }
        ]));
        assert!(table.contains("userId"));
        assert!(table.contains("email"));
        assert!(table.contains("a, b"));
        assert!(table.contains("u2@example.com"));
    }

    #[test]
    fn test_object_renders_as_field_value_pairs() {
        let table = render_table(&json!({ "machineClientId": "C1", "setAPIGWScopes": true }));
        assert!(table.contains("Field"));
        assert!(table.contains("machineClientId"));
        assert!(table.contains("true"));
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(render_table(&json!([])), "No results.");
    }
}
