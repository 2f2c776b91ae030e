//! `qizx getprop`, `qizx setprop` and `qizx queryprop` command implementation

use crate::error::{CliError, Result};
use colored::Colorize;
use qizx_api::{Client, Properties, PropertyUpdate, PropertyValue};

const VALUE_TYPES: &[&str] = &["string", "boolean", "integer", "double", "dateTime", "node()"];

/// Show properties of a member and of its descendants up to `depth`
pub async fn getprop(
    client: &Client,
    path: &str,
    names: &[String],
    depth: u32,
    library: Option<&str>,
) -> Result<()> {
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let selection = (!names.is_empty()).then_some(names.as_slice());

    let groups = client.getprop(path, selection, depth, library).await?;
    print_groups(&groups);
    Ok(())
}

/// Show properties of the members matching an XQuery predicate
pub async fn queryprop(
    client: &Client,
    query: &str,
    names: &[String],
    path: Option<&str>,
    library: Option<&str>,
) -> Result<()> {
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let selection = (!names.is_empty()).then_some(names.as_slice());

    let groups = client.queryprop(query, selection, path, library).await?;
    print_groups(&groups);
    Ok(())
}

fn print_groups(groups: &[(String, Properties)]) {
    for (member, properties) in groups {
        println!("{}", member.green());
        for (name, value) in properties {
            println!("  {} ({}): {}", name.bold(), value.type_name().dimmed(), value);
        }
    }
}

/// Set a property, or delete it when no value is given
pub async fn setprop(
    client: &Client,
    path: &str,
    name: &str,
    value: Option<&str>,
    value_type: Option<&str>,
    library: Option<&str>,
) -> Result<()> {
    let update = match value {
        Some(value) => PropertyUpdate::set(name, parse_value(value, value_type)?),
        None => PropertyUpdate::delete(name),
    };

    let member = client.setprop(path, &[update], library).await?;
    println!("{} {}", "Updated".green(), member);
    Ok(())
}

fn parse_value(value: &str, value_type: Option<&str>) -> Result<PropertyValue> {
    match value_type {
        None => Ok(PropertyValue::String(value.to_string())),
        Some(ty) if VALUE_TYPES.contains(&ty) => {
            Ok(PropertyValue::decode(Some(ty), value.to_string())?)
        },
        Some(ty) => Err(CliError::invalid_argument(format!(
            "unknown property type '{}', expected one of {}",
            ty,
            VALUE_TYPES.join(", ")
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_defaults_to_string() {
        assert_eq!(
            parse_value("42", None).unwrap(),
            PropertyValue::String("42".to_string())
        );
    }

    #[test]
    fn test_parse_value_typed() {
        assert_eq!(parse_value("42", Some("integer")).unwrap(), PropertyValue::Integer(42));
        assert_eq!(parse_value("true", Some("boolean")).unwrap(), PropertyValue::Boolean(true));
    }

    #[test]
    fn test_parse_value_rejects_unknown_type() {
        let err = parse_value("x", Some("float")).unwrap_err();
        assert!(err.to_string().contains("unknown property type 'float'"));
    }

    #[test]
    fn test_parse_value_rejects_bad_integer() {
        assert!(parse_value("forty", Some("integer")).is_err());
    }
}
