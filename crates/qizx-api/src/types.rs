//! Value types exchanged with the Qizx server

use crate::error::{QizxError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Properties of one library member, keyed by property name.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A typed property or query item value.
///
/// Serialized as `{"type": "...", "value": ...}` using the Qizx type names,
/// which is also the layout of property sets in bulk archives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum PropertyValue {
    #[serde(rename = "string")]
    String(String),
    #[serde(rename = "boolean")]
    Boolean(bool),
    #[serde(rename = "integer")]
    Integer(i64),
    #[serde(rename = "double")]
    Double(f64),
    /// ISO 8601 timestamp, kept verbatim
    #[serde(rename = "dateTime")]
    DateTime(String),
    /// Serialized XML fragment
    #[serde(rename = "node()")]
    Node(String),
}

impl PropertyValue {
    /// Qizx type name, as used in `setprop` requests.
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "string",
            PropertyValue::Boolean(_) => "boolean",
            PropertyValue::Integer(_) => "integer",
            PropertyValue::Double(_) => "double",
            PropertyValue::DateTime(_) => "dateTime",
            PropertyValue::Node(_) => "node()",
        }
    }

    /// Decode the text content of a `<property>` or `<item>` element.
    ///
    /// A missing type attribute means `string`; unknown types are kept as strings.
    pub fn decode(type_attr: Option<&str>, text: String) -> Result<Self> {
        let invalid = |reason: String| QizxError::MalformedXml(reason);

        match type_attr.unwrap_or("string") {
            "boolean" => Ok(PropertyValue::Boolean(text.trim() == "true")),
            "integer" => text
                .trim()
                .parse()
                .map(PropertyValue::Integer)
                .map_err(|e| invalid(format!("integer value '{}': {}", text, e))),
            "double" => text
                .trim()
                .parse()
                .map(PropertyValue::Double)
                .map_err(|e| invalid(format!("double value '{}': {}", text, e))),
            "dateTime" => Ok(PropertyValue::DateTime(text.trim().to_string())),
            "element()" | "node()" => Ok(PropertyValue::Node(text.trim().to_string())),
            _ => Ok(PropertyValue::String(text)),
        }
    }

    /// Parse a `type:value` command-line argument; a bare value is a string.
    pub fn parse_typed(arg: &str) -> Result<Self> {
        match arg.split_once(':') {
            Some((ty, value))
                if matches!(
                    ty,
                    "string" | "boolean" | "integer" | "double" | "dateTime" | "node()"
                ) =>
            {
                Self::decode(Some(ty), value.to_string())
            },
            _ => Ok(PropertyValue::String(arg.to_string())),
        }
    }

    /// Value as sent in a `setprop` request.
    pub fn to_param(&self) -> String {
        self.to_string()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) | PropertyValue::DateTime(s) | PropertyValue::Node(s) => {
                Some(s)
            },
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) | PropertyValue::DateTime(s) | PropertyValue::Node(s) => {
                f.write_str(s)
            },
            PropertyValue::Boolean(b) => write!(f, "{}", b),
            PropertyValue::Integer(i) => write!(f, "{}", i),
            PropertyValue::Double(d) => write!(f, "{}", d),
        }
    }
}

/// One property change for `setprop`; a `None` value deletes the property.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyUpdate {
    pub name: String,
    pub value: Option<PropertyValue>,
}

impl PropertyUpdate {
    pub fn set(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
        }
    }

    pub fn delete(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }
}

/// Nature of a library member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemberKind {
    Collection,
    Document,
    NonXmlDocument,
}

impl MemberKind {
    /// Interpret the value of the `nature` system property.
    pub fn from_nature(nature: &str) -> Self {
        let nature = nature.to_ascii_lowercase();
        if nature.contains("collection") {
            MemberKind::Collection
        } else if nature.contains("non") {
            MemberKind::NonXmlDocument
        } else {
            MemberKind::Document
        }
    }

    pub fn is_document(self) -> bool {
        !matches!(self, MemberKind::Collection)
    }
}

/// A document or collection inside a library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub path: String,
    pub kind: MemberKind,
}

/// Output format of `eval` when the raw serialization is wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalFormat {
    #[default]
    Xml,
    Html,
    Xhtml,
}

impl EvalFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            EvalFormat::Xml => "xml",
            EvalFormat::Html => "html",
            EvalFormat::Xhtml => "xhtml",
        }
    }
}

/// Counting method for `items` evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counting {
    Exact,
    Estimated,
    None,
}

impl Counting {
    pub fn as_str(self) -> &'static str {
        match self {
            Counting::Exact => "exact",
            Counting::Estimated => "estimated",
            Counting::None => "none",
        }
    }
}

/// Options for `items` evaluation.
#[derive(Debug, Clone, Default)]
pub struct ItemsOptions {
    /// Run in profiling mode
    pub profile: bool,
    pub counting: Option<Counting>,
    /// Maximum number of items, at least 1
    pub count: Option<u32>,
    /// Rank of the first item, at least 1
    pub first: Option<u32>,
}

/// Server control commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCommand {
    Status,
    Online,
    Offline,
    Reload,
}

impl ServerCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            ServerCommand::Status => "status",
            ServerCommand::Online => "online",
            ServerCommand::Offline => "offline",
            ServerCommand::Reload => "reload",
        }
    }
}

/// Scope of `getacl` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclScope {
    /// Rules attached to the member itself
    Local,
    /// Rules inherited from enclosing collections as well
    Inherit,
}

impl AclScope {
    pub fn as_str(self) -> &'static str {
        match self {
            AclScope::Local => "local",
            AclScope::Inherit => "inherit",
        }
    }
}

/// Detail level of configuration and statistics listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InfoLevel {
    #[default]
    Admin,
    Expert,
}

impl InfoLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            InfoLevel::Admin => "admin",
            InfoLevel::Expert => "expert",
        }
    }
}

/// One row of a `getconfig`, `getstats`, `listtasks` or `listqueries` listing.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// State of a long-running server task such as a backup.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskProgress {
    pub task: String,
    /// Completed fraction, from 0 to 1
    pub done: f64,
}

impl TaskProgress {
    pub fn is_complete(&self) -> bool {
        self.done >= 1.0
    }
}
