//! Buffered document uploads and property updates
//!
//! A [`DocumentBatch`] collects documents and stores them with a single `put`.
//! A [`PropertyBatch`] collects property values and applies them in one XQuery
//! transaction that is rolled back as a whole when any update fails.

use crate::client::Client;
use crate::error::{QizxError, Result};
use crate::types::{ItemsOptions, PropertyValue};
use tracing::debug;

/// Documents waiting to be stored.
#[derive(Debug)]
pub struct DocumentBatch<'a> {
    client: &'a Client,
    documents: Vec<(String, Vec<u8>)>,
}

impl<'a> DocumentBatch<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self {
            client,
            documents: Vec::new(),
        }
    }

    pub fn add(&mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.documents.push((path.into(), content.into()));
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Store every batched document in one request.
    ///
    /// The batch is empty afterwards, even when the upload fails.
    pub async fn flush(&mut self, xml: bool, library: Option<&str>) -> Result<()> {
        if self.documents.is_empty() {
            return Ok(());
        }
        let documents = std::mem::take(&mut self.documents);
        debug!(documents = documents.len(), "Flushing document batch");
        self.client.put(documents, xml, library).await
    }
}

/// Property values waiting to be set.
#[derive(Debug)]
pub struct PropertyBatch<'a> {
    client: &'a Client,
    updates: Vec<(String, String, PropertyValue)>,
}

impl<'a> PropertyBatch<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self {
            client,
            updates: Vec::new(),
        }
    }

    pub fn add(&mut self, path: impl Into<String>, name: impl Into<String>, value: PropertyValue) {
        self.updates.push((path.into(), name.into(), value));
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// The XQuery transaction applying every batched update.
    ///
    /// Errors are caught server-side and returned as an `<error>` item, so a
    /// failed transaction still comes back as a successful response.
    pub fn transaction(&self) -> String {
        let mut query = String::from("try {");
        for (path, name, value) in &self.updates {
            query.push_str(&format!(
                "xlib:set-property({}, {}, {});",
                string_literal(path),
                string_literal(name),
                value_literal(value)
            ));
        }
        query.push_str("xlib:commit();");
        query.push_str("}catch($err){xlib:rollback(),");
        query.push_str("element error{attribute type{name($err)},string($err)}}");
        query
    }

    /// Apply every batched update in one transaction.
    ///
    /// The batch is empty afterwards; a rolled back transaction fails with
    /// [`QizxError::Transaction`].
    pub async fn flush(&mut self, library: Option<&str>) -> Result<()> {
        if self.updates.is_empty() {
            return Ok(());
        }
        let query = self.transaction();
        debug!(updates = self.updates.len(), "Flushing property batch");
        self.updates.clear();

        let errors = self
            .client
            .eval_items(&query, &ItemsOptions::default(), None, library)
            .await?;
        if errors.is_empty() {
            Ok(())
        } else {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            Err(QizxError::Transaction(messages.join("; ")))
        }
    }
}

fn string_literal(text: &str) -> String {
    format!("\"{}\"", text.replace('&', "&amp;").replace('"', "\"\""))
}

fn value_literal(value: &PropertyValue) -> String {
    match value {
        PropertyValue::String(text) => string_literal(text),
        PropertyValue::Boolean(true) => "true()".to_string(),
        PropertyValue::Boolean(false) => "false()".to_string(),
        PropertyValue::Integer(number) => number.to_string(),
        PropertyValue::Double(number) if number.is_finite() => format!("xs:double(\"{}\")", number),
        PropertyValue::Double(number) if number.is_nan() => "xs:double(\"NaN\")".to_string(),
        PropertyValue::Double(number) if *number > 0.0 => "xs:double(\"INF\")".to_string(),
        PropertyValue::Double(_) => "xs:double(\"-INF\")".to_string(),
        PropertyValue::DateTime(stamp) => format!("xs:dateTime({})", string_literal(stamp)),
        PropertyValue::Node(markup) => markup.clone(),
    }
}
