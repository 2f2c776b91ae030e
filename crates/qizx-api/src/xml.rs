//! Decoding of the XML bodies returned by `info`, `getprop` and `eval`

use crate::error::{malformed, Result};
use crate::types::{Properties, PropertyValue};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Everything found in a property response.
#[derive(Debug, Default)]
pub(crate) struct PropertyDocument {
    /// `<properties path=...>` groups, in document order
    pub groups: Vec<(String, Properties)>,
    /// `<property>` elements outside any group (the `info` layout)
    pub loose: Vec<(String, PropertyValue)>,
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    match element.try_get_attribute(name).map_err(malformed)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(malformed)?.into_owned())),
        None => Ok(None),
    }
}

/// Read the content of the element that was just opened and decode it.
fn element_value(
    reader: &mut Reader<&[u8]>,
    element: &BytesStart<'_>,
    empty: bool,
) -> Result<PropertyValue> {
    let ty = attribute(element, "type")?;
    let raw = if empty {
        String::new()
    } else {
        reader.read_text(element.name()).map_err(malformed)?.into_owned()
    };

    let text = match ty.as_deref() {
        Some("element()") | Some("node()") => raw,
        _ => unescape(&raw).map_err(malformed)?.into_owned(),
    };
    PropertyValue::decode(ty.as_deref(), text)
}

pub(crate) fn decode_properties(body: &[u8]) -> Result<PropertyDocument> {
    let text = std::str::from_utf8(body).map_err(malformed)?;
    let mut reader = Reader::from_str(text);
    let mut document = PropertyDocument::default();
    let mut current: Option<(String, Properties)> = None;

    loop {
        let (element, empty) = match reader.read_event().map_err(malformed)? {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::End(e) if e.name().as_ref() == b"properties" => {
                if let Some(group) = current.take() {
                    document.groups.push(group);
                }
                continue;
            },
            Event::Eof => break,
            _ => continue,
        };

        match element.name().as_ref() {
            b"properties" => {
                let group = (attribute(&element, "path")?.unwrap_or_default(), Properties::new());
                if empty {
                    document.groups.push(group);
                } else {
                    current = Some(group);
                }
            },
            b"property" => {
                let name = attribute(&element, "name")?.unwrap_or_default();
                let value = element_value(&mut reader, &element, empty)?;
                match current.as_mut() {
                    Some((_, properties)) => {
                        properties.insert(name, value);
                    },
                    None => document.loose.push((name, value)),
                }
            },
            _ => {},
        }
    }

    Ok(document)
}

pub(crate) fn decode_items(body: &[u8]) -> Result<Vec<PropertyValue>> {
    let text = std::str::from_utf8(body).map_err(malformed)?;
    let mut reader = Reader::from_str(text);
    let mut items = Vec::new();

    loop {
        let (element, empty) = match reader.read_event().map_err(malformed)? {
            Event::Start(e) => (e, false),
            Event::Empty(e) => (e, true),
            Event::Eof => break,
            _ => continue,
        };

        if element.name().as_ref() == b"item" {
            items.push(element_value(&mut reader, &element, empty)?);
        }
    }

    Ok(items)
}
