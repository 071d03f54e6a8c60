use crate::feature::Feature;
use crate::sanitize::sanitize_html;
use serde_json::{Map, Value};
use std::fmt::Write;

pub const NO_DESCRIPTION: &str = "No description available";

/// Details card shown when a rendered feature-service graphic is clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupTemplate {
    pub title: String,
    pub description: Option<String>,
}

impl PopupTemplate {
    pub fn for_feature(feature: &Feature) -> Self {
        Self {
            title: feature.title.clone(),
            description: feature.description().map(str::to_string),
        }
    }

    /// Merges the layer description with one graphic's attributes. Attributes with
    /// an empty name, a null value or a blank value are left out; every name and
    /// value is escaped, the description is sanitized.
    pub fn render(&self, attributes: &Map<String, Value>) -> String {
        let description = match &self.description {
            Some(d) => sanitize_html(d),
            None => NO_DESCRIPTION.to_string(),
        };

        let mut html = String::new();
        html.push_str("<div class=\"popup-card\"><table><tbody>");
        let _ = write!(
            html,
            "<tr><td class=\"popup-description\" colspan=\"2\">{}</td></tr>",
            description
        );
        html.push_str("<tr><td class=\"popup-heading\" colspan=\"2\">Feature Details:</td></tr>");

        for (name, value) in detail_rows(attributes) {
            let _ = write!(
                html,
                "<tr><td class=\"popup-field\">{}</td><td class=\"popup-value\">{}</td></tr>",
                html_escape::encode_text(name),
                html_escape::encode_text(&value)
            );
        }

        html.push_str("</tbody></table></div>");
        html
    }
}

/// Attribute rows worth showing, in attribute order.
pub fn detail_rows(attributes: &Map<String, Value>) -> Vec<(&str, String)> {
    attributes
        .iter()
        .filter(|(name, _)| !name.trim().is_empty())
        .filter_map(|(name, value)| {
            let text = display_value(value)?;
            if text.trim().is_empty() {
                None
            } else {
                Some((name.as_str(), text))
            }
        })
        .collect()
}

fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
