//! Field mapping: from a Form Input Record to PDF field values
//!
//! A [`FormTemplate`] is plain data. The built-in [`FormTemplate::quote_agreement`]
//! targets one specific quote-agreement form; any other layout can be
//! described in JSON and loaded with [`FormTemplate::from_json`].

use crate::error::{FillError, Result};
use crate::input::FormInput;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Keys the default template requires to be present and non-empty.
pub const DEFAULT_REQUIRED_KEYS: [&str; 7] = [
    "CustomerName",
    "ServiceAddress",
    "City",
    "State",
    "ZipCode",
    "PhoneNumber",
    "Email",
];

/// Download name used by the default template.
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "filled_constellation_form.pdf";

/// Export value of a checked checkbox
pub const CHECKED: &str = "Yes";
/// Export value of an unchecked checkbox
pub const UNCHECKED: &str = "Off";

/// Where a field's value comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ValueSource {
    /// Fixed administrative value
    Literal { value: String },
    /// Lookup into the input record, "" when absent
    Input { key: String },
    /// `on` when the input key is truthy, `off` otherwise
    Checkbox {
        key: String,
        #[serde(default = "default_on")]
        on: String,
        #[serde(default = "default_off")]
        off: String,
    },
}

fn default_on() -> String {
    CHECKED.to_string()
}

fn default_off() -> String {
    UNCHECKED.to_string()
}

impl ValueSource {
    pub fn resolve(&self, input: &FormInput) -> String {
        match self {
            ValueSource::Literal { value } => value.clone(),
            ValueSource::Input { key } => input.text(key),
            ValueSource::Checkbox { key, on, off } => {
                if input.flag(key) {
                    on.clone()
                } else {
                    off.clone()
                }
            }
        }
    }
}

/// One row of the mapping table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Fully qualified PDF field identifier
    pub field: String,
    #[serde(flatten)]
    pub source: ValueSource,
}

/// The mapping table plus the form-level settings that go with it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormTemplate {
    pub name: String,
    #[serde(default)]
    pub required_keys: Vec<String>,
    #[serde(default = "default_output_file_name")]
    pub output_file_name: String,
    pub rules: Vec<FieldRule>,
}

fn default_output_file_name() -> String {
    DEFAULT_OUTPUT_FILE_NAME.to_string()
}

impl FormTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_keys: Vec::new(),
            output_file_name: default_output_file_name(),
            rules: Vec::new(),
        }
    }

    pub fn require(mut self, key: impl Into<String>) -> Self {
        self.required_keys.push(key.into());
        self
    }

    pub fn output_file_name(mut self, name: impl Into<String>) -> Self {
        self.output_file_name = name.into();
        self
    }

    pub fn literal(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.rules.push(FieldRule {
            field: field.into(),
            source: ValueSource::Literal {
                value: value.into(),
            },
        });
        self
    }

    pub fn input(mut self, field: impl Into<String>, key: impl Into<String>) -> Self {
        self.rules.push(FieldRule {
            field: field.into(),
            source: ValueSource::Input { key: key.into() },
        });
        self
    }

    pub fn checkbox(mut self, field: impl Into<String>, key: impl Into<String>) -> Self {
        self.rules.push(FieldRule {
            field: field.into(),
            source: ValueSource::Checkbox {
                key: key.into(),
                on: default_on(),
                off: default_off(),
            },
        });
        self
    }

    /// Template for the energy supply quote agreement form.
    pub fn quote_agreement() -> Self {
        let mut template = Self::new("quote-agreement");
        for key in DEFAULT_REQUIRED_KEYS {
            template = template.require(key);
        }
        template
            .literal("Please Initial Here", "Initial value")
            .literal("FOR INTERNAL USE ONLY", "FOR INTERNAL USE ONLY value")
            .input("//Contract/CustomerName", "CustomerName")
            .input("//ContactDetail/FullName#1", "ContactName")
            .input(
                "//ContractAccountDetails/ContractAccountDetail[1]/Street",
                "ServiceAddress",
            )
            .input("//ContractAccountDetails/ContractAccountDetail[1]/City", "City")
            .input(
                "//ContractAccountDetails/ContractAccountDetail[1]/StateName",
                "State",
            )
            .input("//ContractAccountDetails/ContractAccountDetail[1]/ZIP", "ZipCode")
            .input("//BillingAddress/AddressLine1", "MailingAddress")
            .input("//BillingAddress/City", "City")
            .input("//BillingAddress/StateName", "State")
            .input("//BillingAddress/ZIP", "ZipCode")
            .input(
                "//ContractAccountDetails/ContractAccountDetail[1]/Utility",
                "UtilityProvider",
            )
            .input(
                "//ContractAccountDetails/ContractAccountDetail[1]/AccountNumber",
                "AccountNumber",
            )
            .input(
                "//ContractAccountDetails/ContractAccountDetail[1]/MeterNumber",
                "MeterNumber",
            )
            .input("//Contract/Phone", "PhoneNumber")
            .input("//ContactDetail/EmailWork", "Email")
            .input("//PrepareDateFormat#1", "Date")
            .checkbox("//ContractStartDate/MonthName", "AgreementCheckbox1")
            .input("//Contract/Term", "ContractTerm")
            .input("//Contract/PriceQuoted", "QuotedPrice")
            .input("By", "QuotedPrice")
            .literal("//bool1", CHECKED)
            .literal("//bool2", CHECKED)
            .input("FOR INTERNAL USE ONLY_2", "QuotedPrice")
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let template: Self = serde_json::from_str(text)
            .map_err(|e| FillError::InvalidTemplate(e.to_string()))?;
        template.validate()?;
        Ok(template)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| FillError::InvalidTemplate(e.to_string()))
    }

    /// Reject templates that cannot drive a fill.
    pub fn validate(&self) -> Result<()> {
        if self.output_file_name.trim().is_empty() {
            return Err(FillError::InvalidTemplate(
                "output_file_name must not be empty".to_string(),
            ));
        }
        if self
            .output_file_name
            .chars()
            .any(|c| c.is_control() || c == '"')
        {
            return Err(FillError::InvalidTemplate(
                "output_file_name must not contain quotes or control characters".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if rule.field.is_empty() {
                return Err(FillError::InvalidTemplate(
                    "field identifiers must not be empty".to_string(),
                ));
            }
            if !seen.insert(rule.field.as_str()) {
                return Err(FillError::InvalidTemplate(format!(
                    "field '{}' is mapped more than once",
                    rule.field
                )));
            }
        }
        Ok(())
    }

    /// Resolve every rule against `input`.
    pub fn map(&self, input: &FormInput) -> FieldValues {
        let values = self
            .rules
            .iter()
            .map(|rule| (rule.field.clone(), rule.source.resolve(input)))
            .collect();
        FieldValues { values }
    }
}

impl Default for FormTemplate {
    fn default() -> Self {
        Self::quote_agreement()
    }
}

/// Field identifier to value, ready to be written into a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValues {
    values: BTreeMap<String, String>,
}

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(|s| s.as_str())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Drop every entry whose field is not in `present`. Returns the
    /// identifiers that were dropped.
    pub fn retain_present<F>(&mut self, mut present: F) -> Vec<String>
    where
        F: FnMut(&str) -> bool,
    {
        let mut dropped = Vec::new();
        self.values.retain(|field, _| {
            let keep = present(field);
            if !keep {
                dropped.push(field.clone());
            }
            keep
        });
        dropped
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldValues {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn input(value: serde_json::Value) -> FormInput {
        FormInput::from_value(value).unwrap()
    }

    #[test]
    fn test_default_template_is_valid() {
        let template = FormTemplate::quote_agreement();
        template.validate().unwrap();
        assert_eq!(template.required_keys.len(), 7);
        assert_eq!(template.output_file_name, DEFAULT_OUTPUT_FILE_NAME);
    }

    #[test]
    fn test_map_defaults_absent_keys_to_empty() {
        let values = FormTemplate::quote_agreement().map(&input(json!({
            "CustomerName": "Acme"
        })));

        assert_eq!(values.get("//Contract/CustomerName"), Some("Acme"));
        assert_eq!(values.get("//ContactDetail/FullName#1"), Some(""));
        assert_eq!(values.get("Please Initial Here"), Some("Initial value"));
        assert_eq!(values.get("//bool1"), Some("Yes"));
    }

    #[test]
    fn test_one_key_feeds_several_fields() {
        let values = FormTemplate::quote_agreement().map(&input(json!({
            "City": "Chicago",
            "QuotedPrice": "0.55 per therm"
        })));

        assert_eq!(
            values.get("//ContractAccountDetails/ContractAccountDetail[1]/City"),
            Some("Chicago")
        );
        assert_eq!(values.get("//BillingAddress/City"), Some("Chicago"));
        assert_eq!(values.get("By"), Some("0.55 per therm"));
        assert_eq!(values.get("FOR INTERNAL USE ONLY_2"), Some("0.55 per therm"));
    }

    #[test]
    fn test_checkbox_tokens() {
        let template = FormTemplate::quote_agreement();
        let field = "//ContractStartDate/MonthName";

        let checked = template.map(&input(json!({ "AgreementCheckbox1": true })));
        assert_eq!(checked.get(field), Some(CHECKED));

        let unchecked = template.map(&input(json!({ "AgreementCheckbox1": false })));
        assert_eq!(unchecked.get(field), Some(UNCHECKED));

        let absent = template.map(&input(json!({})));
        assert_eq!(absent.get(field), Some(UNCHECKED));
    }

    #[test]
    fn test_retain_present_drops_unknown_fields() {
        let mut values: FieldValues = [("A", "1"), ("B", "2"), ("C", "3")].into_iter().collect();
        let dropped = values.retain_present(|f| f != "B");

        assert_eq!(dropped, vec!["B".to_string()]);
        assert!(values.contains("A"));
        assert!(!values.contains("B"));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_template_json_shape() {
        let template = FormTemplate::from_json(
            r#"{
                "name": "lease",
                "required_keys": ["Tenant"],
                "rules": [
                    { "field": "tenant.name", "source": "input", "key": "Tenant" },
                    { "field": "office", "source": "literal", "value": "HQ" },
                    { "field": "pets", "source": "checkbox", "key": "Pets", "on": "On" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(template.output_file_name, DEFAULT_OUTPUT_FILE_NAME);
        assert_eq!(
            template.rules[2].source,
            ValueSource::Checkbox {
                key: "Pets".to_string(),
                on: "On".to_string(),
                off: "Off".to_string(),
            }
        );

        let values = template.map(&input(json!({ "Tenant": "Ann", "Pets": 1 })));
        assert_eq!(values.get("tenant.name"), Some("Ann"));
        assert_eq!(values.get("office"), Some("HQ"));
        assert_eq!(values.get("pets"), Some("On"));
    }

    #[test]
    fn test_default_template_survives_json() {
        let template = FormTemplate::quote_agreement();
        let text = template.to_json_pretty().unwrap();
        assert_eq!(FormTemplate::from_json(&text).unwrap(), template);
    }

    #[test]
    fn test_duplicate_fields_are_rejected() {
        let template = FormTemplate::new("dup").input("a", "X").literal("a", "y");
        let err = template.validate().unwrap_err();
        assert!(err.to_string().contains("mapped more than once"));
    }

    #[test]
    fn test_unusable_output_file_names_are_rejected() {
        for file_name in ["bad\nname.pdf", "a\"b.pdf", "tab\there.pdf"] {
            let mut template = FormTemplate::new("t");
            template.output_file_name = file_name.to_string();
            let err = template.validate().unwrap_err();
            assert!(err.to_string().contains("control characters"), "{file_name:?}");
        }
    }

    #[test]
    fn test_unknown_source_is_rejected() {
        let err = FormTemplate::from_json(
            r#"{"name": "x", "rules": [{"field": "a", "source": "formula"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, FillError::InvalidTemplate(_)));
    }
}
