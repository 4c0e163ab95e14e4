use serde::Deserialize;
use serde_json::Value;

/// A text field as the client sent it. Wrong JSON types land in `Other` so
/// validation can report them against the field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TextInput {
    Text(String),
    /// `null` or an absent field.
    #[default]
    Missing,
    Other(Value),
}

impl From<&str> for TextInput {
    fn from(v: &str) -> Self {
        TextInput::Text(v.to_string())
    }
}

impl From<String> for TextInput {
    fn from(v: String) -> Self {
        TextInput::Text(v)
    }
}

/// Age as the form sends it: a number, or the raw text of the input box.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AgeInput {
    Number(f64),
    Text(String),
    /// `null` or an absent field.
    #[default]
    Missing,
    Other(Value),
}

impl From<i32> for AgeInput {
    fn from(v: i32) -> Self {
        AgeInput::Number(v as f64)
    }
}

/// Request body for create and update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPayload {
    #[serde(default)]
    pub name: TextInput,
    #[serde(default)]
    pub email: TextInput,
    #[serde(default)]
    pub age: AgeInput,
    #[serde(default)]
    pub password: TextInput,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}
