use chrono::Local;
use serde::{de::Error as _, Deserialize, Serialize};
use serde_json::{Map, Value};
use url::form_urlencoded;

/// Layout of `Record::date`, server-local time with microseconds.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// A single form submission as it travels over the relay link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub username: String,
    pub message: String,
}

impl Submission {
    pub fn new(username: &str, message: &str) -> Self {
        Submission {
            username: username.trim().to_owned(),
            message: message.trim().to_owned(),
        }
    }

    /// Builds a submission from an `application/x-www-form-urlencoded` body.
    ///
    /// Blank values are skipped, so the first non-blank occurrence of a key wins.
    pub fn from_form(body: &[u8]) -> Self {
        let mut username = None;
        let mut message = None;
        for (key, value) in form_urlencoded::parse(body) {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "username" if username.is_none() => username = Some(value),
                "message" if message.is_none() => message = Some(value),
                _ => {}
            }
        }
        Submission::new(
            username.as_deref().unwrap_or_default(),
            message.as_deref().unwrap_or_default(),
        )
    }

    /// Compact JSON payload written on the relay link.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes a relay payload. Invalid UTF-8 is replaced rather than rejected and an
    /// empty payload decodes to an empty submission.
    ///
    /// Fields are read one at a time: a key that is missing, null or not a string
    /// becomes an empty string without affecting the other. Only a payload that is
    /// not a JSON object is an error.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        let raw = String::from_utf8_lossy(payload);
        if raw.is_empty() {
            return Ok(Submission::default());
        }
        let value: Value = serde_json::from_str(&raw)?;
        let fields = value
            .as_object()
            .ok_or_else(|| serde_json::Error::custom("payload is not a JSON object"))?;
        Ok(Submission::new(
            text_field(fields, "username"),
            text_field(fields, "message"),
        ))
    }
}

fn text_field<'a>(fields: &'a Map<String, Value>, key: &str) -> &'a str {
    fields.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// The persisted form of a submission. Never updated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub date: String,
    pub username: String,
    pub message: String,
}

impl Record {
    /// Stamps a submission with the current local time.
    pub fn stamp(submission: Submission) -> Self {
        Record {
            date: Local::now().format(DATE_FORMAT).to_string(),
            username: submission.username,
            message: submission.message,
        }
    }
}
