//! Decoding configuration files into [`Value`] trees.
//!
//! The bundled [`JsonLoader`] reads a JSON encoding of the value model:
//!
//! | JSON                    | value                         |
//! |-------------------------|-------------------------------|
//! | `":name"`               | symbol `name`                 |
//! | `"\\:text"`             | string `":text"`              |
//! | any other string        | string                        |
//! | array                   | list                          |
//! | object                  | map (keys decoded as strings) |
//! | `{"#dot/tag": value}`   | `value` rewritten by the tag  |
//! | integer / bool / `null` | integer / bool / nil          |
use std::fmt;
use std::path::Path;

use crate::error::LoadError;
use crate::platform::Platform;
use crate::tags;
use crate::value::Value;

/// Reads one configuration file into its top-level list of directives.
pub trait ConfigLoader: Send + Sync + fmt::Debug {
    /// File extension (without the dot) used when resolving import targets.
    fn extension(&self) -> &str;

    /// Load and decode the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if the file cannot be read, is malformed, or
    /// a tag inside it fails.
    fn load(&self, path: &Path) -> Result<Vec<Value>, LoadError>;
}

/// [`ConfigLoader`] for the JSON encoding of the value model.
#[derive(Debug, Clone, Copy)]
pub struct JsonLoader {
    platform: Platform,
}

impl Default for JsonLoader {
    fn default() -> Self {
        Self::new(Platform::detect())
    }
}

impl JsonLoader {
    /// Loader whose platform tags test against `platform`.
    #[must_use]
    pub const fn new(platform: Platform) -> Self {
        Self { platform }
    }

    /// Decode `text`; `origin` names the source in errors.
    ///
    /// # Errors
    ///
    /// See [`ConfigLoader::load`].
    pub fn decode(&self, text: &str, origin: &str) -> Result<Vec<Value>, LoadError> {
        let json: serde_json::Value =
            serde_json::from_str(text).map_err(|source| LoadError::Parse {
                path: origin.to_string(),
                source,
            })?;
        let serde_json::Value::Array(items) = json else {
            return Err(LoadError::NotAList {
                path: origin.to_string(),
            });
        };
        items
            .into_iter()
            .map(|item| self.convert(item, origin))
            .collect()
    }

    fn convert(&self, json: serde_json::Value, origin: &str) -> Result<Value, LoadError> {
        use serde_json::Value as Json;

        match json {
            Json::Null => Ok(Value::Nil),
            Json::Bool(b) => Ok(Value::Bool(b)),
            Json::Number(n) => n.as_i64().map(Value::Integer).ok_or_else(|| {
                LoadError::Unsupported {
                    path: origin.to_string(),
                    value: n.to_string(),
                }
            }),
            Json::String(s) => Ok(decode_string(s)),
            Json::Array(items) => items
                .into_iter()
                .map(|item| self.convert(item, origin))
                .collect::<Result<_, _>>()
                .map(Value::Seq),
            Json::Object(object) => {
                if object.len() == 1
                    && let Some((key, inner)) = object.iter().next()
                    && let Some(tag) = key.strip_prefix('#')
                {
                    let tag = tag.to_string();
                    let value = self.convert(inner.clone(), origin)?;
                    return tags::apply(&tag, value, &self.platform).map_err(|source| {
                        LoadError::Tag {
                            path: origin.to_string(),
                            source,
                        }
                    });
                }
                object
                    .into_iter()
                    .map(|(key, value)| Ok((decode_string(key), self.convert(value, origin)?)))
                    .collect::<Result<_, _>>()
                    .map(Value::Map)
            }
        }
    }
}

impl ConfigLoader for JsonLoader {
    fn extension(&self) -> &str {
        "json"
    }

    fn load(&self, path: &Path) -> Result<Vec<Value>, LoadError> {
        let origin = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: origin.clone(),
            source,
        })?;
        self.decode(&text, &origin)
    }
}

fn decode_string(text: String) -> Value {
    if let Some(rest) = text.strip_prefix("\\:") {
        return Value::String(format!(":{rest}"));
    }
    match text.strip_prefix(':') {
        Some(name) if !name.is_empty() => Value::symbol(name),
        _ => Value::String(text),
    }
}
