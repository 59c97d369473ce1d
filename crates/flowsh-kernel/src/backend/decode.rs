//! JSON, YAML and TOML decoding.

use flowsh_types::{json_to_value, Value};

use super::{DecodeError, Decoder, Format};

/// Decodes through `serde_json`, `serde_yaml` and `toml`, all funnelled into
/// `serde_json::Value` and then into a runtime [`Value`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredDecoder;

impl Decoder for StructuredDecoder {
    fn decode(&self, format: Format, text: &str) -> Result<Value, DecodeError> {
        let json: serde_json::Value = match format {
            Format::Json => serde_json::from_str(text).map_err(|e| DecodeError::new(format, e))?,
            Format::Yaml => {
                if text.trim().is_empty() {
                    serde_json::Value::Null
                } else {
                    serde_yaml::from_str(text).map_err(|e| DecodeError::new(format, e))?
                }
            }
            Format::Toml => toml::from_str(text).map_err(|e| DecodeError::new(format, e))?,
        };
        Ok(json_to_value(json))
    }
}
