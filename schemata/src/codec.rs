use std::fmt;

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::{Error, Result};

/// Turns specification text into a [`Codec`].
///
/// Compilation is the validity gate of the catalog: an entry update whose
/// specification does not compile is dropped and never materialized.
pub trait Compiler: Send + Sync + 'static {
    type Codec: Codec;

    /// # Errors
    ///
    /// Returns [`Error::InvalidSpecification`] when `specification` is not a
    /// valid specification.
    fn compile(&self, specification: &str) -> Result<Self::Codec>;
}

/// A compiled specification that converts between native values and bytes.
pub trait Codec: Send + Sync + 'static {
    type Native: Send + 'static;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Native>;

    fn encode(&self, value: &Self::Native) -> Result<Vec<u8>>;

    /// The exact text this codec was compiled from.
    fn specification(&self) -> &str;
}

/// Compiles JSON Schema documents into [`JsonSchemaCodec`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaCompiler;

impl Compiler for JsonSchemaCompiler {
    type Codec = JsonSchemaCodec;

    fn compile(&self, specification: &str) -> Result<JsonSchemaCodec> {
        JsonSchemaCodec::compile(specification)
    }
}

/// Codec for JSON documents constrained by a JSON Schema.
///
/// Native values are [`serde_json::Value`]s. Encoding validates and then
/// serializes to JSON bytes; decoding parses and then validates, so values
/// that do not match the schema never cross the codec in either direction.
pub struct JsonSchemaCodec {
    specification: String,
    schema: JSONSchema,
}

impl JsonSchemaCodec {
    pub fn compile(specification: &str) -> Result<Self> {
        let document: Value =
            serde_json::from_str(specification).map_err(Error::invalid_specification)?;
        let schema = JSONSchema::compile(&document).map_err(Error::invalid_specification)?;
        Ok(Self {
            specification: specification.to_owned(),
            schema,
        })
    }

    fn validate(&self, value: &Value) -> Result<()> {
        if let Err(errors) = self.schema.validate(value) {
            let reasons = errors.map(|e| e.to_string()).collect::<Vec<_>>();
            return Err(Error::codec(reasons.join("; ")));
        }
        Ok(())
    }
}

impl Codec for JsonSchemaCodec {
    type Native = Value;

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        let value: Value = serde_json::from_slice(bytes).map_err(Error::codec)?;
        self.validate(&value)?;
        Ok(value)
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        self.validate(value)?;
        serde_json::to_vec(value).map_err(Error::codec)
    }

    fn specification(&self) -> &str {
        &self.specification
    }
}

impl fmt::Debug for JsonSchemaCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchemaCodec")
            .field("specification", &self.specification)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const PERSON: &str = r#"{
        "type": "object",
        "properties": {
            "name": { "type": "string" },
            "age": { "type": "integer", "minimum": 0 }
        },
        "required": ["name"]
    }"#;

    #[test]
    fn test_specification_round_trips_verbatim() {
        let codec = JsonSchemaCompiler.compile(PERSON).unwrap();
        assert_eq!(codec.specification(), PERSON);
    }

    #[test]
    fn test_rejects_text_that_is_not_a_schema() {
        assert!(matches!(
            JsonSchemaCompiler.compile("not a valid spec"),
            Err(Error::InvalidSpecification(_))
        ));
    }

    #[test]
    fn test_encode_then_decode() {
        let codec = JsonSchemaCompiler.compile(PERSON).unwrap();
        for value in [
            json!({"name": "Ada"}),
            json!({"name": "Grace", "age": 85}),
            json!({"name": "", "age": 0, "extra": [1, 2, 3]}),
        ] {
            let bytes = codec.encode(&value).unwrap();
            assert_eq!(codec.decode(&bytes).unwrap(), value);
        }
    }

    #[test]
    fn test_encode_rejects_values_outside_schema() {
        let codec = JsonSchemaCompiler.compile(PERSON).unwrap();
        assert!(matches!(
            codec.encode(&json!({"age": 3})),
            Err(Error::Codec(_))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage_and_mismatches() {
        let codec = JsonSchemaCompiler.compile(PERSON).unwrap();
        assert!(matches!(codec.decode(b"\x00\x01"), Err(Error::Codec(_))));
        assert!(matches!(
            codec.decode(br#"{"name": 7}"#),
            Err(Error::Codec(_))
        ));
    }
}
