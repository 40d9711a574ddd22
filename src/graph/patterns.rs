//! Configuration Schema Parsing
//!
//! Reads a JSON Schema style document into a [`ConfigSchema`] tree. Only the
//! shapes the configuration family needs are recognised; anything else is a
//! resolution error rather than being silently widened.
//!
//! Local `$ref`s (`#/definitions/X`, `#/$defs/X`) are inlined. A `$ref` chain
//! that reaches itself is reported as a cycle.

use serde_json::{Map, Value};

use super::config_schema::{ConfigSchema, ObjectSchema, PrimitiveKind, VariantSchema};
use super::resolver::suggest_name;
use crate::error::ResolutionError;

/// Keywords that may not sit beside `oneOf`
const ONE_OF_EXCLUSIVE: [&str; 4] = ["properties", "required", "additionalProperties", "enum"];

/// Parse a configuration document
pub fn parse_config_schema(unit: &str, document: &Value) -> Result<ConfigSchema, ResolutionError> {
    let mut parser = ConfigParser {
        unit,
        root: document,
        ref_stack: Vec::new(),
    };
    parser.parse(document, "#")
}

struct ConfigParser<'a> {
    unit: &'a str,
    root: &'a Value,
    /// `$ref` targets currently being expanded
    ref_stack: Vec<String>,
}

impl<'a> ConfigParser<'a> {
    fn invalid(&self, path: &str, reason: impl Into<String>) -> ResolutionError {
        ResolutionError::InvalidConfigSchema {
            unit: self.unit.to_string(),
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    fn parse(&mut self, node: &'a Value, path: &str) -> Result<ConfigSchema, ResolutionError> {
        let Some(obj) = node.as_object() else {
            return Err(self.invalid(path, "schema node must be an object"));
        };

        if let Some(target) = obj.get("$ref") {
            let target = target
                .as_str()
                .ok_or_else(|| self.invalid(path, "$ref must be a string"))?;
            return self.parse_ref(target, path);
        }

        if let Some(options) = obj.get("oneOf") {
            return self.parse_one_of(obj, options, path);
        }

        if let Some(values) = obj.get("enum") {
            return self.parse_enum(values, path);
        }

        match obj.get("type") {
            Some(Value::String(ty)) if ty == "object" => {
                Ok(ConfigSchema::Object(self.parse_object(obj, path)?))
            }
            Some(Value::String(ty)) => match primitive_from_json_type(ty) {
                Some(primitive) => Ok(ConfigSchema::Primitive { primitive }),
                None => Err(self.invalid(path, format!("unsupported type `{}`", ty))),
            },
            Some(_) => Err(self.invalid(path, "`type` must be a single string")),
            None if obj.contains_key("properties") => {
                Ok(ConfigSchema::Object(self.parse_object(obj, path)?))
            }
            None => Err(self.invalid(path, "cannot determine schema type")),
        }
    }

    fn parse_ref(&mut self, target: &str, path: &str) -> Result<ConfigSchema, ResolutionError> {
        let name = target
            .strip_prefix("#/definitions/")
            .map(|n| ("definitions", n))
            .or_else(|| target.strip_prefix("#/$defs/").map(|n| ("$defs", n)));

        let Some((section, name)) = name else {
            return Err(ResolutionError::UnresolvedReference {
                referrer: format!("{}:{}", self.unit, path),
                name: target.to_string(),
                suggestion: None,
            });
        };

        if let Some(pos) = self.ref_stack.iter().position(|r| r == target) {
            let mut chain: Vec<String> = self.ref_stack[pos..].to_vec();
            chain.push(target.to_string());
            return Err(ResolutionError::SchemaCycle { chain });
        }

        let root = self.root;
        let Some(resolved) = root.get(section).and_then(|defs| defs.get(name)) else {
            let suggestion = root
                .get(section)
                .and_then(Value::as_object)
                .and_then(|defs| suggest_name(defs.keys().map(String::as_str), name))
                .map(|s| format!("#/{}/{}", section, s));
            return Err(ResolutionError::UnresolvedReference {
                referrer: format!("{}:{}", self.unit, path),
                name: target.to_string(),
                suggestion,
            });
        };

        self.ref_stack.push(target.to_string());
        let parsed = self.parse(resolved, target);
        self.ref_stack.pop();
        parsed
    }

    fn parse_one_of(
        &mut self,
        obj: &'a Map<String, Value>,
        options: &'a Value,
        path: &str,
    ) -> Result<ConfigSchema, ResolutionError> {
        let Some(options) = options.as_array() else {
            return Err(self.invalid(path, "`oneOf` must be an array"));
        };
        if options.is_empty() {
            return Err(self.invalid(path, "`oneOf` must list at least one option"));
        }

        // Object rules beside `oneOf` would be ignored by the variant check
        if let Some(key) = ONE_OF_EXCLUSIVE.iter().find(|k| obj.contains_key(**k)) {
            return Err(self.invalid(
                path,
                format!("`{}` cannot appear beside `oneOf`; declare it on each option", key),
            ));
        }
        match obj.get("type") {
            None => {}
            Some(Value::String(ty)) if ty == "object" => {}
            Some(other) => {
                return Err(self.invalid(
                    path,
                    format!("`oneOf` options are objects, but the node declares type {}", other),
                ))
            }
        }

        let mut parsed = Vec::with_capacity(options.len());
        for (i, option) in options.iter().enumerate() {
            let option_path = format!("{}/oneOf/{}", path, i);
            match self.parse(option, &option_path)? {
                ConfigSchema::Object(object) => parsed.push(object),
                other => {
                    return Err(self.invalid(
                        &option_path,
                        format!("oneOf options must be objects, found {}", other.describe()),
                    ))
                }
            }
        }

        Ok(ConfigSchema::Variant(VariantSchema {
            title: obj.get("title").and_then(Value::as_str).map(String::from),
            options: parsed,
        }))
    }

    fn parse_enum(&self, values: &Value, path: &str) -> Result<ConfigSchema, ResolutionError> {
        let Some(values) = values.as_array() else {
            return Err(self.invalid(path, "`enum` must be an array"));
        };
        let mut allowed = Vec::with_capacity(values.len());
        for v in values {
            match v.as_str() {
                Some(s) => allowed.push(s.to_string()),
                None => {
                    return Err(self.invalid(path, format!("enum member {} is not a string", v)))
                }
            }
        }
        if allowed.is_empty() {
            return Err(self.invalid(path, "`enum` must not be empty"));
        }
        Ok(ConfigSchema::string_enum(allowed))
    }

    fn parse_object(
        &mut self,
        obj: &'a Map<String, Value>,
        path: &str,
    ) -> Result<ObjectSchema, ResolutionError> {
        let mut object = ObjectSchema {
            title: obj.get("title").and_then(Value::as_str).map(String::from),
            ..ObjectSchema::default()
        };

        if let Some(props) = obj.get("properties") {
            let Some(props) = props.as_object() else {
                return Err(self.invalid(path, "`properties` must be an object"));
            };
            for (name, prop) in props {
                let prop_path = format!("{}/properties/{}", path, name);
                let schema = self.parse(prop, &prop_path)?;
                object.properties.insert(name.clone(), schema);
            }
        }

        if let Some(required) = obj.get("required") {
            let Some(required) = required.as_array() else {
                return Err(self.invalid(path, "`required` must be an array"));
            };
            for name in required {
                let Some(name) = name.as_str() else {
                    return Err(self.invalid(path, "`required` entries must be strings"));
                };
                object.required.insert(name.to_string());
            }
        }

        // Absent or schema-valued additionalProperties leaves the object open
        object.closed = matches!(obj.get("additionalProperties"), Some(Value::Bool(false)));

        if object.closed {
            if let Some(missing) = object
                .required
                .iter()
                .find(|name| !object.properties.contains_key(*name))
            {
                return Err(self.invalid(
                    path,
                    format!("required property `{}` is not declared on a closed object", missing),
                ));
            }
        }

        Ok(object)
    }
}

/// Primitive kind for a JSON type keyword
pub fn primitive_from_json_type(type_str: &str) -> Option<PrimitiveKind> {
    match type_str {
        "string" => Some(PrimitiveKind::String),
        "number" => Some(PrimitiveKind::Number),
        "integer" => Some(PrimitiveKind::Integer),
        "boolean" => Some(PrimitiveKind::Bool),
        _ => None,
    }
}
