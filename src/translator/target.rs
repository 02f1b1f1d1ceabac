//! Translation targets

use std::fmt;

/// The host type a wire value is translated into
#[derive(Debug, Clone, PartialEq)]
pub enum TargetType {
    /// Natural mapping of the wire type
    Any,
    Bool,
    Int,
    Long,
    Double,
    String,
    Date,
    Xml,
    Bytes,
    /// String constant of a named enumeration
    Enum { type_name: String, constants: Vec<String> },
    List(Box<TargetType>),
    /// String- or value-keyed map; the box is the value type
    Map(Box<TargetType>),
    /// Class registered under an alias
    Class(String),
}

impl TargetType {
    pub fn list(element: TargetType) -> Self {
        TargetType::List(Box::new(element))
    }

    pub fn map(value: TargetType) -> Self {
        TargetType::Map(Box::new(value))
    }

    pub fn class(alias: impl Into<String>) -> Self {
        TargetType::Class(alias.into())
    }

    pub fn enumeration(type_name: impl Into<String>, constants: &[&str]) -> Self {
        TargetType::Enum {
            type_name: type_name.into(),
            constants: constants.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Any => f.write_str("any"),
            TargetType::Bool => f.write_str("bool"),
            TargetType::Int => f.write_str("int"),
            TargetType::Long => f.write_str("long"),
            TargetType::Double => f.write_str("double"),
            TargetType::String => f.write_str("string"),
            TargetType::Date => f.write_str("date"),
            TargetType::Xml => f.write_str("xml"),
            TargetType::Bytes => f.write_str("bytes"),
            TargetType::Enum { type_name, .. } => write!(f, "enum {}", type_name),
            TargetType::List(element) => write!(f, "list<{}>", element),
            TargetType::Map(value) => write!(f, "map<{}>", value),
            TargetType::Class(alias) => f.write_str(alias),
        }
    }
}
