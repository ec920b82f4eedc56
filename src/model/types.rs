//! Type references as they appear in declarations.
//!
//! A [`TypeRef`] is written in a Java-like textual form, which is also how it
//! is serialized in a source snapshot:
//!
//! ```
//! use scrgen::model::TypeRef;
//!
//! let ty: TypeRef = "java.util.List<com.acme.Greeter>".parse().unwrap();
//! assert_eq!(ty.erasure(), Some("java.util.List"));
//! assert_eq!(ty.type_args()[0].erasure(), Some("com.acme.Greeter"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const OBJECT: &str = "java.lang.Object";
pub const STRING: &str = "java.lang.String";
pub const INTEGER: &str = "java.lang.Integer";
pub const MAP: &str = "java.util.Map";
pub const MAP_ENTRY: &str = "java.util.Map$Entry";
pub const COLLECTION: &str = "java.util.Collection";
pub const LIST: &str = "java.util.List";
pub const SERVICE_REFERENCE: &str = "org.osgi.framework.ServiceReference";
pub const BUNDLE_CONTEXT: &str = "org.osgi.framework.BundleContext";
pub const COMPONENT_SERVICE_OBJECTS: &str = "org.osgi.service.component.ComponentServiceObjects";
pub const COMPONENT_CONTEXT: &str = "org.osgi.service.component.ComponentContext";

/// Errors raised while parsing the textual form of a type
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeRefError {
    #[error("empty type reference")]
    Empty,

    #[error("unexpected '{found}' at offset {offset} in '{input}'")]
    Unexpected {
        input: String,
        offset: usize,
        found: char,
    },

    #[error("unexpected end of type reference '{0}'")]
    UnexpectedEnd(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl Primitive {
    pub fn keyword(&self) -> &'static str {
        match self {
            Primitive::Boolean => "boolean",
            Primitive::Byte => "byte",
            Primitive::Char => "char",
            Primitive::Short => "short",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Float => "float",
            Primitive::Double => "double",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "boolean" => Some(Primitive::Boolean),
            "byte" => Some(Primitive::Byte),
            "char" => Some(Primitive::Char),
            "short" => Some(Primitive::Short),
            "int" => Some(Primitive::Int),
            "long" => Some(Primitive::Long),
            "float" => Some(Primitive::Float),
            "double" => Some(Primitive::Double),
            _ => None,
        }
    }

    /// Binary name of the wrapper class
    pub fn boxed(&self) -> &'static str {
        match self {
            Primitive::Boolean => "java.lang.Boolean",
            Primitive::Byte => "java.lang.Byte",
            Primitive::Char => "java.lang.Character",
            Primitive::Short => "java.lang.Short",
            Primitive::Int => INTEGER,
            Primitive::Long => "java.lang.Long",
            Primitive::Float => "java.lang.Float",
            Primitive::Double => "java.lang.Double",
        }
    }

    pub fn from_boxed(name: &str) -> Option<Self> {
        [
            Primitive::Boolean,
            Primitive::Byte,
            Primitive::Char,
            Primitive::Short,
            Primitive::Int,
            Primitive::Long,
            Primitive::Float,
            Primitive::Double,
        ]
        .into_iter()
        .find(|p| p.boxed() == name)
    }
}

/// A reference to a type: primitive, `void`, class (with type arguments) or array.
///
/// Class names are binary names (`com.acme.Outer$Inner`). Type variables are
/// represented as classes whose name is the variable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    Void,
    Primitive(Primitive),
    Class { name: String, args: Vec<TypeRef> },
    Array(Box<TypeRef>),
}

impl TypeRef {
    pub fn class(name: impl Into<String>) -> Self {
        TypeRef::Class {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        TypeRef::Class {
            name: name.into(),
            args,
        }
    }

    pub fn object() -> Self {
        Self::class(OBJECT)
    }

    /// Class name without type arguments, `None` for primitives, arrays and void
    pub fn erasure(&self) -> Option<&str> {
        match self {
            TypeRef::Class { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_class(&self, name: &str) -> bool {
        self.erasure() == Some(name)
    }

    pub fn type_args(&self) -> &[TypeRef] {
        match self {
            TypeRef::Class { args, .. } => args,
            _ => &[],
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Void)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeRef::Primitive(_))
    }

    pub fn element_type(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Promotes primitives to their wrapper class; other types are returned as is
    pub fn boxed(&self) -> TypeRef {
        match self {
            TypeRef::Primitive(p) => TypeRef::class(p.boxed()),
            other => other.clone(),
        }
    }

    /// Replaces type variables by the given bindings
    pub fn substitute(&self, bindings: &HashMap<String, TypeRef>) -> TypeRef {
        match self {
            TypeRef::Class { name, args } if args.is_empty() => bindings
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeRef::Class { name, args } => TypeRef::Class {
                name: name.clone(),
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
            },
            TypeRef::Array(element) => TypeRef::Array(Box::new(element.substitute(bindings))),
            other => other.clone(),
        }
    }

    /// Short human readable name used in diagnostics (`List<Greeter>`)
    pub fn simple_name(&self) -> String {
        match self {
            TypeRef::Void => "void".to_string(),
            TypeRef::Primitive(p) => p.keyword().to_string(),
            TypeRef::Array(element) => format!("{}[]", element.simple_name()),
            TypeRef::Class { name, args } => {
                let simple = name.rsplit(['.', '$']).next().unwrap_or(name);
                if args.is_empty() {
                    simple.to_string()
                } else {
                    let args: Vec<String> = args.iter().map(|a| a.simple_name()).collect();
                    format!("{}<{}>", simple, args.join(","))
                }
            }
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Void => f.write_str("void"),
            TypeRef::Primitive(p) => f.write_str(p.keyword()),
            TypeRef::Array(element) => write!(f, "{}[]", element),
            TypeRef::Class { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for TypeRef {
    type Err = TypeRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser::new(s);
        parser.skip_ws();
        if parser.at_end() {
            return Err(TypeRefError::Empty);
        }
        let ty = parser.parse_type()?;
        parser.skip_ws();
        match parser.peek() {
            None => Ok(ty),
            Some(c) => Err(parser.unexpected(c)),
        }
    }
}

impl TryFrom<String> for TypeRef {
    type Error = TypeRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn unexpected(&self, found: char) -> TypeRefError {
        TypeRefError::Unexpected {
            input: self.input.to_string(),
            offset: self.pos,
            found,
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), TypeRefError> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.unexpected(c)),
            None => Err(TypeRefError::UnexpectedEnd(self.input.to_string())),
        }
    }

    fn identifier(&mut self) -> Result<&'a str, TypeRefError> {
        self.skip_ws();
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || matches!(c, '_' | '$' | '.'))
        {
            self.bump();
        }
        if start == self.pos {
            return match self.peek() {
                Some(c) => Err(self.unexpected(c)),
                None => Err(TypeRefError::UnexpectedEnd(self.input.to_string())),
            };
        }
        Ok(&self.input[start..self.pos])
    }

    fn parse_type(&mut self) -> Result<TypeRef, TypeRefError> {
        self.skip_ws();
        let mut ty = if self.peek() == Some('?') {
            // wildcards erase to their bound
            self.bump();
            self.skip_ws();
            let rest = &self.input[self.pos..];
            if rest.starts_with("extends") || rest.starts_with("super") {
                let keyword = self.identifier()?;
                let bound = self.parse_type()?;
                if keyword == "super" {
                    TypeRef::object()
                } else {
                    bound
                }
            } else {
                TypeRef::object()
            }
        } else {
            let name = self.identifier()?;
            if name == "void" {
                TypeRef::Void
            } else if let Some(p) = Primitive::from_keyword(name) {
                TypeRef::Primitive(p)
            } else {
                let mut args = Vec::new();
                self.skip_ws();
                if self.peek() == Some('<') {
                    self.bump();
                    loop {
                        args.push(self.parse_type()?);
                        self.skip_ws();
                        match self.peek() {
                            Some(',') => self.bump(),
                            Some('>') => {
                                self.bump();
                                break;
                            }
                            Some(c) => return Err(self.unexpected(c)),
                            None => return Err(TypeRefError::UnexpectedEnd(self.input.to_string())),
                        }
                    }
                }
                TypeRef::Class {
                    name: name.to_string(),
                    args,
                }
            }
        };

        loop {
            self.skip_ws();
            if self.peek() != Some('[') {
                break;
            }
            self.bump();
            self.expect(']')?;
            ty = TypeRef::Array(Box::new(ty));
        }

        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitive_and_void() {
        assert_eq!("int".parse::<TypeRef>().unwrap(), TypeRef::Primitive(Primitive::Int));
        assert_eq!("void".parse::<TypeRef>().unwrap(), TypeRef::Void);
    }

    #[test]
    fn test_parse_nested_generics() {
        let ty: TypeRef = "java.util.Map$Entry<java.util.Map<java.lang.String,java.lang.Object>, com.acme.Greeter>"
            .parse()
            .unwrap();
        assert_eq!(ty.erasure(), Some(MAP_ENTRY));
        assert_eq!(ty.type_args().len(), 2);
        assert!(ty.type_args()[0].is_class(MAP));
        assert!(ty.type_args()[1].is_class("com.acme.Greeter"));
    }

    #[test]
    fn test_parse_arrays() {
        let ty: TypeRef = "java.lang.String[][]".parse().unwrap();
        let inner = ty.element_type().and_then(|t| t.element_type()).unwrap();
        assert!(inner.is_class(STRING));
    }

    #[test]
    fn test_parse_wildcards_erase_to_bound() {
        let ty: TypeRef = "java.util.List<? extends com.acme.Greeter>".parse().unwrap();
        assert!(ty.type_args()[0].is_class("com.acme.Greeter"));

        let ty: TypeRef = "java.util.List<?>".parse().unwrap();
        assert!(ty.type_args()[0].is_class(OBJECT));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<TypeRef>(), Err(TypeRefError::Empty));
        assert!(matches!(
            "java.util.List<".parse::<TypeRef>(),
            Err(TypeRefError::UnexpectedEnd(_))
        ));
        assert!(matches!(
            "a b".parse::<TypeRef>(),
            Err(TypeRefError::Unexpected { found: 'b', .. })
        ));
    }

    #[test]
    fn test_display_is_parseable() {
        let text = "java.util.List<com.acme.Greeter>[]";
        let ty: TypeRef = text.parse().unwrap();
        assert_eq!(ty.to_string(), text);
    }

    #[test]
    fn test_boxed() {
        assert!(TypeRef::Primitive(Primitive::Int).boxed().is_class(INTEGER));
        assert!(TypeRef::class(STRING).boxed().is_class(STRING));
        assert_eq!(Primitive::from_boxed("java.lang.Long"), Some(Primitive::Long));
    }

    #[test]
    fn test_substitute() {
        let mut bindings = HashMap::new();
        bindings.insert("E".to_string(), TypeRef::class("com.acme.Greeter"));
        let ty = TypeRef::generic(LIST, vec![TypeRef::class("E")]);
        let bound = ty.substitute(&bindings);
        assert!(bound.type_args()[0].is_class("com.acme.Greeter"));
    }

    #[test]
    fn test_simple_name() {
        let ty: TypeRef = "java.util.List<com.acme.Outer$Greeter>".parse().unwrap();
        assert_eq!(ty.simple_name(), "List<Greeter>");
    }
}
