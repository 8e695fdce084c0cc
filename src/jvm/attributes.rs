use super::BinaryName;
use std::fmt;

/// An annotation as it appears in a `Runtime*Annotations` attribute, reduced
/// to the parts specification matching needs
///
/// Element values are not modeled: the configuration grammar only ever
/// filters on the annotation's type.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Annotation {
    pub annotation_type: BinaryName,
}

/// A constant value attached to a field via the `ConstantValue` attribute, or
/// the default value of an annotation method
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.2
#[derive(Clone, PartialEq, Debug)]
pub enum ConstantValue {
    Integer(i64),
    Float(f64),
    String(String),
}

/// Parsed view of a class/field/method attribute
///
/// Class-file decoding happens upstream; by the time entities reach this
/// front end, the attributes that matter for matching and checking are
/// structured and everything else is carried by name only.
#[derive(Clone, PartialEq, Debug)]
pub enum Attribute {
    Annotations(Vec<Annotation>),
    ConstantValue(ConstantValue),
    Signature(String),
    SourceFile(String),
    Exceptions(Vec<BinaryName>),
    /// Attribute this front end has no structured model for
    Other(String),
}

impl Attribute {
    /// The attribute name as it appears in the class file
    pub fn name(&self) -> &str {
        match self {
            Attribute::Annotations(_) => "RuntimeVisibleAnnotations",
            Attribute::ConstantValue(_) => "ConstantValue",
            Attribute::Signature(_) => "Signature",
            Attribute::SourceFile(_) => "SourceFile",
            Attribute::Exceptions(_) => "Exceptions",
            Attribute::Other(name) => name,
        }
    }

    /// Class names this attribute refers to, for the linker
    pub fn referenced_classes(&self) -> Vec<&BinaryName> {
        match self {
            Attribute::Annotations(annotations) => annotations
                .iter()
                .map(|annotation| &annotation.annotation_type)
                .collect(),
            Attribute::Exceptions(exceptions) => exceptions.iter().collect(),
            _ => vec![],
        }
    }
}

/// Helpers over an entity's attribute list
pub trait AttributeList {
    fn attributes(&self) -> &[Attribute];

    /// All annotations, across every annotations attribute
    fn annotations(&self) -> Vec<&Annotation> {
        self.attributes()
            .iter()
            .filter_map(|attribute| match attribute {
                Attribute::Annotations(annotations) => Some(annotations.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// The field's constant value, if it has one
    fn constant_value(&self) -> Option<&ConstantValue> {
        self.attributes().iter().find_map(|attribute| match attribute {
            Attribute::ConstantValue(value) => Some(value),
            _ => None,
        })
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Integer(value) => value.fmt(f),
            ConstantValue::Float(value) => value.fmt(f),
            ConstantValue::String(value) => f.write_fmt(format_args!("\"{}\"", value)),
        }
    }
}
