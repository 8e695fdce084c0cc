use super::NamePattern;
use crate::config::{Captures, WildcardManager};
use crate::jvm::{BaseType, FieldType, MethodDescriptor};

/// Pattern over a single type, as written in a member specification
///
/// `%` matches any primitive type, `***` matches any type at all; class
/// names go through the ordinary wildcard name matcher.
#[derive(Clone, Debug)]
pub enum TypePattern {
    Primitive(BaseType),
    /// `%`
    AnyPrimitive { index: usize },
    /// `***`
    AnyType { index: usize },
    Class(NamePattern),
    Array {
        dimensions: usize,
        element: Box<TypePattern>,
    },
}

impl TypePattern {
    /// Compile a Java-syntax type word (`int`, `com.example.*`, `%[][]`, ...)
    ///
    /// The word arrives in external form; class-name parts are converted to
    /// internal form before compilation so matching runs against binary
    /// names.
    pub fn compile(word: &str, manager: &mut WildcardManager) -> Result<TypePattern, String> {
        let mut base = word;
        let mut dimensions = 0;
        while let Some(stripped) = base.strip_suffix("[]") {
            base = stripped;
            dimensions += 1;
        }
        if base.is_empty() {
            return Err(format!("Invalid type '{}'", word));
        }

        let element = if base == "%" {
            TypePattern::AnyPrimitive {
                index: manager.reserve(),
            }
        } else if base == "***" {
            TypePattern::AnyType {
                index: manager.reserve(),
            }
        } else if let Some(primitive) = BaseType::from_java_keyword(base) {
            TypePattern::Primitive(primitive)
        } else {
            let internal = base.replace('.', "/");
            TypePattern::Class(NamePattern::compile(&internal, manager)?)
        };

        if dimensions == 0 {
            Ok(element)
        } else {
            Ok(TypePattern::Array {
                dimensions,
                element: Box::new(element),
            })
        }
    }

    pub fn matches(&self, typ: &FieldType, captures: &mut Captures) -> bool {
        match self {
            TypePattern::Primitive(base) => matches!(typ, FieldType::Base(b) if b == base),
            TypePattern::AnyPrimitive { index } => match typ {
                FieldType::Base(base) => {
                    captures.set(*index, base.java_keyword());
                    true
                }
                _ => false,
            },
            TypePattern::AnyType { index } => {
                captures.set(*index, &typ.display_java());
                true
            }
            TypePattern::Class(pattern) => match typ {
                FieldType::Object(name) => pattern.matches(name.as_ref(), captures),
                _ => false,
            },
            TypePattern::Array {
                dimensions,
                element,
            } => match typ {
                FieldType::Array {
                    dimensions: d,
                    element: e,
                } => d == dimensions && element.matches(e, captures),
                _ => false,
            },
        }
    }
}

/// Pattern over a method's argument list
#[derive(Clone, Debug)]
pub enum ArgumentsPattern {
    /// `...`: any number of arguments of any type
    Any,
    List(Vec<TypePattern>),
}

impl ArgumentsPattern {
    pub fn matches(&self, parameters: &[FieldType], captures: &mut Captures) -> bool {
        match self {
            ArgumentsPattern::Any => true,
            ArgumentsPattern::List(patterns) => {
                patterns.len() == parameters.len()
                    && patterns
                        .iter()
                        .zip(parameters)
                        .all(|(pattern, parameter)| pattern.matches(parameter, captures))
            }
        }
    }
}

/// Pattern over a full method descriptor: return type plus argument list
#[derive(Clone, Debug)]
pub struct DescriptorPattern {
    /// `None` stands for `void`
    pub return_type: Option<TypePattern>,
    pub arguments: ArgumentsPattern,
}

impl DescriptorPattern {
    pub fn matches(&self, descriptor: &MethodDescriptor, captures: &mut Captures) -> bool {
        let return_matches = match (&self.return_type, &descriptor.return_type) {
            (None, None) => true,
            (Some(pattern), Some(typ)) => pattern.matches(typ, captures),
            // `***` also covers void returns
            (Some(TypePattern::AnyType { index }), None) => {
                captures.set(*index, "void");
                true
            }
            _ => false,
        };
        return_matches && self.arguments.matches(&descriptor.parameters, captures)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::ParseDescriptor;

    fn compile(word: &str) -> (TypePattern, WildcardManager) {
        let mut manager = WildcardManager::new();
        let pattern = TypePattern::compile(word, &mut manager).unwrap();
        (pattern, manager)
    }

    fn type_matches(word: &str, descriptor: &str) -> bool {
        let (pattern, manager) = compile(word);
        let typ = FieldType::parse(descriptor).unwrap();
        pattern.matches(&typ, &mut manager.captures())
    }

    #[test]
    fn primitives() {
        assert!(type_matches("int", "I"));
        assert!(!type_matches("int", "J"));
        assert!(type_matches("boolean", "Z"));
    }

    #[test]
    fn any_primitive() {
        assert!(type_matches("%", "I"));
        assert!(type_matches("%", "D"));
        assert!(!type_matches("%", "Ljava/lang/String;"));
        assert!(!type_matches("%", "[I"));
    }

    #[test]
    fn any_type() {
        assert!(type_matches("***", "I"));
        assert!(type_matches("***", "Ljava/lang/String;"));
        assert!(type_matches("***", "[[Lcom/example/Foo;"));
    }

    #[test]
    fn class_name_wildcards() {
        assert!(type_matches("com.example.*", "Lcom/example/Foo;"));
        assert!(!type_matches("com.example.*", "Lcom/example/sub/Foo;"));
        assert!(type_matches("com.example.**", "Lcom/example/sub/Foo;"));
        assert!(!type_matches("com.example.*", "I"));
    }

    #[test]
    fn arrays_match_exact_dimensions() {
        assert!(type_matches("int[]", "[I"));
        assert!(!type_matches("int[]", "[[I"));
        assert!(type_matches("com.example.Foo[][]", "[[Lcom/example/Foo;"));
        assert!(!type_matches("int[]", "I"));
    }

    #[test]
    fn method_descriptor_pattern() {
        let mut manager = WildcardManager::new();
        let pattern = DescriptorPattern {
            return_type: Some(TypePattern::compile("int", &mut manager).unwrap()),
            arguments: ArgumentsPattern::List(vec![
                TypePattern::compile("java.lang.String", &mut manager).unwrap(),
            ]),
        };

        let descriptor = MethodDescriptor::parse("(Ljava/lang/String;)I").unwrap();
        assert!(pattern.matches(&descriptor, &mut manager.captures()));

        let wrong_arity = MethodDescriptor::parse("(Ljava/lang/String;I)I").unwrap();
        assert!(!pattern.matches(&wrong_arity, &mut manager.captures()));
    }

    #[test]
    fn any_arguments() {
        let mut manager = WildcardManager::new();
        let pattern = DescriptorPattern {
            return_type: Some(TypePattern::compile("***", &mut manager).unwrap()),
            arguments: ArgumentsPattern::Any,
        };

        for descriptor in ["()V", "(IJ)I", "(Ljava/lang/String;)Ljava/lang/Object;"] {
            let descriptor = MethodDescriptor::parse(descriptor).unwrap();
            assert!(pattern.matches(&descriptor, &mut manager.captures()));
        }
    }

    #[test]
    fn any_type_captures_java_text() {
        let (pattern, manager) = compile("***");
        let mut captures = manager.captures();
        assert!(pattern.matches(&FieldType::parse("[I").unwrap(), &mut captures));
        assert_eq!(captures.get(1), Some("int[]"));
    }
}
