use super::WildcardManager;
use crate::jvm::{AccessFlagPredicate, ConstantValue};
use crate::matcher::{DescriptorPattern, NameFilter, NamePattern, TypePattern};
use std::path::PathBuf;

/// The `extends`/`implements` clause of a class specification
#[derive(Clone, Debug)]
pub struct ExtendsClause {
    pub annotation: Option<NamePattern>,
    pub name: NamePattern,
}

/// Declarative predicate over classes
///
/// Owns the rule's [`WildcardManager`]: every wildcard in the class name,
/// extends clause, and member specifications shares one capture index space,
/// so back-references work across the entire rule.
#[derive(Clone, Debug)]
pub struct ClassSpecification {
    /// Comment lines preceding the rule in the configuration
    pub comments: Option<String>,
    pub access: AccessFlagPredicate,
    pub annotation: Option<NamePattern>,
    pub name: NamePattern,
    pub extends: Option<ExtendsClause>,
    pub field_specifications: Vec<FieldSpecification>,
    pub method_specifications: Vec<MethodSpecification>,
    pub wildcards: WildcardManager,
}

impl ClassSpecification {
    pub fn has_member_specifications(&self) -> bool {
        !self.field_specifications.is_empty() || !self.method_specifications.is_empty()
    }
}

/// Predicate over fields
///
/// `None` patterns leave that dimension unconstrained.
#[derive(Clone, Debug)]
pub struct FieldSpecification {
    pub access: AccessFlagPredicate,
    pub annotation: Option<NamePattern>,
    pub attribute_filter: Option<NameFilter>,
    pub field_type: Option<TypePattern>,
    pub name: Option<NamePattern>,
    pub value: Option<ValueSpecification>,
}

/// Predicate over methods
#[derive(Clone, Debug)]
pub struct MethodSpecification {
    pub access: AccessFlagPredicate,
    pub annotation: Option<NamePattern>,
    pub attribute_filter: Option<NameFilter>,
    /// `None` matches any signature (the `<methods>` form)
    pub descriptor: Option<DescriptorPattern>,
    pub name: Option<NamePattern>,
}

/// Literal-value or value-range filter on a field's constant value
#[derive(Clone, Debug, PartialEq)]
pub enum ValueSpecification {
    /// `= 5` or `= 1..10` (a literal is a degenerate range)
    IntegerRange { min: i64, max: i64 },
    String(String),
    Boolean(bool),
}

impl ValueSpecification {
    pub fn matches(&self, value: &ConstantValue) -> bool {
        match (self, value) {
            (ValueSpecification::IntegerRange { min, max }, ConstantValue::Integer(v)) => {
                min <= v && v <= max
            }
            (ValueSpecification::String(expected), ConstantValue::String(actual)) => {
                expected == actual
            }
            // Booleans are stored as 0/1 integers in class files
            (ValueSpecification::Boolean(expected), ConstantValue::Integer(actual)) => {
                *actual == i64::from(*expected)
            }
            _ => false,
        }
    }
}

/// A class specification plus keep-policy flags
#[derive(Clone, Debug)]
pub struct KeepSpecification {
    pub class_specification: ClassSpecification,

    /// Keep matched classes themselves (`-keep`, `-keepclasseswithmembers`);
    /// unset for the `-keepclassmembers` family
    pub mark_classes: bool,

    /// Keep the class only when all specified members are present
    /// (`-keepclasseswithmembers`)
    pub mark_conditionally: bool,

    /// Entities may still be removed, just not renamed (the `names` variants)
    pub allow_shrinking: bool,
    pub allow_optimization: bool,
    pub allow_obfuscation: bool,

    /// Also keep the program classes named in matched members' descriptors
    pub include_descriptor_classes: bool,
}

/// Fully parsed configuration: the ordered keep rules plus global directives
#[derive(Debug, Default)]
pub struct Configuration {
    pub keep: Vec<KeepSpecification>,

    /// `-keepattributes` filter; `None` keeps no optional attributes
    pub keep_attributes: Option<NameFilter>,

    pub ignore_warnings: bool,

    /// `-dontwarn` class filter
    pub warn_filter: Option<NameFilter>,

    /// `-dontnote` class filter
    pub note_filter: Option<NameFilter>,

    pub shrink: bool,
    pub optimize: bool,
    pub obfuscate: bool,
    pub verbose: bool,

    /// `-printseeds`; an empty path means standard output
    pub print_seeds: Option<PathBuf>,

    /// `-applymapping` input for obfuscation
    pub apply_mapping: Option<PathBuf>,

    /// Configuration files read, for cross-option validation
    pub parsed_files: Vec<PathBuf>,
}

impl Configuration {
    pub fn new() -> Configuration {
        Configuration {
            shrink: true,
            optimize: true,
            obfuscate: true,
            ..Configuration::default()
        }
    }

    /// Cross-option consistency checks, run after parsing completes
    ///
    /// These always abort, regardless of `-ignorewarnings` (spec'd as fatal
    /// configuration errors, not resolution warnings).
    pub fn validate(&self) -> Result<(), String> {
        if (self.shrink || self.obfuscate) && self.keep.is_empty() {
            return Err(String::from(
                "You have to specify '-keep' options when shrinking or obfuscating",
            ));
        }

        if self.apply_mapping.is_some() && !self.obfuscate {
            return Err(String::from(
                "'-applymapping' requires obfuscation, but '-dontobfuscate' is set",
            ));
        }

        for keep in &self.keep {
            if keep.allow_shrinking
                && !keep.mark_classes
                && !keep.class_specification.has_member_specifications()
            {
                return Err(format!(
                    "Keep rule for '{}' allows shrinking but marks neither classes nor members",
                    keep.class_specification.name.source()
                ));
            }
        }

        if let Some(print_seeds) = &self.print_seeds {
            if !print_seeds.as_os_str().is_empty() && self.parsed_files.contains(print_seeds) {
                return Err(format!(
                    "'-printseeds' would overwrite configuration file '{}'",
                    print_seeds.display()
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::ConstantValue;

    fn empty_class_specification() -> ClassSpecification {
        let mut wildcards = WildcardManager::new();
        let name = NamePattern::compile("com/example/Foo", &mut wildcards).unwrap();
        ClassSpecification {
            comments: None,
            access: AccessFlagPredicate::ANY,
            annotation: None,
            name,
            extends: None,
            field_specifications: vec![],
            method_specifications: vec![],
            wildcards,
        }
    }

    fn keep(class_specification: ClassSpecification) -> KeepSpecification {
        KeepSpecification {
            class_specification,
            mark_classes: true,
            mark_conditionally: false,
            allow_shrinking: false,
            allow_optimization: false,
            allow_obfuscation: false,
            include_descriptor_classes: false,
        }
    }

    #[test]
    fn value_specification_ranges() {
        let range = ValueSpecification::IntegerRange { min: 1, max: 10 };
        assert!(range.matches(&ConstantValue::Integer(1)));
        assert!(range.matches(&ConstantValue::Integer(10)));
        assert!(!range.matches(&ConstantValue::Integer(11)));
        assert!(!range.matches(&ConstantValue::String(String::from("5"))));

        let boolean = ValueSpecification::Boolean(true);
        assert!(boolean.matches(&ConstantValue::Integer(1)));
        assert!(!boolean.matches(&ConstantValue::Integer(0)));
    }

    #[test]
    fn validation_requires_keep_rules() {
        let configuration = Configuration::new();
        assert!(configuration.validate().is_err());

        let mut with_keep = Configuration::new();
        with_keep.keep.push(keep(empty_class_specification()));
        assert!(with_keep.validate().is_ok());
    }

    #[test]
    fn validation_rejects_mapping_without_obfuscation() {
        let mut configuration = Configuration::new();
        configuration.keep.push(keep(empty_class_specification()));
        configuration.apply_mapping = Some(PathBuf::from("mapping.txt"));
        configuration.obfuscate = false;
        assert!(configuration.validate().is_err());
    }

    #[test]
    fn validation_rejects_pointless_allowshrinking() {
        let mut configuration = Configuration::new();
        let mut rule = keep(empty_class_specification());
        rule.mark_classes = false;
        rule.allow_shrinking = true;
        configuration.keep.push(rule);
        assert!(configuration.validate().is_err());
    }
}
