use super::{
    ClassSpecification, Configuration, ExtendsClause, FieldSpecification, KeepSpecification,
    MethodSpecification, ParseError, ValueSpecification, WildcardManager, WordSource,
};
use crate::jvm::{lookup_access_flag_keyword, AccessFlagPredicate, ClassAccessFlags};
use crate::matcher::{ArgumentsPattern, DescriptorPattern, NameFilter, NamePattern, TypePattern};
use std::path::PathBuf;

/// Which member kind the access flags seen so far commit us to
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum MemberKind {
    Field,
    Method,
}

/// Access-flag predicates accumulated before we know whether the member
/// specification is a field or a method
struct MemberFlags {
    field: AccessFlagPredicate,
    method: AccessFlagPredicate,
    kind: Option<MemberKind>,
}

/// Recursive-descent compiler from configuration words to specifications
///
/// One word of lookahead (`current`); every error carries the word source's
/// location description. Parsing is not resumable after an error, but keep
/// rules parsed before the failure stay valid in the `Configuration`.
pub struct ConfigurationParser {
    source: WordSource,
    current: Option<String>,
}

impl ConfigurationParser {
    pub fn new(mut source: WordSource) -> Result<ConfigurationParser, ParseError> {
        let current = source.next_word(false, false)?;
        Ok(ConfigurationParser { source, current })
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Result<ConfigurationParser, ParseError> {
        ConfigurationParser::new(WordSource::from_file(path.into())?)
    }

    /// Parse every option in the source chain into `configuration`
    pub fn parse(&mut self, configuration: &mut Configuration) -> Result<(), ParseError> {
        while let Some(word) = self.current.clone() {
            match word.as_str() {
                "@" | "-include" => {
                    let file = self.advance_file_name()?.ok_or_else(|| {
                        self.error("Expected file name after include directive")
                    })?;
                    let path = self.source.resolve_path(file.as_ref());
                    configuration.parsed_files.push(path.clone());
                    self.source.include_file(&file)?;
                    self.advance()?;
                }
                "-basedirectory" => {
                    let directory = self.advance_file_name()?.ok_or_else(|| {
                        self.error("Expected directory name after '-basedirectory'")
                    })?;
                    self.source.set_base_directory(PathBuf::from(directory));
                    self.advance()?;
                }
                "-keep" => self.parse_keep_option(configuration, true, false)?,
                "-keepclassmembers" => self.parse_keep_option(configuration, false, false)?,
                "-keepclasseswithmembers" => self.parse_keep_option(configuration, true, true)?,
                "-keepnames" => {
                    self.parse_keep_names_option(configuration, true, false)?;
                }
                "-keepclassmembernames" => {
                    self.parse_keep_names_option(configuration, false, false)?;
                }
                "-keepclasseswithmembernames" => {
                    self.parse_keep_names_option(configuration, true, true)?;
                }
                "-keepattributes" => {
                    let filter = self.parse_optional_filter_list()?;
                    let entries = if filter.is_empty() {
                        vec![String::from("*")]
                    } else {
                        filter
                    };
                    configuration.keep_attributes =
                        Some(NameFilter::compile(&entries).map_err(|msg| self.error(msg))?);
                }
                "-ignorewarnings" => {
                    configuration.ignore_warnings = true;
                    self.advance()?;
                }
                "-dontwarn" => {
                    configuration.warn_filter = Some(self.parse_class_name_filter()?);
                }
                "-dontnote" => {
                    configuration.note_filter = Some(self.parse_class_name_filter()?);
                }
                "-dontshrink" => {
                    configuration.shrink = false;
                    self.advance()?;
                }
                "-dontoptimize" => {
                    configuration.optimize = false;
                    self.advance()?;
                }
                "-dontobfuscate" => {
                    configuration.obfuscate = false;
                    self.advance()?;
                }
                "-verbose" => {
                    configuration.verbose = true;
                    self.advance()?;
                }
                "-printseeds" => {
                    let file = self.advance_file_name()?;
                    match file {
                        Some(file) if !file.starts_with('-') => {
                            configuration.print_seeds = Some(PathBuf::from(file));
                            self.advance()?;
                        }
                        other => {
                            configuration.print_seeds = Some(PathBuf::new());
                            self.current = other;
                        }
                    }
                }
                "-applymapping" => {
                    let file = self.advance_file_name()?.ok_or_else(|| {
                        self.error("Expected file name after '-applymapping'")
                    })?;
                    configuration.apply_mapping = Some(PathBuf::from(file));
                    self.advance()?;
                }
                other if other.starts_with('-') => {
                    return Err(self.error(format!("Unknown option '{}'", other)));
                }
                other => {
                    return Err(self.error(format!("Expected option but found '{}'", other)));
                }
            }
        }
        Ok(())
    }

    fn parse_keep_names_option(
        &mut self,
        configuration: &mut Configuration,
        mark_classes: bool,
        mark_conditionally: bool,
    ) -> Result<(), ParseError> {
        let start = configuration.keep.len();
        self.parse_keep_option(configuration, mark_classes, mark_conditionally)?;
        for keep in &mut configuration.keep[start..] {
            keep.allow_shrinking = true;
        }
        Ok(())
    }

    fn parse_keep_option(
        &mut self,
        configuration: &mut Configuration,
        mark_classes: bool,
        mark_conditionally: bool,
    ) -> Result<(), ParseError> {
        // Comments stay queued in the source until the class specification
        // parse takes them, so they land on the parsed rule rather than on
        // this placeholder
        let mut keep = KeepSpecification {
            class_specification: ClassSpecification {
                comments: None,
                access: AccessFlagPredicate::ANY,
                annotation: None,
                name: NamePattern::compile("**", &mut WildcardManager::new())
                    .map_err(|msg| self.error(msg))?,
                extends: None,
                field_specifications: vec![],
                method_specifications: vec![],
                wildcards: WildcardManager::new(),
            },
            mark_classes,
            mark_conditionally,
            allow_shrinking: false,
            allow_optimization: false,
            allow_obfuscation: false,
            include_descriptor_classes: false,
        };

        // Keep modifiers trail the option after commas
        self.advance()?;
        while self.current.as_deref() == Some(",") {
            self.advance()?;
            let modifier = self
                .current
                .clone()
                .ok_or_else(|| self.error("Expected keep modifier after ','"))?;
            match modifier.as_str() {
                "allowshrinking" => keep.allow_shrinking = true,
                "allowoptimization" => keep.allow_optimization = true,
                "allowobfuscation" => keep.allow_obfuscation = true,
                "includedescriptorclasses" => keep.include_descriptor_classes = true,
                other => {
                    return Err(self.error(format!("Unknown keep modifier '{}'", other)));
                }
            }
            self.advance()?;
        }

        keep.class_specification = self.parse_class_specification_inner(true, true)?;
        configuration.keep.push(keep);
        Ok(())
    }

    /// Standalone entry point: parse one class specification starting at the
    /// current word
    pub fn parse_class_specification(
        &mut self,
        allow_members: bool,
        allow_values: bool,
    ) -> Result<ClassSpecification, ParseError> {
        self.parse_class_specification_inner(allow_members, allow_values)
    }

    fn parse_class_specification_inner(
        &mut self,
        allow_members: bool,
        allow_values: bool,
    ) -> Result<ClassSpecification, ParseError> {
        let comments = self.source.last_comments();
        let mut wildcards = WildcardManager::new();
        let mut access = AccessFlagPredicate::ANY;
        let mut annotation = None;

        // Optional annotation filter, unless the '@' introduces '@interface'
        if self.current.as_deref() == Some("@") {
            self.advance()?;
            if self.current.as_deref() != Some("interface") {
                let word = self
                    .current
                    .clone()
                    .ok_or_else(|| self.error("Expected annotation type after '@'"))?;
                annotation = Some(self.compile_class_name_pattern(&word, &mut wildcards)?);
                self.advance()?;
            } else {
                // '@interface': an annotation type declaration keyword
                access.set(ClassAccessFlags::ANNOTATION.bits(), false);
                access.set(ClassAccessFlags::INTERFACE.bits(), false);
                // Fall through to the keyword handling below
            }
        }

        // Access flags, then the class/interface/enum keyword
        loop {
            let word = self
                .current
                .clone()
                .ok_or_else(|| self.error("Expected class specification"))?;
            let (negated, keyword) = match word.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, word.as_str()),
            };
            match keyword {
                "class" => {
                    if negated {
                        return Err(self.error("'class' cannot be negated"));
                    }
                    self.advance()?;
                    break;
                }
                "interface" => {
                    access.set(ClassAccessFlags::INTERFACE.bits(), negated);
                    self.advance()?;
                    break;
                }
                "enum" => {
                    access.set(ClassAccessFlags::ENUM.bits(), negated);
                    self.advance()?;
                    break;
                }
                "@" => {
                    // 'public @interface Foo'
                    self.advance()?;
                    if self.current.as_deref() != Some("interface") {
                        return Err(self.error("Expected 'interface' after '@'"));
                    }
                    access.set(ClassAccessFlags::ANNOTATION.bits(), negated);
                    access.set(ClassAccessFlags::INTERFACE.bits(), negated);
                    self.advance()?;
                    break;
                }
                _ => match lookup_access_flag_keyword(keyword).and_then(|k| k.class_bits) {
                    Some(bits) => {
                        access.set(bits, negated);
                        self.advance()?;
                    }
                    None => {
                        return Err(self.error(format!(
                            "Expected access modifier or class keyword but found '{}'",
                            word
                        )));
                    }
                },
            }
        }

        // Mandatory class name pattern
        let name_word = self
            .current
            .clone()
            .ok_or_else(|| self.error("Expected class name pattern"))?;
        let name = self.compile_class_name_pattern(&name_word, &mut wildcards)?;
        self.advance()?;

        // Optional extends/implements clause
        let mut extends = None;
        if matches!(self.current.as_deref(), Some("extends") | Some("implements")) {
            self.advance()?;
            let mut extends_annotation = None;
            if self.current.as_deref() == Some("@") {
                self.advance()?;
                let word = self
                    .current
                    .clone()
                    .ok_or_else(|| self.error("Expected annotation type after '@'"))?;
                extends_annotation = Some(self.compile_class_name_pattern(&word, &mut wildcards)?);
                self.advance()?;
            }
            let word = self
                .current
                .clone()
                .ok_or_else(|| self.error("Expected class name after 'extends'"))?;
            let extends_name = self.compile_class_name_pattern(&word, &mut wildcards)?;
            self.advance()?;
            extends = Some(ExtendsClause {
                annotation: extends_annotation,
                name: extends_name,
            });
        }

        let mut specification = ClassSpecification {
            comments,
            access,
            annotation,
            name,
            extends,
            field_specifications: vec![],
            method_specifications: vec![],
            wildcards,
        };

        // Optional member block
        if self.current.as_deref() == Some("{") {
            if !allow_members {
                return Err(self.error("Member specifications are not allowed here"));
            }
            self.advance()?;
            while self.current.as_deref() != Some("}") {
                if self.current.is_none() {
                    return Err(self.error("Expected '}' to close member specifications"));
                }
                self.parse_member_specification(&mut specification, allow_values)?;
            }
            self.advance()?;
        }

        Ok(specification)
    }

    fn parse_member_specification(
        &mut self,
        specification: &mut ClassSpecification,
        allow_values: bool,
    ) -> Result<(), ParseError> {
        let wildcards = &mut specification.wildcards;

        // Optional annotation filter
        let mut annotation = None;
        if self.current.as_deref() == Some("@") {
            self.advance()?;
            let word = self
                .current
                .clone()
                .ok_or_else(|| self.error("Expected annotation type after '@'"))?;
            let internal = word.replace('.', "/");
            annotation =
                Some(NamePattern::compile(&internal, wildcards).map_err(|msg| self.error(msg))?);
            self.advance()?;
        }

        // Optional bracketed attribute-name filter
        let mut attribute_filter = None;
        if self
            .current
            .as_deref()
            .map_or(false, |word| word.starts_with('['))
        {
            attribute_filter = Some(self.parse_attribute_filter()?);
        }

        // Access flags; we may not know yet whether this is a field or method
        let mut flags = MemberFlags {
            field: AccessFlagPredicate::ANY,
            method: AccessFlagPredicate::ANY,
            kind: None,
        };
        loop {
            let word = self
                .current
                .clone()
                .ok_or_else(|| self.error("Expected member specification"))?;
            let (negated, keyword) = match word.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, word.as_str()),
            };
            match lookup_access_flag_keyword(keyword) {
                Some(k) if k.field_bits.is_some() || k.method_bits.is_some() => {
                    self.apply_member_flag(&mut flags, k.field_bits, k.method_bits, negated)?;
                    self.advance()?;
                }
                _ => break,
            }
        }

        let word = self
            .current
            .clone()
            .ok_or_else(|| self.error("Expected member specification"))?;

        match word.as_str() {
            "*" => {
                // Any field and any method, unless the flags committed us
                self.advance()?;
                self.expect(";")?;
                if flags.kind != Some(MemberKind::Method) {
                    specification.field_specifications.push(FieldSpecification {
                        access: flags.field,
                        annotation: annotation.clone(),
                        attribute_filter: attribute_filter.clone(),
                        field_type: None,
                        name: None,
                        value: None,
                    });
                }
                if flags.kind != Some(MemberKind::Field) {
                    specification.method_specifications.push(MethodSpecification {
                        access: flags.method,
                        annotation,
                        attribute_filter,
                        descriptor: None,
                        name: None,
                    });
                }
                Ok(())
            }
            "<fields>" => {
                self.require_member_kind(&flags, MemberKind::Field)?;
                self.advance()?;
                self.expect(";")?;
                specification.field_specifications.push(FieldSpecification {
                    access: flags.field,
                    annotation,
                    attribute_filter,
                    field_type: None,
                    name: None,
                    value: None,
                });
                Ok(())
            }
            "<methods>" => {
                self.require_member_kind(&flags, MemberKind::Method)?;
                self.advance()?;
                self.expect(";")?;
                specification.method_specifications.push(MethodSpecification {
                    access: flags.method,
                    annotation,
                    attribute_filter,
                    descriptor: None,
                    name: None,
                });
                Ok(())
            }
            first_word => {
                let first_word = first_word.to_string();
                self.advance()?;

                // Constructor shorthand: a name directly followed by '('
                if self.current.as_deref() == Some("(") {
                    self.require_member_kind(&flags, MemberKind::Method)?;
                    if first_word != "<init>"
                        && first_word != "<clinit>"
                        && first_word.contains(&['*', '?', '<'][..])
                    {
                        return Err(
                            self.error(format!("Invalid constructor name '{}'", first_word))
                        );
                    }
                    let name = NamePattern::compile("<init>", wildcards)
                        .map_err(|msg| self.error(msg))?;
                    let arguments = self.parse_argument_patterns(&mut specification.wildcards)?;
                    self.expect(";")?;
                    specification.method_specifications.push(MethodSpecification {
                        access: flags.method,
                        annotation,
                        attribute_filter,
                        descriptor: Some(DescriptorPattern {
                            return_type: None,
                            arguments,
                        }),
                        name: Some(name),
                    });
                    return Ok(());
                }

                // Ordinary form: a type word then a name word
                let type_pattern = TypePattern::compile(&first_word, &mut specification.wildcards)
                    .map_err(|msg| self.error(msg))?;
                let name_word = self
                    .current
                    .clone()
                    .ok_or_else(|| self.error("Expected member name"))?;
                let name = NamePattern::compile(&name_word, &mut specification.wildcards)
                    .map_err(|msg| self.error(msg))?;
                self.advance()?;

                if self.current.as_deref() == Some("(") {
                    // Method with explicit return type
                    self.require_member_kind(&flags, MemberKind::Method)?;
                    let return_type = if first_word == "void" {
                        None
                    } else {
                        Some(type_pattern)
                    };
                    let arguments = self.parse_argument_patterns(&mut specification.wildcards)?;
                    self.expect(";")?;
                    specification.method_specifications.push(MethodSpecification {
                        access: flags.method,
                        annotation,
                        attribute_filter,
                        descriptor: Some(DescriptorPattern {
                            return_type,
                            arguments,
                        }),
                        name: Some(name),
                    });
                } else {
                    // Field, with an optional value filter
                    self.require_member_kind(&flags, MemberKind::Field)?;
                    if first_word == "void" {
                        return Err(self.error("Fields cannot have type 'void'"));
                    }
                    let mut value = None;
                    if self.current.as_deref() == Some("=") {
                        if !allow_values {
                            return Err(self.error("Value filters are not allowed here"));
                        }
                        self.advance()?;
                        let value_word = self
                            .current
                            .clone()
                            .ok_or_else(|| self.error("Expected value after '='"))?;
                        value = Some(self.parse_value_specification(&value_word)?);
                        self.advance()?;
                    }
                    self.expect(";")?;
                    specification.field_specifications.push(FieldSpecification {
                        access: flags.field,
                        annotation,
                        attribute_filter,
                        field_type: Some(type_pattern),
                        name: Some(name),
                        value,
                    });
                }
                Ok(())
            }
        }
    }

    fn apply_member_flag(
        &self,
        flags: &mut MemberFlags,
        field_bits: Option<u16>,
        method_bits: Option<u16>,
        negated: bool,
    ) -> Result<(), ParseError> {
        let implied = match (field_bits, method_bits) {
            (Some(_), Some(_)) => None,
            (Some(_), None) => Some(MemberKind::Field),
            (None, Some(_)) => Some(MemberKind::Method),
            (None, None) => return Err(self.error("Access modifier not valid for members")),
        };
        if let Some(implied) = implied {
            match flags.kind {
                None => flags.kind = Some(implied),
                Some(kind) if kind != implied => {
                    return Err(self.error(
                        "Conflicting field and method access modifiers in one specification",
                    ));
                }
                Some(_) => {}
            }
        }
        if let Some(bits) = field_bits {
            flags.field.set(bits, negated);
        }
        if let Some(bits) = method_bits {
            flags.method.set(bits, negated);
        }
        Ok(())
    }

    fn require_member_kind(
        &self,
        flags: &MemberFlags,
        expected: MemberKind,
    ) -> Result<(), ParseError> {
        match flags.kind {
            Some(kind) if kind != expected => Err(self.error(format!(
                "Access modifiers commit this specification to a {:?}, not a {:?}",
                kind, expected
            ))),
            _ => Ok(()),
        }
    }

    fn parse_argument_patterns(
        &mut self,
        wildcards: &mut WildcardManager,
    ) -> Result<ArgumentsPattern, ParseError> {
        // Current word is '('
        self.advance()?;
        if self.current.as_deref() == Some(")") {
            self.advance()?;
            return Ok(ArgumentsPattern::List(vec![]));
        }
        if self.current.as_deref() == Some("...") {
            self.advance()?;
            if self.current.as_deref() != Some(")") {
                return Err(self.error("Expected ')' after '...'"));
            }
            self.advance()?;
            return Ok(ArgumentsPattern::Any);
        }

        let mut patterns = vec![];
        loop {
            let word = self
                .current
                .clone()
                .ok_or_else(|| self.error("Expected argument type"))?;
            patterns.push(TypePattern::compile(&word, wildcards).map_err(|msg| self.error(msg))?);
            self.advance()?;
            match self.current.as_deref() {
                Some(",") => self.advance()?,
                Some(")") => {
                    self.advance()?;
                    return Ok(ArgumentsPattern::List(patterns));
                }
                _ => return Err(self.error("Expected ',' or ')' in argument list")),
            }
        }
    }

    fn parse_value_specification(&self, word: &str) -> Result<ValueSpecification, ParseError> {
        if word == "true" {
            return Ok(ValueSpecification::Boolean(true));
        }
        if word == "false" {
            return Ok(ValueSpecification::Boolean(false));
        }
        if let Some((low, high)) = word.split_once("..") {
            let min: i64 = low
                .parse()
                .map_err(|_| self.error(format!("Invalid range bound '{}'", low)))?;
            let max: i64 = high
                .parse()
                .map_err(|_| self.error(format!("Invalid range bound '{}'", high)))?;
            if min > max {
                return Err(self.error(format!("Empty value range '{}'", word)));
            }
            return Ok(ValueSpecification::IntegerRange { min, max });
        }
        if let Ok(value) = word.parse::<i64>() {
            return Ok(ValueSpecification::IntegerRange {
                min: value,
                max: value,
            });
        }
        Ok(ValueSpecification::String(word.to_string()))
    }

    /// `[Signature, Deprecated]` between annotation filter and access flags
    fn parse_attribute_filter(&mut self) -> Result<NameFilter, ParseError> {
        let mut entries: Vec<String> = vec![];
        loop {
            let word = self
                .current
                .clone()
                .ok_or_else(|| self.error("Expected ']' to close attribute filter"))?;
            let mut entry = word;
            if let Some(stripped) = entry.strip_prefix('[') {
                entry = stripped.to_string();
            }
            let closed = entry.ends_with(']');
            if closed {
                entry.pop();
            }
            if !entry.is_empty() {
                entries.push(entry);
            }
            self.advance()?;
            if closed {
                break;
            }
            if self.current.as_deref() == Some(",") {
                self.advance()?;
            }
        }
        if entries.is_empty() {
            return Err(self.error("Empty attribute filter"));
        }
        NameFilter::compile(&entries).map_err(|msg| self.error(msg))
    }

    /// A comma-separated list following an option, ending before the next
    /// option word (or end of input)
    fn parse_optional_filter_list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut entries = vec![];
        self.advance()?;
        loop {
            match self.current.as_deref() {
                Some(word) if !word.starts_with('-') && word != "," => {
                    entries.push(word.to_string());
                    self.advance()?;
                    if self.current.as_deref() == Some(",") {
                        self.advance()?;
                        continue;
                    }
                    break;
                }
                _ => break,
            }
        }
        Ok(entries)
    }

    fn parse_class_name_filter(&mut self) -> Result<NameFilter, ParseError> {
        let entries = self.parse_optional_filter_list()?;
        let entries = if entries.is_empty() {
            vec![String::from("**")]
        } else {
            entries
                .into_iter()
                .map(|entry| entry.replace('.', "/"))
                .collect()
        };
        NameFilter::compile(&entries).map_err(|msg| self.error(msg))
    }

    fn compile_class_name_pattern(
        &self,
        word: &str,
        wildcards: &mut WildcardManager,
    ) -> Result<NamePattern, ParseError> {
        let internal = word.replace('.', "/");
        NamePattern::compile(&internal, wildcards).map_err(|msg| self.error(msg))
    }

    /// Read the next configuration word
    ///
    /// Variable expansion stays off here: `<init>`, `<fields>`, and `<n>`
    /// back-references are specification syntax, not variables.
    fn advance(&mut self) -> Result<(), ParseError> {
        self.current = self.source.next_word(false, false)?;
        Ok(())
    }

    /// Read the next word as a file name (keeps `:` and `{}` intact)
    fn advance_file_name(&mut self) -> Result<Option<String>, ParseError> {
        self.current = self.source.next_word(true, true)?;
        Ok(self.current.clone())
    }

    fn expect(&mut self, token: &str) -> Result<(), ParseError> {
        match self.current.as_deref() {
            Some(word) if word == token => {
                self.advance()?;
                Ok(())
            }
            Some(word) => Err(self.error(format!("Expected '{}' but found '{}'", token, word))),
            None => Err(self.error(format!("Expected '{}' but found end of input", token))),
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.source.current_location_description())
    }
}

/// Parse one configuration file into a fresh [`Configuration`]
pub fn parse_configuration_file(path: impl Into<PathBuf>) -> Result<Configuration, ParseError> {
    let path = path.into();
    let mut configuration = Configuration::new();
    configuration.parsed_files.push(path.clone());
    let mut parser = ConfigurationParser::from_file(path)?;
    parser.parse(&mut configuration)?;
    Ok(configuration)
}
