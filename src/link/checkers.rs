use super::Diagnostics;
use crate::app_view::AppView;
use crate::config::Configuration;
use crate::jvm::{BinaryName, ClassHandle, Name, PoolKind, UnqualifiedName};
use crate::matcher::{ClassMatch, KeepRule};
use std::collections::HashSet;

/// The classes (and their members) one keep rule matched
#[derive(Clone, Debug, Default)]
pub struct RuleMatches {
    pub matched: Vec<(ClassHandle, ClassMatch)>,
}

impl RuleMatches {
    fn program_classes(&self) -> impl Iterator<Item = ClassHandle> + '_ {
        self.matched
            .iter()
            .map(|(handle, _)| *handle)
            .filter(|handle| handle.pool == PoolKind::Program)
    }

    fn library_classes(&self) -> impl Iterator<Item = ClassHandle> + '_ {
        self.matched
            .iter()
            .map(|(handle, _)| *handle)
            .filter(|handle| handle.pool == PoolKind::Library)
    }
}

/// Run every rule's pipeline over both pools, preserving rule order
pub fn match_rules(view: &AppView, rules: &[KeepRule]) -> Vec<RuleMatches> {
    rules
        .iter()
        .map(|rule| {
            let mut matches = RuleMatches::default();
            for handle in view.all_handles() {
                if let Some(class_match) = rule.pipeline.matches(view, view.get(handle)) {
                    matches.matched.push((handle, class_match));
                }
            }
            matches
        })
        .collect()
}

/// Run all consistency checkers
///
/// Checkers are pure observers over the linked pools: they record notes and
/// never mutate anything, so running them twice records the same notes twice.
pub fn run_checkers(
    view: &AppView,
    configuration: &Configuration,
    rules: &[KeepRule],
    diagnostics: &mut Diagnostics,
) {
    let matches = match_rules(view, rules);
    check_unresolved_keep_names(view, rules, diagnostics);
    ClassMemberChecker.check(view, rules, &matches, diagnostics);
    KeepClassMemberChecker.check(rules, diagnostics);
    DescriptorKeepChecker.check(view, rules, &matches, diagnostics);
    LibraryKeepChecker.check(rules, &matches, diagnostics);
    GetAnnotationChecker.check(view, configuration, diagnostics);
}

/// A keep rule naming a class exactly (no wildcards) that no pool defines is
/// almost certainly a typo
fn check_unresolved_keep_names(view: &AppView, rules: &[KeepRule], diagnostics: &mut Diagnostics) {
    for rule in rules {
        let name_pattern = &rule.keep.class_specification.name;
        if let Some(exact) = name_pattern.exact_name() {
            match BinaryName::from_string(exact.to_string()) {
                Ok(name) if view.lookup(&name).is_none() => {
                    diagnostics.note(
                        exact,
                        format!(
                            "the configuration refers to the unknown class '{}'",
                            name.external()
                        ),
                    );
                }
                _ => {}
            }
        }
    }
}

/// Flags member specifications that name (without wildcards) members absent
/// from a matched class
pub struct ClassMemberChecker;

impl ClassMemberChecker {
    pub fn check(
        &self,
        view: &AppView,
        rules: &[KeepRule],
        matches: &[RuleMatches],
        diagnostics: &mut Diagnostics,
    ) {
        for (rule, rule_matches) in rules.iter().zip(matches) {
            let specification = &rule.keep.class_specification;
            let mut exact_names: Vec<(&str, bool)> = vec![];
            for field in &specification.field_specifications {
                if let Some(exact) = field.name.as_ref().and_then(|name| name.exact_name()) {
                    exact_names.push((exact, true));
                }
            }
            for method in &specification.method_specifications {
                if let Some(exact) = method.name.as_ref().and_then(|name| name.exact_name()) {
                    exact_names.push((exact, false));
                }
            }
            if exact_names.is_empty() {
                continue;
            }

            for (handle, _) in &rule_matches.matched {
                let class = view.get(*handle);
                for (name, is_field) in &exact_names {
                    let declared = if *is_field {
                        class.fields.iter().any(|field| field.name.as_ref() == *name)
                    } else {
                        class.methods.iter().any(|method| method.name.as_ref() == *name)
                    };
                    if !declared {
                        let kind = if *is_field { "field" } else { "method" };
                        diagnostics.note(
                            class.name.as_ref(),
                            format!(
                                "the configuration refers to the unknown {} '{}' in class '{}'",
                                kind,
                                name,
                                class.name.external()
                            ),
                        );
                    }
                }
            }
        }
    }
}

/// A member-marking rule with no member specifications matches nothing useful
pub struct KeepClassMemberChecker;

impl KeepClassMemberChecker {
    pub fn check(&self, rules: &[KeepRule], diagnostics: &mut Diagnostics) {
        for rule in rules {
            let keep = &rule.keep;
            if !keep.mark_classes
                && !keep.mark_conditionally
                && !keep.class_specification.has_member_specifications()
            {
                diagnostics.note(
                    keep.class_specification.name.source(),
                    String::from(
                        "the member-keeping rule specifies no members, so it keeps nothing",
                    ),
                );
            }
        }
    }
}

/// Kept members whose descriptors pull in program classes that are not
/// themselves kept will break under shrinking
pub struct DescriptorKeepChecker;

impl DescriptorKeepChecker {
    pub fn check(
        &self,
        view: &AppView,
        rules: &[KeepRule],
        matches: &[RuleMatches],
        diagnostics: &mut Diagnostics,
    ) {
        let mut kept: HashSet<ClassHandle> = HashSet::new();
        for rule_matches in matches {
            kept.extend(rule_matches.program_classes());
        }

        let mut reported: HashSet<(ClassHandle, BinaryName)> = HashSet::new();
        for (rule, rule_matches) in rules.iter().zip(matches) {
            if rule.keep.include_descriptor_classes {
                continue;
            }
            for (handle, class_match) in &rule_matches.matched {
                if handle.pool != PoolKind::Program {
                    continue;
                }
                let class = view.get(*handle);

                let mut referenced: Vec<(&UnqualifiedName, &BinaryName)> = vec![];
                for &index in &class_match.fields {
                    let field = &class.fields[index];
                    referenced
                        .extend(field.descriptor.referenced_class().map(|c| (&field.name, c)));
                }
                for &index in &class_match.methods {
                    let method = &class.methods[index];
                    for class_name in method.descriptor.referenced_classes() {
                        referenced.push((&method.name, class_name));
                    }
                }

                for (member_name, class_name) in referenced {
                    let target = match view.program_class_pool.lookup(class_name) {
                        Some(target) => target,
                        // Library and unknown classes are out of shrinking's reach
                        None => continue,
                    };
                    if kept.contains(&target) {
                        continue;
                    }
                    if reported.insert((*handle, class_name.clone())) {
                        diagnostics.note(
                            class.name.as_ref(),
                            format!(
                                "the kept member '{}' refers to program class '{}', which is not kept itself",
                                member_name.as_ref(),
                                class_name.external()
                            ),
                        );
                    }
                }
            }
        }
    }
}

/// A rule that only ever matches library classes keeps nothing the processor
/// touches
pub struct LibraryKeepChecker;

impl LibraryKeepChecker {
    pub fn check(&self, rules: &[KeepRule], matches: &[RuleMatches], diagnostics: &mut Diagnostics) {
        for (rule, rule_matches) in rules.iter().zip(matches) {
            let library = rule_matches.library_classes().count();
            if library > 0 && rule_matches.program_classes().count() == 0 {
                diagnostics.note(
                    rule.keep.class_specification.name.source(),
                    format!(
                        "the keep rule matches {} library class(es) but no program classes",
                        library
                    ),
                );
            }
        }
    }
}

/// Attribute names whose presence makes runtime annotation lookup work
const ANNOTATION_ATTRIBUTES: &[&str] = &[
    "RuntimeVisibleAnnotations",
    "RuntimeInvisibleAnnotations",
    "RuntimeVisibleParameterAnnotations",
    "RuntimeInvisibleParameterAnnotations",
    "AnnotationDefault",
];

/// Program code reflecting on annotations while the configuration strips
/// annotation attributes will see nothing at runtime
pub struct GetAnnotationChecker;

impl GetAnnotationChecker {
    pub fn check(
        &self,
        view: &AppView,
        configuration: &Configuration,
        diagnostics: &mut Diagnostics,
    ) {
        let annotations_kept = match &configuration.keep_attributes {
            None => false,
            Some(filter) => ANNOTATION_ATTRIBUTES
                .iter()
                .any(|attribute| filter.matches(attribute)),
        };
        if annotations_kept {
            return;
        }

        for class in view.program_class_pool.classes() {
            for member_reference in &class.member_references {
                let reflective = member_reference.class.name == BinaryName::CLASS
                    && (member_reference.name == UnqualifiedName::GETANNOTATION
                        || member_reference.name == UnqualifiedName::GETANNOTATIONS
                        || member_reference.name == UnqualifiedName::GETDECLAREDANNOTATIONS);
                if reflective {
                    diagnostics.note(
                        class.name.as_ref(),
                        format!(
                            "the class calls '{}', but the configuration keeps no annotation attributes",
                            member_reference.name.as_ref()
                        ),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{ConfigurationParser, WordSource};
    use crate::jvm::{
        Class, ClassAccessFlags, ClassKind, ClassReference, FieldType, MemberDescriptor,
        MemberReference, MethodAccessFlags, MethodDescriptor, ParseDescriptor,
    };
    use crate::link::link;
    use crate::matcher::compile_keep_rules;

    fn parse(text: &str) -> Configuration {
        let source = WordSource::from_arguments(
            text.lines().map(str::to_string).collect(),
            "in test",
        );
        let mut parser = ConfigurationParser::new(source).unwrap();
        let mut configuration = Configuration::new();
        parser.parse(&mut configuration).unwrap();
        configuration
    }

    fn class(kind: ClassKind, name: &str) -> Class {
        Class::new(
            kind,
            BinaryName::from_string(name.to_string()).unwrap(),
            ClassAccessFlags::PUBLIC,
            Some(BinaryName::OBJECT),
        )
    }

    fn view_with_object() -> AppView {
        let mut view = AppView::new();
        view.library_class_pool.add_class(Class::new(
            ClassKind::Library,
            BinaryName::OBJECT,
            ClassAccessFlags::PUBLIC,
            None,
        ));
        view
    }

    fn checked(view: &mut AppView, configuration: &Configuration) -> Diagnostics {
        let mut diagnostics = link(view, configuration).unwrap();
        let rules = compile_keep_rules(configuration);
        run_checkers(view, configuration, &rules, &mut diagnostics);
        diagnostics
    }

    #[test]
    fn unknown_exact_class_name_is_a_note() {
        let mut view = view_with_object();
        view.program_class_pool
            .add_class(class(ClassKind::Program, "a/Present"));

        let configuration = parse("-keep class a.Missing");
        let diagnostics = checked(&mut view, &configuration);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("unknown class 'a.Missing'")));
    }

    #[test]
    fn wildcard_names_are_never_reported_unknown() {
        let mut view = view_with_object();
        let configuration = parse("-keep class a.**");
        let diagnostics = checked(&mut view, &configuration);
        assert!(!diagnostics.iter().any(|d| d.message.contains("unknown class")));
    }

    #[test]
    fn unknown_member_name_is_a_note() {
        let mut view = view_with_object();
        view.program_class_pool
            .add_class(class(ClassKind::Program, "a/A"));

        let configuration = parse("-keep class a.A { int missingField; }");
        let diagnostics = checked(&mut view, &configuration);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("unknown field 'missingField'")));
    }

    #[test]
    fn memberless_keepclassmembers_is_a_note() {
        let mut view = view_with_object();
        let configuration = parse("-keepclassmembers class a.*\n-keep class b.*");
        let diagnostics = checked(&mut view, &configuration);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("specifies no members")));
    }

    #[test]
    fn descriptor_class_not_kept_is_a_note() {
        let mut view = view_with_object();
        let mut kept = class(ClassKind::Program, "a/Kept");
        kept.fields.push(crate::jvm::Field {
            name: UnqualifiedName::from_string(String::from("helper")).unwrap(),
            descriptor: FieldType::object(
                BinaryName::from_string(String::from("a/Helper")).unwrap(),
            ),
            access_flags: crate::jvm::FieldAccessFlags::PUBLIC,
            attributes: vec![],
        });
        view.program_class_pool.add_class(kept);
        view.program_class_pool
            .add_class(class(ClassKind::Program, "a/Helper"));

        let configuration = parse("-keep class a.Kept { *; }");
        let diagnostics = checked(&mut view, &configuration);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("program class 'a.Helper', which is not kept")));

        // Keeping the helper too silences the note
        let configuration = parse("-keep class a.Kept { *; }\n-keep class a.Helper");
        let diagnostics = checked(&mut view, &configuration);
        assert!(!diagnostics.iter().any(|d| d.message.contains("not kept itself")));
    }

    #[test]
    fn includedescriptorclasses_silences_the_descriptor_note() {
        let mut view = view_with_object();
        let mut kept = class(ClassKind::Program, "a/Kept");
        kept.fields.push(crate::jvm::Field {
            name: UnqualifiedName::from_string(String::from("helper")).unwrap(),
            descriptor: FieldType::object(
                BinaryName::from_string(String::from("a/Helper")).unwrap(),
            ),
            access_flags: crate::jvm::FieldAccessFlags::PUBLIC,
            attributes: vec![],
        });
        view.program_class_pool.add_class(kept);
        view.program_class_pool
            .add_class(class(ClassKind::Program, "a/Helper"));

        let configuration = parse("-keep,includedescriptorclasses class a.Kept { *; }");
        let diagnostics = checked(&mut view, &configuration);
        assert!(!diagnostics.iter().any(|d| d.message.contains("not kept itself")));
    }

    #[test]
    fn library_only_rule_is_a_note() {
        let mut view = view_with_object();
        view.library_class_pool
            .add_class(class(ClassKind::Library, "javax/swing/JFrame"));
        view.program_class_pool
            .add_class(class(ClassKind::Program, "a/App"));

        let configuration = parse("-keep class javax.swing.*");
        let diagnostics = checked(&mut view, &configuration);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("library class(es) but no program classes")));
    }

    #[test]
    fn reflective_annotation_lookup_without_kept_attributes() {
        let mut view = view_with_object();
        let mut class_class = class(ClassKind::Library, "java/lang/Class");
        class_class.methods.push(crate::jvm::Method {
            name: UnqualifiedName::GETANNOTATION,
            descriptor: MethodDescriptor::parse(
                "(Ljava/lang/Class;)Ljava/lang/annotation/Annotation;",
            )
            .unwrap(),
            access_flags: MethodAccessFlags::PUBLIC,
            attributes: vec![],
        });
        view.library_class_pool.add_class(class_class);
        let mut caller = class(ClassKind::Program, "a/Reflector");
        caller.member_references.push(MemberReference {
            class: ClassReference::new(BinaryName::CLASS),
            name: UnqualifiedName::GETANNOTATION,
            descriptor: MemberDescriptor::Method(
                MethodDescriptor::parse(
                    "(Ljava/lang/Class;)Ljava/lang/annotation/Annotation;",
                )
                .unwrap(),
            ),
        });
        view.program_class_pool.add_class(caller);

        let configuration = parse("-keep class a.Reflector");
        let diagnostics = checked(&mut view, &configuration);
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("keeps no annotation attributes")));

        let configuration = parse("-keep class a.Reflector\n-keepattributes *Annotations*");
        let diagnostics = checked(&mut view, &configuration);
        assert!(!diagnostics
            .iter()
            .any(|d| d.message.contains("keeps no annotation attributes")));
    }
}
