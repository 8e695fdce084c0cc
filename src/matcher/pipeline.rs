use super::{DescriptorPattern, NameFilter, NamePattern, TypePattern};
use crate::app_view::AppView;
use crate::config::{
    Captures, ClassSpecification, Configuration, FieldSpecification, KeepSpecification,
    MethodSpecification, ValueSpecification, WildcardManager,
};
use crate::jvm::{
    AccessFlagPredicate, AttributeList, Class, ClassHandle, Field, Method,
};
use std::collections::HashSet;

/// A field or method under test, as a closed union
///
/// Dispatching on this enum keeps member matching a plain data
/// transformation; there is no trait object on the hot path.
#[derive(Copy, Clone)]
pub enum MemberView<'a> {
    Field(&'a Field),
    Method(&'a Method),
}

impl<'a> MemberView<'a> {
    fn name(&self) -> &'a str {
        match self {
            MemberView::Field(field) => field.name.as_ref(),
            MemberView::Method(method) => method.name.as_ref(),
        }
    }

    fn access_bits(&self) -> u16 {
        match self {
            MemberView::Field(field) => field.access_flags.bits(),
            MemberView::Method(method) => method.access_flags.bits(),
        }
    }

    fn annotations(&self) -> Vec<&'a crate::jvm::Annotation> {
        match self {
            MemberView::Field(field) => field.annotations(),
            MemberView::Method(method) => method.annotations(),
        }
    }

    fn attribute_names(&self) -> Vec<&'a str> {
        let attributes = match self {
            MemberView::Field(field) => &field.attributes,
            MemberView::Method(method) => &method.attributes,
        };
        attributes.iter().map(|attribute| attribute.name()).collect()
    }
}

/// One stage of a compiled member pipeline
#[derive(Clone, Debug)]
enum MemberStage {
    Name(NamePattern),
    Access(AccessFlagPredicate),
    Annotation(NamePattern),
    Attributes(NameFilter),
    FieldType(TypePattern),
    MethodDescriptor(DescriptorPattern),
    Value(ValueSpecification),
}

/// Compiled matcher for one member specification
///
/// Stages run cheapest first and short-circuit on the first rejection.
#[derive(Clone, Debug)]
pub struct MemberPipeline {
    is_field: bool,
    stages: Vec<MemberStage>,
}

impl MemberPipeline {
    pub fn compile_field(specification: &FieldSpecification) -> MemberPipeline {
        let mut stages = vec![];
        if let Some(name) = &specification.name {
            stages.push(MemberStage::Name(name.clone()));
        }
        if !specification.access.is_trivial() {
            stages.push(MemberStage::Access(specification.access));
        }
        if let Some(field_type) = &specification.field_type {
            stages.push(MemberStage::FieldType(field_type.clone()));
        }
        if let Some(annotation) = &specification.annotation {
            stages.push(MemberStage::Annotation(annotation.clone()));
        }
        if let Some(filter) = &specification.attribute_filter {
            stages.push(MemberStage::Attributes(filter.clone()));
        }
        if let Some(value) = &specification.value {
            stages.push(MemberStage::Value(value.clone()));
        }
        MemberPipeline {
            is_field: true,
            stages,
        }
    }

    pub fn compile_method(specification: &MethodSpecification) -> MemberPipeline {
        let mut stages = vec![];
        if let Some(name) = &specification.name {
            stages.push(MemberStage::Name(name.clone()));
        }
        if !specification.access.is_trivial() {
            stages.push(MemberStage::Access(specification.access));
        }
        if let Some(descriptor) = &specification.descriptor {
            stages.push(MemberStage::MethodDescriptor(descriptor.clone()));
        }
        if let Some(annotation) = &specification.annotation {
            stages.push(MemberStage::Annotation(annotation.clone()));
        }
        if let Some(filter) = &specification.attribute_filter {
            stages.push(MemberStage::Attributes(filter.clone()));
        }
        MemberPipeline {
            is_field: false,
            stages,
        }
    }

    pub fn is_field(&self) -> bool {
        self.is_field
    }

    pub fn matches(&self, member: MemberView, captures: &mut Captures) -> bool {
        match (self.is_field, member) {
            (true, MemberView::Field(_)) | (false, MemberView::Method(_)) => {}
            _ => return false,
        }
        for stage in &self.stages {
            let passed = match stage {
                MemberStage::Name(pattern) => pattern.matches(member.name(), captures),
                MemberStage::Access(predicate) => predicate.matches(member.access_bits()),
                MemberStage::Annotation(pattern) => member.annotations().iter().any(|annotation| {
                    pattern.matches(annotation.annotation_type.as_ref(), captures)
                }),
                MemberStage::Attributes(filter) => member
                    .attribute_names()
                    .iter()
                    .all(|name| filter.matches(name)),
                MemberStage::FieldType(pattern) => match member {
                    MemberView::Field(field) => pattern.matches(&field.descriptor, captures),
                    MemberView::Method(_) => false,
                },
                MemberStage::MethodDescriptor(pattern) => match member {
                    MemberView::Method(method) => pattern.matches(&method.descriptor, captures),
                    MemberView::Field(_) => false,
                },
                MemberStage::Value(value_specification) => match member {
                    MemberView::Field(field) => field
                        .constant_value()
                        .map_or(false, |value| value_specification.matches(value)),
                    MemberView::Method(_) => false,
                },
            };
            if !passed {
                return false;
            }
        }
        true
    }
}

/// One stage of a compiled class pipeline
#[derive(Clone, Debug)]
enum ClassStage {
    Name(NamePattern),
    Access(AccessFlagPredicate),
    Annotation(NamePattern),
    /// Requires the (possibly linked) hierarchy, so it runs late
    Extends {
        annotation: Option<NamePattern>,
        name: NamePattern,
    },
    /// Delegates to the member pipelines; only rejects when all specified
    /// members are required to be present
    Members { require_all: bool },
}

/// Which members of a matched class the member pipelines selected
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassMatch {
    /// Indices into the class's field list
    pub fields: Vec<usize>,
    /// Indices into the class's method list
    pub methods: Vec<usize>,
}

/// Compiled, reusable matcher for one class specification
///
/// Immutable after compilation: wildcard captures live in per-invocation
/// slots, so one pipeline is safe to run over many pools and passes.
#[derive(Clone, Debug)]
pub struct ClassPipeline {
    stages: Vec<ClassStage>,
    members: Vec<MemberPipeline>,
    wildcards: WildcardManager,
}

impl ClassPipeline {
    /// Compile a specification into a stage chain
    ///
    /// Stage order is a fixed performance decision: string and bit tests
    /// first, annotation scans and hierarchy walks after, member blocks
    /// last.
    pub fn compile(specification: &ClassSpecification, require_all_members: bool) -> ClassPipeline {
        let mut stages = vec![ClassStage::Name(specification.name.clone())];
        if !specification.access.is_trivial() {
            stages.push(ClassStage::Access(specification.access));
        }
        if let Some(annotation) = &specification.annotation {
            stages.push(ClassStage::Annotation(annotation.clone()));
        }
        if let Some(extends) = &specification.extends {
            stages.push(ClassStage::Extends {
                annotation: extends.annotation.clone(),
                name: extends.name.clone(),
            });
        }

        let mut members = vec![];
        for field_specification in &specification.field_specifications {
            members.push(MemberPipeline::compile_field(field_specification));
        }
        for method_specification in &specification.method_specifications {
            members.push(MemberPipeline::compile_method(method_specification));
        }
        if !members.is_empty() {
            stages.push(ClassStage::Members {
                require_all: require_all_members,
            });
        }

        ClassPipeline {
            stages,
            members,
            wildcards: specification.wildcards.clone(),
        }
    }

    /// Run the pipeline over one class
    ///
    /// `Some` carries the matched member sets; `None` means some stage
    /// rejected the class.
    pub fn matches(&self, view: &AppView, class: &Class) -> Option<ClassMatch> {
        let mut captures = self.wildcards.captures();
        for stage in &self.stages {
            match stage {
                ClassStage::Name(pattern) => {
                    if !pattern.matches(class.name.as_ref(), &mut captures) {
                        return None;
                    }
                }
                ClassStage::Access(predicate) => {
                    if !predicate.matches(class.access_flags.bits()) {
                        return None;
                    }
                }
                ClassStage::Annotation(pattern) => {
                    let found = class.annotations().iter().any(|annotation| {
                        pattern.matches(annotation.annotation_type.as_ref(), &mut captures)
                    });
                    if !found {
                        return None;
                    }
                }
                ClassStage::Extends { annotation, name } => {
                    if !Self::matches_supertype(view, class, annotation, name, &mut captures) {
                        return None;
                    }
                }
                ClassStage::Members { require_all } => {
                    let (class_match, satisfied) = self.match_members(class, &captures);
                    if *require_all && !satisfied.iter().all(|s| *s) {
                        return None;
                    }
                    return Some(class_match);
                }
            }
        }
        Some(self.match_members(class, &captures).0)
    }

    /// Collect the members selected by the member pipelines
    ///
    /// Each member attempt gets its own copy of the class-level captures so
    /// back-references into the class name work while members don't clobber
    /// each other. The second return value records, per member pipeline,
    /// whether it matched at least one member; a conditional rule requires
    /// every entry to be true.
    fn match_members(&self, class: &Class, base_captures: &Captures) -> (ClassMatch, Vec<bool>) {
        let mut class_match = ClassMatch::default();
        let mut satisfied = vec![false; self.members.len()];
        if self.members.is_empty() {
            return (class_match, satisfied);
        }
        for (index, field) in class.fields.iter().enumerate() {
            let view = MemberView::Field(field);
            let mut matched = false;
            for (pipeline_index, pipeline) in self.members.iter().enumerate() {
                let mut captures = base_captures.clone();
                if pipeline.matches(view, &mut captures) {
                    satisfied[pipeline_index] = true;
                    matched = true;
                }
            }
            if matched {
                class_match.fields.push(index);
            }
        }
        for (index, method) in class.methods.iter().enumerate() {
            let view = MemberView::Method(method);
            let mut matched = false;
            for (pipeline_index, pipeline) in self.members.iter().enumerate() {
                let mut captures = base_captures.clone();
                if pipeline.matches(view, &mut captures) {
                    satisfied[pipeline_index] = true;
                    matched = true;
                }
            }
            if matched {
                class_match.methods.push(index);
            }
        }
        (class_match, satisfied)
    }

    /// Walk the (partially) resolved hierarchy looking for a supertype
    /// matching the extends clause
    ///
    /// Unresolved references still contribute their symbolic name, so the
    /// stage degrades gracefully before linking. The visited set guards
    /// against inheritance cycles in malformed input.
    fn matches_supertype(
        view: &AppView,
        class: &Class,
        annotation: &Option<NamePattern>,
        name: &NamePattern,
        captures: &mut Captures,
    ) -> bool {
        let mut visited: HashSet<ClassHandle> = HashSet::new();
        let mut worklist: Vec<&Class> = vec![class];
        let mut symbolic_only: Vec<String> = vec![];

        while let Some(current) = worklist.pop() {
            let references = current
                .superclass
                .iter()
                .chain(current.interfaces.iter());
            for reference in references {
                match reference.resolved {
                    Some(handle) => {
                        if visited.insert(handle) {
                            let supertype = view.get(handle);
                            if name.matches(supertype.name.as_ref(), captures) {
                                let annotation_ok = match annotation {
                                    None => true,
                                    Some(pattern) => supertype.annotations().iter().any(|a| {
                                        pattern.matches(a.annotation_type.as_ref(), captures)
                                    }),
                                };
                                if annotation_ok {
                                    return true;
                                }
                            }
                            worklist.push(supertype);
                        }
                    }
                    None => symbolic_only.push(reference.name.as_ref().to_string()),
                }
            }
        }

        // Names we couldn't chase further: match them directly, but only
        // when the clause has no annotation requirement to verify
        annotation.is_none()
            && symbolic_only
                .iter()
                .any(|candidate| name.matches(candidate, captures))
    }
}

/// One keep rule, ready to run: the parsed policy plus its compiled pipeline
#[derive(Clone, Debug)]
pub struct KeepRule {
    pub keep: KeepSpecification,
    pub pipeline: ClassPipeline,
}

impl KeepRule {
    pub fn compile(keep: &KeepSpecification) -> KeepRule {
        let pipeline = ClassPipeline::compile(&keep.class_specification, keep.mark_conditionally);
        KeepRule {
            keep: keep.clone(),
            pipeline,
        }
    }
}

/// Compile every keep rule in the configuration, preserving rule order
pub fn compile_keep_rules(configuration: &Configuration) -> Vec<KeepRule> {
    configuration.keep.iter().map(KeepRule::compile).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{ConfigurationParser, WordSource};
    use crate::jvm::{
        Annotation, Attribute, BinaryName, ClassAccessFlags, ClassKind, ConstantValue,
        FieldAccessFlags, FieldType, MethodAccessFlags, MethodDescriptor, Name, ParseDescriptor,
        UnqualifiedName,
    };

    fn specification(text: &str) -> ClassSpecification {
        let source =
            WordSource::from_arguments(vec![text.to_string()], "in test");
        let mut parser = ConfigurationParser::new(source).unwrap();
        parser.parse_class_specification(true, true).unwrap()
    }

    fn sample_class(name: &str) -> Class {
        let mut class = Class::new(
            ClassKind::Program,
            BinaryName::from_string(name.to_string()).unwrap(),
            ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            Some(BinaryName::OBJECT),
        );
        class.fields.push(Field {
            name: UnqualifiedName::from_string(String::from("count")).unwrap(),
            descriptor: FieldType::int(),
            access_flags: FieldAccessFlags::PRIVATE,
            attributes: vec![],
        });
        class.methods.push(Method {
            name: UnqualifiedName::from_string(String::from("getCount")).unwrap(),
            descriptor: MethodDescriptor::parse("()I").unwrap(),
            access_flags: MethodAccessFlags::PUBLIC,
            attributes: vec![],
        });
        class
    }

    #[test]
    fn name_and_member_matching() {
        let specification = specification("class com.example.** { public *; }");
        let pipeline = ClassPipeline::compile(&specification, false);
        let view = AppView::new();
        let class = sample_class("com/example/Counter");

        let class_match = pipeline.matches(&view, &class).unwrap();
        assert!(class_match.fields.is_empty(), "private field not matched");
        assert_eq!(class_match.methods, vec![0]);
    }

    #[test]
    fn name_stage_rejects_early() {
        let specification = specification("class org.other.* { public *; }");
        let pipeline = ClassPipeline::compile(&specification, false);
        let view = AppView::new();
        assert!(pipeline.matches(&view, &sample_class("com/example/Counter")).is_none());
    }

    #[test]
    fn access_stage() {
        let specification = specification("!public class *");
        let pipeline = ClassPipeline::compile(&specification, false);
        let view = AppView::new();
        assert!(pipeline.matches(&view, &sample_class("a/A")).is_none());
    }

    #[test]
    fn annotation_stage() {
        let specification = specification("@com.example.Entity class *");
        let pipeline = ClassPipeline::compile(&specification, false);
        let view = AppView::new();

        let mut class = sample_class("a/A");
        assert!(pipeline.matches(&view, &class).is_none());

        class.attributes.push(Attribute::Annotations(vec![Annotation {
            annotation_type: BinaryName::from_string(String::from("com/example/Entity")).unwrap(),
        }]));
        assert!(pipeline.matches(&view, &class).is_some());
    }

    #[test]
    fn extends_stage_follows_resolved_hierarchy() {
        let mut view = AppView::new();
        let (base, _) = view.program_class_pool.add_class(sample_class("com/example/Base"));
        let mut derived = sample_class("com/example/Derived");
        derived.superclass = Some(crate::jvm::ClassReference {
            name: BinaryName::from_string(String::from("com/example/Base")).unwrap(),
            resolved: Some(base),
        });

        let specification = specification("class * extends com.example.Base");
        let pipeline = ClassPipeline::compile(&specification, false);
        assert!(pipeline.matches(&view, &derived).is_some());

        let unrelated = sample_class("com/example/Other");
        assert!(pipeline.matches(&view, &unrelated).is_none());
    }

    #[test]
    fn extends_stage_uses_symbolic_names_before_linking() {
        let view = AppView::new();
        let mut derived = sample_class("com/example/Derived");
        derived.superclass = Some(crate::jvm::ClassReference::new(
            BinaryName::from_string(String::from("com/example/Base")).unwrap(),
        ));

        let specification = specification("class * extends com.example.Base");
        let pipeline = ClassPipeline::compile(&specification, false);
        assert!(pipeline.matches(&view, &derived).is_some());
    }

    #[test]
    fn require_all_members() {
        let specification =
            specification("class * { public int getCount(); public void missing(); }");
        let conditional = ClassPipeline::compile(&specification, true);
        let unconditional = ClassPipeline::compile(&specification, false);
        let view = AppView::new();
        let class = sample_class("a/A");

        assert!(conditional.matches(&view, &class).is_none());
        let class_match = unconditional.matches(&view, &class).unwrap();
        assert_eq!(class_match.methods, vec![0]);
    }

    #[test]
    fn conditional_rule_requires_each_member_specification() {
        let specification = specification("class * { <fields>; <methods>; }");
        let conditional = ClassPipeline::compile(&specification, true);
        let view = AppView::new();

        // Two matched methods must not stand in for the field specification
        let mut methods_only = sample_class("a/A");
        methods_only.fields.clear();
        methods_only.methods.push(Method {
            name: UnqualifiedName::from_string(String::from("run")).unwrap(),
            descriptor: MethodDescriptor::parse("()V").unwrap(),
            access_flags: MethodAccessFlags::PUBLIC,
            attributes: vec![],
        });
        assert!(conditional.matches(&view, &methods_only).is_none());

        assert!(conditional.matches(&view, &sample_class("a/A")).is_some());
    }

    #[test]
    fn value_filter_on_fields() {
        let specification = specification("class * { int count = 0..10; }");
        let pipeline = ClassPipeline::compile(&specification, false);
        let view = AppView::new();

        let mut class = sample_class("a/A");
        let class_match = pipeline.matches(&view, &class).unwrap();
        assert!(class_match.fields.is_empty(), "no constant value attached");

        class.fields[0]
            .attributes
            .push(Attribute::ConstantValue(ConstantValue::Integer(5)));
        let class_match = pipeline.matches(&view, &class).unwrap();
        assert_eq!(class_match.fields, vec![0]);
    }

    #[test]
    fn compilation_is_idempotent() {
        let specification = specification("class com.** { public *; }");
        let first = ClassPipeline::compile(&specification, false);
        let second = ClassPipeline::compile(&specification, false);
        let view = AppView::new();

        for name in ["com/example/A", "com/B", "org/C"] {
            let class = sample_class(name);
            assert_eq!(first.matches(&view, &class), second.matches(&view, &class));
        }
    }

    #[test]
    fn back_reference_from_class_name_into_member_name() {
        let specification = specification("class com.* { java.lang.String get<1>(); }");
        let pipeline = ClassPipeline::compile(&specification, false);
        let view = AppView::new();

        let mut class = sample_class("com/Name");
        class.methods.push(Method {
            name: UnqualifiedName::from_string(String::from("getName")).unwrap(),
            descriptor: MethodDescriptor::parse("()Ljava/lang/String;").unwrap(),
            access_flags: MethodAccessFlags::PUBLIC,
            attributes: vec![],
        });

        let class_match = pipeline.matches(&view, &class).unwrap();
        assert_eq!(class_match.methods, vec![1], "only get<1> = getName matches");
    }
}
