use super::{Diagnostic, Diagnostics};
use crate::app_view::AppView;
use crate::config::Configuration;
use crate::jvm::{ClassHandle, MemberDescriptor, PoolKind};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// Linking stopped because warnings were recorded and `-ignorewarnings` was
/// not set
///
/// Carries the full diagnostic list so the caller can still print it.
#[derive(Debug)]
pub struct LinkAborted {
    pub diagnostics: Diagnostics,
}

impl fmt::Display for LinkAborted {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Aborting with {} unresolved reference warning(s) (use '-ignorewarnings' to continue)",
            self.diagnostics.warning_count()
        )
    }
}

impl std::error::Error for LinkAborted {}

/// Resolve every symbolic reference in the pools that has a target
///
/// Resolution is tolerant: a missing target leaves the reference symbolic and
/// records a diagnostic, it never fails the pass. The only failure mode is
/// the final warning gate.
pub fn link(view: &mut AppView, configuration: &Configuration) -> Result<Diagnostics, LinkAborted> {
    let mut diagnostics = Diagnostics::new(
        configuration.warn_filter.clone(),
        configuration.note_filter.clone(),
    );

    note_shadowed_library_classes(view, &mut diagnostics);
    resolve_hierarchy(view, &mut diagnostics);
    cut_inheritance_cycles(view, &mut diagnostics);
    resolve_member_references(view, &mut diagnostics);
    check_descriptor_classes(view, &mut diagnostics);

    log::debug!(
        "Linked {} program and {} library classes: {} warning(s), {} note(s)",
        view.program_class_pool.len(),
        view.library_class_pool.len(),
        diagnostics.warning_count(),
        diagnostics.note_count()
    );

    if diagnostics.warning_count() > 0 && !configuration.ignore_warnings {
        Err(LinkAborted { diagnostics })
    } else {
        Ok(diagnostics)
    }
}

/// Names defined in both pools shadow the library definition; worth a note
fn note_shadowed_library_classes(view: &AppView, diagnostics: &mut Diagnostics) {
    let mut shadowed = vec![];
    for class in view.library_class_pool.classes() {
        if view.program_class_pool.lookup(&class.name).is_some() {
            shadowed.push(class.name.as_ref().to_string());
        }
    }
    for name in shadowed {
        diagnostics.note(
            name.clone(),
            format!("program class '{}' shadows a library class of the same name", name),
        );
    }
}

/// Phase one of hierarchy linking: resolve superclass and interface
/// references and populate subclass back-references
///
/// Reads and writes are split so the pools are never borrowed mutably while
/// being scanned: resolutions are collected first, then applied.
fn resolve_hierarchy(view: &mut AppView, diagnostics: &mut Diagnostics) {
    // (this class, superclass target, interface targets)
    let mut resolutions: Vec<(ClassHandle, Option<ClassHandle>, Vec<Option<ClassHandle>>)> = vec![];

    for handle in view.all_handles() {
        let class = view.get(handle);
        let superclass = match &class.superclass {
            None => None,
            Some(reference) => {
                let target = view.lookup(&reference.name);
                if target.is_none() {
                    report_missing_supertype(diagnostics, handle, class.name.as_ref(), reference);
                }
                target
            }
        };
        let mut interfaces = vec![];
        for reference in &class.interfaces {
            let target = view.lookup(&reference.name);
            if target.is_none() {
                report_missing_supertype(diagnostics, handle, class.name.as_ref(), reference);
            }
            interfaces.push(target);
        }
        resolutions.push((handle, superclass, interfaces));
    }

    let mut subclasses: HashMap<ClassHandle, Vec<ClassHandle>> = HashMap::new();
    for (handle, superclass, interfaces) in resolutions {
        let targets: Vec<ClassHandle> = superclass
            .iter()
            .chain(interfaces.iter().flatten())
            .copied()
            .collect();
        for target in &targets {
            let children = subclasses.entry(*target).or_default();
            if !children.contains(&handle) {
                children.push(handle);
            }
        }

        let class = view.get_mut(handle);
        if let (Some(reference), Some(target)) = (&mut class.superclass, superclass) {
            reference.resolved = Some(target);
        }
        for (reference, target) in class.interfaces.iter_mut().zip(interfaces) {
            reference.resolved = target;
        }
    }

    for (handle, children) in subclasses {
        view.get_mut(handle).subclasses = children;
    }
}

fn report_missing_supertype(
    diagnostics: &mut Diagnostics,
    handle: ClassHandle,
    class_name: &str,
    reference: &crate::jvm::ClassReference,
) {
    let message = format!(
        "can't find superclass or interface '{}'",
        reference.name.external()
    );
    match handle.pool {
        PoolKind::Program => diagnostics.reference_warning(class_name, &reference.name, message),
        // Incomplete library pools are routine; don't gate on them
        PoolKind::Library => diagnostics.note(class_name, message),
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Done,
}

enum Frame {
    Enter(ClassHandle),
    Exit(ClassHandle),
}

/// Detect inheritance cycles and cut them
///
/// Each cycle produces exactly one warning, naming the class where the walk
/// closed the loop; that class's offending supertype edge is left unresolved
/// so later hierarchy walks terminate.
fn cut_inheritance_cycles(view: &mut AppView, diagnostics: &mut Diagnostics) {
    let mut states: HashMap<ClassHandle, VisitState> = HashMap::new();
    // (class closing the cycle, supertype edge to cut)
    let mut cuts: Vec<(ClassHandle, ClassHandle)> = vec![];

    let handles: Vec<ClassHandle> = view.all_handles().collect();
    for root in handles {
        if states.contains_key(&root) {
            continue;
        }
        let mut stack = vec![Frame::Enter(root)];
        while let Some(frame) = stack.pop() {
            let handle = match frame {
                Frame::Enter(handle) => handle,
                Frame::Exit(handle) => {
                    states.insert(handle, VisitState::Done);
                    continue;
                }
            };
            if states.contains_key(&handle) {
                continue;
            }
            states.insert(handle, VisitState::Visiting);
            stack.push(Frame::Exit(handle));

            let class = view.get(handle);
            let supertypes = class
                .superclass
                .iter()
                .chain(class.interfaces.iter())
                .filter_map(|reference| reference.resolved);
            for target in supertypes {
                match states.get(&target) {
                    // A back edge into the active walk closes a cycle
                    Some(VisitState::Visiting) => {
                        diagnostics.warning(
                            class.name.as_ref(),
                            format!(
                                "inheritance cycle through '{}'",
                                view.get(target).name.external()
                            ),
                        );
                        cuts.push((handle, target));
                    }
                    Some(VisitState::Done) => {}
                    None => stack.push(Frame::Enter(target)),
                }
            }
        }
    }

    for (handle, target) in cuts {
        let class = view.get_mut(handle);
        if let Some(reference) = &mut class.superclass {
            if reference.resolved == Some(target) {
                reference.resolved = None;
            }
        }
        for reference in &mut class.interfaces {
            if reference.resolved == Some(target) {
                reference.resolved = None;
            }
        }
    }
}

/// Resolve member references carried by program classes
///
/// The declaring class is searched first, then its superclass chain, then
/// its interfaces breadth-first. A missing target class or member is a
/// warning on the referencing class.
fn resolve_member_references(view: &mut AppView, diagnostics: &mut Diagnostics) {
    let mut resolutions: Vec<(ClassHandle, usize, ClassHandle)> = vec![];

    let handles: Vec<ClassHandle> = view.program_class_pool.handles().collect();
    for handle in handles {
        let class = view.get(handle);
        for (index, member_reference) in class.member_references.iter().enumerate() {
            let target = match view.lookup(&member_reference.class.name) {
                Some(target) => target,
                None => {
                    diagnostics.reference_warning(
                        class.name.as_ref(),
                        &member_reference.class.name,
                        format!(
                            "can't find referenced class '{}'",
                            member_reference.class.name.external()
                        ),
                    );
                    continue;
                }
            };

            if find_member(view, target, member_reference).is_none() {
                let kind = match &member_reference.descriptor {
                    MemberDescriptor::Field(_) => "field",
                    MemberDescriptor::Method(_) => "method",
                };
                diagnostics.reference_warning(
                    class.name.as_ref(),
                    &member_reference.class.name,
                    format!(
                        "can't find referenced {} '{}' in class '{}'",
                        kind,
                        member_reference.name.as_ref(),
                        member_reference.class.name.external()
                    ),
                );
            }
            resolutions.push((handle, index, target));
        }
    }

    for (handle, index, target) in resolutions {
        view.get_mut(handle).member_references[index].class.resolved = Some(target);
    }
}

/// Walk up from `start` looking for the member: the class itself, then the
/// superclass chain, then interfaces breadth-first
fn find_member(
    view: &AppView,
    start: ClassHandle,
    reference: &crate::jvm::MemberReference,
) -> Option<ClassHandle> {
    let name = reference.name.as_ref();

    let mut chain = Some(start);
    let mut interface_queue: VecDeque<ClassHandle> = VecDeque::new();
    let mut seen: HashSet<ClassHandle> = HashSet::new();
    while let Some(handle) = chain {
        if !seen.insert(handle) {
            break;
        }
        let class = view.get(handle);
        if has_member(class, name, &reference.descriptor) {
            return Some(handle);
        }
        interface_queue.extend(class.interfaces.iter().filter_map(|i| i.resolved));
        chain = class.superclass.as_ref().and_then(|s| s.resolved);
    }

    while let Some(handle) = interface_queue.pop_front() {
        if !seen.insert(handle) {
            continue;
        }
        let class = view.get(handle);
        if has_member(class, name, &reference.descriptor) {
            return Some(handle);
        }
        interface_queue.extend(class.interfaces.iter().filter_map(|i| i.resolved));
    }

    None
}

/// Classes named by program field/method descriptors and attributes must
/// exist in one of the pools; a miss means the input class path is incomplete
fn check_descriptor_classes(view: &AppView, diagnostics: &mut Diagnostics) {
    for class in view.program_class_pool.classes() {
        for name in class.descriptor_class_names() {
            if view.lookup(name).is_none() {
                diagnostics.reference_warning(
                    class.name.as_ref(),
                    name,
                    format!("can't find referenced class '{}'", name.external()),
                );
            }
        }
    }
}

fn has_member(class: &crate::jvm::Class, name: &str, descriptor: &MemberDescriptor) -> bool {
    match descriptor {
        MemberDescriptor::Field(field_type) => class.field(name, field_type).is_some(),
        MemberDescriptor::Method(method_descriptor) => class.method(name, method_descriptor).is_some(),
    }
}

/// Render diagnostics for display, notes first within recording order
pub fn sorted_for_display(diagnostics: &Diagnostics) -> Vec<&Diagnostic> {
    let mut list: Vec<&Diagnostic> = diagnostics.iter().collect();
    list.sort_by_key(|diagnostic| diagnostic.severity as u8);
    list
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{
        BinaryName, Class, ClassAccessFlags, ClassKind, ClassReference, FieldType, MemberReference,
        MethodAccessFlags, MethodDescriptor, Name, ParseDescriptor, UnqualifiedName,
    };
    use crate::link::Severity;

    fn class(kind: ClassKind, name: &str, superclass: Option<&str>) -> Class {
        Class::new(
            kind,
            BinaryName::from_string(name.to_string()).unwrap(),
            ClassAccessFlags::PUBLIC,
            superclass.map(|s| BinaryName::from_string(s.to_string()).unwrap()),
        )
    }

    fn view_with_object() -> AppView {
        let mut view = AppView::new();
        view.library_class_pool
            .add_class(class(ClassKind::Library, "java/lang/Object", None));
        view
    }

    #[test]
    fn resolves_supertypes_and_subclasses() {
        let mut view = view_with_object();
        let (base, _) = view
            .program_class_pool
            .add_class(class(ClassKind::Program, "a/Base", Some("java/lang/Object")));
        let (derived, _) = view
            .program_class_pool
            .add_class(class(ClassKind::Program, "a/Derived", Some("a/Base")));

        let diagnostics = link(&mut view, &Configuration::new()).unwrap();
        assert_eq!(diagnostics.warning_count(), 0);

        let derived_class = view.get(derived);
        assert_eq!(
            derived_class.superclass.as_ref().unwrap().resolved,
            Some(base)
        );
        assert_eq!(view.get(base).subclasses, vec![derived]);
    }

    #[test]
    fn missing_superclass_is_a_warning_not_a_failure() {
        let mut view = view_with_object();
        view.program_class_pool
            .add_class(class(ClassKind::Program, "a/A", Some("missing/Gone")));

        let mut configuration = Configuration::new();
        configuration.ignore_warnings = true;
        let diagnostics = link(&mut view, &configuration).unwrap();
        assert_eq!(diagnostics.warning_count(), 1);

        // The reference stays symbolic
        let handle = view
            .lookup(&BinaryName::from_string(String::from("a/A")).unwrap())
            .unwrap();
        assert_eq!(view.get(handle).superclass.as_ref().unwrap().resolved, None);
    }

    #[test]
    fn warning_gate_blocks_without_ignore_warnings() {
        let mut view = view_with_object();
        view.program_class_pool
            .add_class(class(ClassKind::Program, "a/A", Some("missing/Gone")));

        let aborted = link(&mut view, &Configuration::new()).unwrap_err();
        assert_eq!(aborted.diagnostics.warning_count(), 1);
    }

    #[test]
    fn dontwarn_suppresses_the_gate() {
        let mut view = view_with_object();
        view.program_class_pool
            .add_class(class(ClassKind::Program, "a/A", Some("missing/Gone")));

        let mut configuration = Configuration::new();
        configuration.warn_filter =
            Some(crate::matcher::NameFilter::compile(&[String::from("a/**")]).unwrap());
        let diagnostics = link(&mut view, &configuration).unwrap();
        assert_eq!(diagnostics.warning_count(), 0);
    }

    #[test]
    fn inheritance_cycle_is_cut_with_one_warning() {
        let mut view = view_with_object();
        let (a, _) = view
            .program_class_pool
            .add_class(class(ClassKind::Program, "cyc/A", Some("cyc/B")));
        let (b, _) = view
            .program_class_pool
            .add_class(class(ClassKind::Program, "cyc/B", Some("cyc/A")));

        let mut configuration = Configuration::new();
        configuration.ignore_warnings = true;
        let diagnostics = link(&mut view, &configuration).unwrap();

        let cycle_warnings = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning && d.message.contains("cycle"))
            .count();
        assert_eq!(cycle_warnings, 1);

        // One of the two edges was cut, so chain walks terminate
        let a_up = view.get(a).superclass.as_ref().unwrap().resolved;
        let b_up = view.get(b).superclass.as_ref().unwrap().resolved;
        assert!(a_up.is_none() || b_up.is_none());
        assert!(a_up.is_some() || b_up.is_some());
    }

    #[test]
    fn member_reference_found_in_superclass() {
        let mut view = view_with_object();
        let mut base = class(ClassKind::Program, "a/Base", Some("java/lang/Object"));
        base.methods.push(crate::jvm::Method {
            name: UnqualifiedName::from_string(String::from("run")).unwrap(),
            descriptor: MethodDescriptor::parse("()V").unwrap(),
            access_flags: MethodAccessFlags::PUBLIC,
            attributes: vec![],
        });
        view.program_class_pool.add_class(base);
        view.program_class_pool
            .add_class(class(ClassKind::Program, "a/Derived", Some("a/Base")));

        let mut caller = class(ClassKind::Program, "a/Caller", Some("java/lang/Object"));
        caller.member_references.push(MemberReference {
            class: ClassReference::new(
                BinaryName::from_string(String::from("a/Derived")).unwrap(),
            ),
            name: UnqualifiedName::from_string(String::from("run")).unwrap(),
            descriptor: MemberDescriptor::Method(MethodDescriptor::parse("()V").unwrap()),
        });
        view.program_class_pool.add_class(caller);

        let diagnostics = link(&mut view, &Configuration::new()).unwrap();
        assert_eq!(diagnostics.warning_count(), 0);
    }

    #[test]
    fn missing_member_is_a_warning() {
        let mut view = view_with_object();
        view.program_class_pool
            .add_class(class(ClassKind::Program, "a/Target", Some("java/lang/Object")));

        let mut caller = class(ClassKind::Program, "a/Caller", Some("java/lang/Object"));
        caller.member_references.push(MemberReference {
            class: ClassReference::new(
                BinaryName::from_string(String::from("a/Target")).unwrap(),
            ),
            name: UnqualifiedName::from_string(String::from("gone")).unwrap(),
            descriptor: MemberDescriptor::Field(FieldType::int()),
        });
        view.program_class_pool.add_class(caller);

        let aborted = link(&mut view, &Configuration::new()).unwrap_err();
        let messages: Vec<&str> = aborted
            .diagnostics
            .iter()
            .map(|d| d.message.as_str())
            .collect();
        assert!(messages
            .iter()
            .any(|m| m.contains("can't find referenced field 'gone'")));
    }

    #[test]
    fn missing_descriptor_class_is_a_warning() {
        let mut view = view_with_object();
        let mut holder = class(ClassKind::Program, "a/Holder", Some("java/lang/Object"));
        holder.fields.push(crate::jvm::Field {
            name: UnqualifiedName::from_string(String::from("gone")).unwrap(),
            descriptor: FieldType::object(
                BinaryName::from_string(String::from("missing/Type")).unwrap(),
            ),
            access_flags: crate::jvm::FieldAccessFlags::PUBLIC,
            attributes: vec![],
        });
        view.program_class_pool.add_class(holder);

        let mut configuration = Configuration::new();
        configuration.ignore_warnings = true;
        let diagnostics = link(&mut view, &configuration).unwrap();
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("can't find referenced class 'missing.Type'")));
    }

    #[test]
    fn dontwarn_on_the_missing_class_suppresses_reference_warnings() {
        let mut view = view_with_object();
        view.program_class_pool
            .add_class(class(ClassKind::Program, "a/A", Some("missing/Gone")));

        let mut configuration = Configuration::new();
        configuration.warn_filter =
            Some(crate::matcher::NameFilter::compile(&[String::from("missing/**")]).unwrap());
        let diagnostics = link(&mut view, &configuration).unwrap();
        assert_eq!(diagnostics.warning_count(), 0);
    }

    #[test]
    fn shadowed_library_class_is_a_note() {
        let mut view = view_with_object();
        view.library_class_pool
            .add_class(class(ClassKind::Library, "a/A", Some("java/lang/Object")));
        view.program_class_pool
            .add_class(class(ClassKind::Program, "a/A", Some("java/lang/Object")));

        let diagnostics = link(&mut view, &Configuration::new()).unwrap();
        assert_eq!(diagnostics.note_count(), 1);
        assert_eq!(diagnostics.warning_count(), 0);
    }

    #[test]
    fn linking_twice_is_idempotent() {
        let mut view = view_with_object();
        view.program_class_pool
            .add_class(class(ClassKind::Program, "a/Base", Some("java/lang/Object")));
        view.program_class_pool
            .add_class(class(ClassKind::Program, "a/Derived", Some("a/Base")));

        let configuration = Configuration::new();
        link(&mut view, &configuration).unwrap();
        link(&mut view, &configuration).unwrap();

        let base = view
            .lookup(&BinaryName::from_string(String::from("a/Base")).unwrap())
            .unwrap();
        assert_eq!(view.get(base).subclasses.len(), 1);
    }
}
