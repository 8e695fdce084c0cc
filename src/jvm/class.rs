use super::{
    Attribute, AttributeList, BinaryName, ClassAccessFlags, ClassHandle, FieldAccessFlags,
    FieldType, MethodAccessFlags, MethodDescriptor, UnqualifiedName,
};
use std::fmt;

/// Which pool a class belongs to
///
/// Program classes are fully defined and mutable; library classes are
/// read-only and possibly only partially modeled by ingestion.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ClassKind {
    Program,
    Library,
}

/// A symbolic reference to another class, resolved lazily by the linker
///
/// Resolution never fails hard: a missing target leaves `resolved` as `None`
/// and the linker records a diagnostic instead.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ClassReference {
    pub name: BinaryName,
    pub resolved: Option<ClassHandle>,
}

impl ClassReference {
    pub fn new(name: BinaryName) -> ClassReference {
        ClassReference {
            name,
            resolved: None,
        }
    }
}

/// Descriptor of a referenced member (field or method)
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum MemberDescriptor {
    Field(FieldType),
    Method(MethodDescriptor),
}

/// A symbolic member reference, as embedded in a class's constant data
///
/// Ingestion produces these from `Fieldref`/`Methodref` constants; the linker
/// resolves them against the pools.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MemberReference {
    pub class: ClassReference,
    pub name: UnqualifiedName,
    pub descriptor: MemberDescriptor,
}

/// Semantic representation of one class
pub struct Class {
    pub kind: ClassKind,

    pub name: BinaryName,

    pub access_flags: ClassAccessFlags,

    /// Superclass is only ever missing for `java/lang/Object` itself
    pub superclass: Option<ClassReference>,

    /// Interfaces implemented (or super-interfaces)
    pub interfaces: Vec<ClassReference>,

    pub fields: Vec<Field>,

    pub methods: Vec<Method>,

    pub attributes: Vec<Attribute>,

    /// Member references embedded in the class's constant data
    pub member_references: Vec<MemberReference>,

    /// Known direct subclasses and implementors
    ///
    /// Populated by the linker, never by ingestion.
    pub subclasses: Vec<ClassHandle>,
}

impl Class {
    /// Create a class with no members yet
    pub fn new(
        kind: ClassKind,
        name: BinaryName,
        access_flags: ClassAccessFlags,
        superclass: Option<BinaryName>,
    ) -> Class {
        Class {
            kind,
            name,
            access_flags,
            superclass: superclass.map(ClassReference::new),
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            attributes: vec![],
            member_references: vec![],
            subclasses: vec![],
        }
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    pub fn is_annotation(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::ANNOTATION)
    }

    /// Find a field by name and type
    pub fn field(&self, name: &str, descriptor: &FieldType) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| field.name.as_ref() == name && &field.descriptor == descriptor)
    }

    /// Find a method by name and descriptor
    pub fn method(&self, name: &str, descriptor: &MethodDescriptor) -> Option<&Method> {
        self.methods
            .iter()
            .find(|method| method.name.as_ref() == name && &method.descriptor == descriptor)
    }

    /// Classes mentioned by this class's own member descriptors and
    /// attributes, deduplicated in first-mention order
    ///
    /// Supertypes and explicit member references are excluded; the linker
    /// reports those through its own resolution passes.
    pub fn descriptor_class_names(&self) -> Vec<&BinaryName> {
        let mut names = vec![];
        for field in &self.fields {
            names.extend(field.descriptor.referenced_class());
            for attribute in &field.attributes {
                names.extend(attribute.referenced_classes());
            }
        }
        for method in &self.methods {
            names.extend(method.descriptor.referenced_classes());
            for attribute in &method.attributes {
                names.extend(attribute.referenced_classes());
            }
        }
        for attribute in &self.attributes {
            names.extend(attribute.referenced_classes());
        }
        let mut seen = std::collections::HashSet::new();
        names.retain(|name| seen.insert(*name));
        names
    }
}

impl AttributeList for Class {
    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_ref())
    }
}

/// A field, owned by its declaring class
#[derive(Clone, PartialEq, Debug)]
pub struct Field {
    pub name: UnqualifiedName,
    pub descriptor: FieldType,
    pub access_flags: FieldAccessFlags,
    pub attributes: Vec<Attribute>,
}

impl AttributeList for Field {
    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}

/// A method, owned by its declaring class
#[derive(Clone, PartialEq, Debug)]
pub struct Method {
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
    pub access_flags: MethodAccessFlags,
    pub attributes: Vec<Attribute>,
}

impl AttributeList for Method {
    fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
}
