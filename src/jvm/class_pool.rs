use super::{BinaryName, Class, ClassKind};
use std::collections::HashMap;
use std::fmt;

/// Which of the two coexisting pools a handle points into
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum PoolKind {
    Program,
    Library,
}

/// Index-based handle to a class in one of the two pools
///
/// Handles stay valid because pools never remove or reorder classes; the
/// linker only mutates entities in place.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ClassHandle {
    pub pool: PoolKind,
    pub index: u32,
}

impl fmt::Debug for ClassHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{:?}#{}", self.pool, self.index))
    }
}

/// Name-keyed repository of class entities
///
/// Iteration follows insertion order so every downstream pass is
/// deterministic. Names are unique: inserting a duplicate replaces the
/// earlier entity and reports it to the caller.
pub struct ClassPool {
    kind: PoolKind,
    classes: Vec<Class>,
    by_name: HashMap<BinaryName, u32>,
}

impl ClassPool {
    pub fn new(kind: PoolKind) -> ClassPool {
        ClassPool {
            kind,
            classes: vec![],
            by_name: HashMap::new(),
        }
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Add a class, returning its handle
    ///
    /// A name collision replaces the earlier definition in place (last
    /// insertion wins) and hands back the shadowed entity so the caller can
    /// report a duplicate-definition diagnostic.
    pub fn add_class(&mut self, class: Class) -> (ClassHandle, Option<Class>) {
        debug_assert_eq!(
            class.kind,
            match self.kind {
                PoolKind::Program => ClassKind::Program,
                PoolKind::Library => ClassKind::Library,
            },
            "Class kind does not match pool"
        );
        match self.by_name.get(&class.name) {
            Some(&index) => {
                let previous = std::mem::replace(&mut self.classes[index as usize], class);
                let handle = ClassHandle {
                    pool: self.kind,
                    index,
                };
                (handle, Some(previous))
            }
            None => {
                let index = self.classes.len() as u32;
                self.by_name.insert(class.name.clone(), index);
                self.classes.push(class);
                let handle = ClassHandle {
                    pool: self.kind,
                    index,
                };
                (handle, None)
            }
        }
    }

    pub fn lookup(&self, name: &BinaryName) -> Option<ClassHandle> {
        self.by_name.get(name).map(|&index| ClassHandle {
            pool: self.kind,
            index,
        })
    }

    pub fn get(&self, handle: ClassHandle) -> &Class {
        debug_assert_eq!(handle.pool, self.kind, "Handle points into the other pool");
        &self.classes[handle.index as usize]
    }

    pub fn get_mut(&mut self, handle: ClassHandle) -> &mut Class {
        debug_assert_eq!(handle.pool, self.kind, "Handle points into the other pool");
        &mut self.classes[handle.index as usize]
    }

    pub fn get_by_name(&self, name: &BinaryName) -> Option<&Class> {
        self.lookup(name).map(|handle| self.get(handle))
    }

    /// Classes in insertion order
    pub fn classes(&self) -> impl Iterator<Item = &Class> {
        self.classes.iter()
    }

    /// Handles in insertion order
    pub fn handles(&self) -> impl Iterator<Item = ClassHandle> + '_ {
        let kind = self.kind;
        (0..self.classes.len() as u32).map(move |index| ClassHandle { pool: kind, index })
    }
}
