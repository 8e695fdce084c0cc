use crate::jvm::{BinaryName, Class, ClassHandle, ClassPool, PoolKind};
use std::collections::HashMap;

/// A resource file carried alongside the classes
///
/// Only the name matters to this front end; contents are handled by the
/// archive I/O layer upstream.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ResourceFile {
    pub name: String,
}

/// The unit of work passed between phases
///
/// Owns the program and library class pools, the resource-file pool, and the
/// name-remapping table that obfuscation fills in later. Created once per
/// run; the linker mutates the pools in place, everything else reads them.
pub struct AppView {
    pub program_class_pool: ClassPool,
    pub library_class_pool: ClassPool,
    pub resource_files: Vec<ResourceFile>,

    /// Obfuscation's old-name to new-name table (pass-through here)
    pub name_map: HashMap<BinaryName, BinaryName>,
}

impl AppView {
    pub fn new() -> AppView {
        AppView {
            program_class_pool: ClassPool::new(PoolKind::Program),
            library_class_pool: ClassPool::new(PoolKind::Library),
            resource_files: vec![],
            name_map: HashMap::new(),
        }
    }

    /// Resolve a class name, program pool first
    ///
    /// A name present in both pools resolves to the program class: the
    /// program definition shadows the library one.
    pub fn lookup(&self, name: &BinaryName) -> Option<ClassHandle> {
        self.program_class_pool
            .lookup(name)
            .or_else(|| self.library_class_pool.lookup(name))
    }

    pub fn get(&self, handle: ClassHandle) -> &Class {
        match handle.pool {
            PoolKind::Program => self.program_class_pool.get(handle),
            PoolKind::Library => self.library_class_pool.get(handle),
        }
    }

    pub fn get_mut(&mut self, handle: ClassHandle) -> &mut Class {
        match handle.pool {
            PoolKind::Program => self.program_class_pool.get_mut(handle),
            PoolKind::Library => self.library_class_pool.get_mut(handle),
        }
    }

    /// Handles of every class, program pool first, insertion order within
    /// each pool
    pub fn all_handles(&self) -> impl Iterator<Item = ClassHandle> + '_ {
        self.program_class_pool
            .handles()
            .chain(self.library_class_pool.handles())
    }
}

impl Default for AppView {
    fn default() -> AppView {
        AppView::new()
    }
}
