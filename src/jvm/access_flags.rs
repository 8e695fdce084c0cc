use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Access flags on classes
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.1-200-E.1
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

bitflags! {
    /// Access flags on methods
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.6-200-A.1
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    /// Access flags on fields
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.5-200-A.1
    pub struct FieldAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

/// A required/forbidden pair of access-flag bit sets, as written in a
/// specification (`public !final ...`)
///
/// An entity's flags satisfy the predicate when every `required` bit is set
/// and no `forbidden` bit is set.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AccessFlagPredicate {
    pub required: u16,
    pub forbidden: u16,
}

impl AccessFlagPredicate {
    /// Predicate that accepts any combination of flags
    pub const ANY: AccessFlagPredicate = AccessFlagPredicate {
        required: 0,
        forbidden: 0,
    };

    /// Add a flag bit, required (`negated == false`) or forbidden
    pub fn set(&mut self, bits: u16, negated: bool) {
        if negated {
            self.forbidden |= bits;
        } else {
            self.required |= bits;
        }
    }

    /// Test the predicate against raw access-flag bits
    pub fn matches(&self, flags: u16) -> bool {
        flags & self.required == self.required && flags & self.forbidden == 0
    }

    pub fn is_trivial(&self) -> bool {
        self.required == 0 && self.forbidden == 0
    }
}

impl Default for AccessFlagPredicate {
    fn default() -> AccessFlagPredicate {
        AccessFlagPredicate::ANY
    }
}

impl fmt::Debug for AccessFlagPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "+{:#06x} -{:#06x}",
            self.required, self.forbidden
        ))
    }
}

/// Access-flag keyword as written in a configuration, mapped to the bit it
/// sets on the entity kinds it is valid for
///
/// `class_bits`/`field_bits`/`method_bits` are `None` when the keyword is not
/// applicable to that entity kind.
pub struct AccessFlagKeyword {
    pub keyword: &'static str,
    pub class_bits: Option<u16>,
    pub field_bits: Option<u16>,
    pub method_bits: Option<u16>,
}

pub const ACCESS_FLAG_KEYWORDS: &[AccessFlagKeyword] = &[
    AccessFlagKeyword {
        keyword: "public",
        class_bits: Some(ClassAccessFlags::PUBLIC.bits()),
        field_bits: Some(FieldAccessFlags::PUBLIC.bits()),
        method_bits: Some(MethodAccessFlags::PUBLIC.bits()),
    },
    AccessFlagKeyword {
        keyword: "private",
        class_bits: None,
        field_bits: Some(FieldAccessFlags::PRIVATE.bits()),
        method_bits: Some(MethodAccessFlags::PRIVATE.bits()),
    },
    AccessFlagKeyword {
        keyword: "protected",
        class_bits: None,
        field_bits: Some(FieldAccessFlags::PROTECTED.bits()),
        method_bits: Some(MethodAccessFlags::PROTECTED.bits()),
    },
    AccessFlagKeyword {
        keyword: "static",
        class_bits: None,
        field_bits: Some(FieldAccessFlags::STATIC.bits()),
        method_bits: Some(MethodAccessFlags::STATIC.bits()),
    },
    AccessFlagKeyword {
        keyword: "final",
        class_bits: Some(ClassAccessFlags::FINAL.bits()),
        field_bits: Some(FieldAccessFlags::FINAL.bits()),
        method_bits: Some(MethodAccessFlags::FINAL.bits()),
    },
    AccessFlagKeyword {
        keyword: "abstract",
        class_bits: Some(ClassAccessFlags::ABSTRACT.bits()),
        field_bits: None,
        method_bits: Some(MethodAccessFlags::ABSTRACT.bits()),
    },
    AccessFlagKeyword {
        keyword: "interface",
        class_bits: Some(ClassAccessFlags::INTERFACE.bits()),
        field_bits: None,
        method_bits: None,
    },
    AccessFlagKeyword {
        keyword: "enum",
        class_bits: Some(ClassAccessFlags::ENUM.bits()),
        field_bits: None,
        method_bits: None,
    },
    AccessFlagKeyword {
        keyword: "synchronized",
        class_bits: None,
        field_bits: None,
        method_bits: Some(MethodAccessFlags::SYNCHRONIZED.bits()),
    },
    AccessFlagKeyword {
        keyword: "native",
        class_bits: None,
        field_bits: None,
        method_bits: Some(MethodAccessFlags::NATIVE.bits()),
    },
    AccessFlagKeyword {
        keyword: "strictfp",
        class_bits: None,
        field_bits: None,
        method_bits: Some(MethodAccessFlags::STRICT.bits()),
    },
    AccessFlagKeyword {
        keyword: "volatile",
        class_bits: None,
        field_bits: Some(FieldAccessFlags::VOLATILE.bits()),
        method_bits: None,
    },
    AccessFlagKeyword {
        keyword: "transient",
        class_bits: None,
        field_bits: Some(FieldAccessFlags::TRANSIENT.bits()),
        method_bits: None,
    },
    AccessFlagKeyword {
        keyword: "bridge",
        class_bits: None,
        field_bits: None,
        method_bits: Some(MethodAccessFlags::BRIDGE.bits()),
    },
    AccessFlagKeyword {
        keyword: "varargs",
        class_bits: None,
        field_bits: None,
        method_bits: Some(MethodAccessFlags::VARARGS.bits()),
    },
    AccessFlagKeyword {
        keyword: "synthetic",
        class_bits: Some(ClassAccessFlags::SYNTHETIC.bits()),
        field_bits: Some(FieldAccessFlags::SYNTHETIC.bits()),
        method_bits: Some(MethodAccessFlags::SYNTHETIC.bits()),
    },
];

/// Find the keyword record for a configuration word, if it is one
pub fn lookup_access_flag_keyword(word: &str) -> Option<&'static AccessFlagKeyword> {
    ACCESS_FLAG_KEYWORDS.iter().find(|k| k.keyword == word)
}
