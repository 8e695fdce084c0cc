use crate::config::{Captures, WildcardManager};

/// One element of a compiled name pattern
///
/// Wildcard parts carry the capture index the enclosing rule's
/// [`WildcardManager`] assigned them at compile time.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Part {
    Literal(String),
    /// `?`: exactly one character, not a package separator
    Question { index: usize },
    /// `*`: any run of characters within one package segment
    Star { index: usize },
    /// `**`: any run of characters, crossing package separators
    DoubleStar { index: usize },
    /// `<n>`: the text captured by wildcard `n` earlier in the rule
    BackReference(usize),
}

/// A compiled wildcard matcher for class, member, and attribute names
///
/// Patterns are compiled once per rule and reused across matching passes;
/// captured substrings go into the per-match [`Captures`] rather than the
/// pattern itself.
#[derive(Clone, Debug)]
pub struct NamePattern {
    parts: Vec<Part>,
    source: String,
}

impl NamePattern {
    /// Compile a pattern, registering each wildcard with the rule's manager
    ///
    /// `<n>` spans that are all digits become back-references and must name a
    /// previously-assigned capture; anything else in angle brackets (like
    /// `<init>`) is literal text.
    pub fn compile(pattern: &str, manager: &mut WildcardManager) -> Result<NamePattern, String> {
        // A standalone `*` means any name in any package, same as `**`
        if pattern == "*" {
            return Ok(NamePattern {
                parts: vec![Part::DoubleStar {
                    index: manager.reserve(),
                }],
                source: pattern.to_string(),
            });
        }

        let mut parts: Vec<Part> = vec![];
        let mut literal = String::new();
        let mut chars = pattern.chars().peekable();

        let flush = |literal: &mut String, parts: &mut Vec<Part>| {
            if !literal.is_empty() {
                parts.push(Part::Literal(std::mem::take(literal)));
            }
        };

        while let Some(c) = chars.next() {
            match c {
                '?' => {
                    flush(&mut literal, &mut parts);
                    parts.push(Part::Question {
                        index: manager.reserve(),
                    });
                }
                '*' => {
                    flush(&mut literal, &mut parts);
                    if chars.next_if_eq(&'*').is_some() {
                        parts.push(Part::DoubleStar {
                            index: manager.reserve(),
                        });
                    } else {
                        parts.push(Part::Star {
                            index: manager.reserve(),
                        });
                    }
                }
                '<' => {
                    let mut digits = String::new();
                    while let Some(d) = chars.next_if(|d| d.is_ascii_digit()) {
                        digits.push(d);
                    }
                    if !digits.is_empty() && chars.next_if_eq(&'>').is_some() {
                        let index: usize = digits
                            .parse()
                            .map_err(|_| format!("Invalid back-reference <{}>", digits))?;
                        manager.check_back_reference(index)?;
                        flush(&mut literal, &mut parts);
                        parts.push(Part::BackReference(index));
                    } else {
                        // `<init>` and friends: not a back-reference
                        literal.push('<');
                        literal.push_str(&digits);
                    }
                }
                c => literal.push(c),
            }
        }
        flush(&mut literal, &mut parts);

        Ok(NamePattern {
            parts,
            source: pattern.to_string(),
        })
    }

    /// The pattern as the user wrote it
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn has_wildcards(&self) -> bool {
        self.parts
            .iter()
            .any(|part| !matches!(part, Part::Literal(_)))
    }

    /// The literal name, when the pattern contains no wildcards at all
    pub fn exact_name(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [] => Some(""),
            [Part::Literal(text)] => Some(text),
            _ => None,
        }
    }

    /// Test the pattern, recording wildcard captures on success
    ///
    /// Captures written during a failed attempt are rolled back by the
    /// backtracking itself (later attempts overwrite), so the caller only
    /// needs fresh slots per entity, not per call.
    pub fn matches(&self, name: &str, captures: &mut Captures) -> bool {
        Self::match_parts(&self.parts, name, captures)
    }

    fn match_parts(parts: &[Part], name: &str, captures: &mut Captures) -> bool {
        let (part, rest) = match parts.split_first() {
            Some(split) => split,
            None => return name.is_empty(),
        };
        match part {
            Part::Literal(text) => match name.strip_prefix(text.as_str()) {
                Some(remaining) => Self::match_parts(rest, remaining, captures),
                None => false,
            },
            Part::Question { index } => {
                let mut chars = name.chars();
                match chars.next() {
                    Some(c) if c != '/' => {
                        captures.set(*index, &name[..c.len_utf8()]);
                        Self::match_parts(rest, chars.as_str(), captures)
                    }
                    _ => false,
                }
            }
            Part::Star { index } => {
                // Greedy: longest run that stays within the segment
                let limit = name.find('/').unwrap_or(name.len());
                for split in (0..=limit).rev() {
                    if !name.is_char_boundary(split) {
                        continue;
                    }
                    captures.set(*index, &name[..split]);
                    if Self::match_parts(rest, &name[split..], captures) {
                        return true;
                    }
                }
                false
            }
            Part::DoubleStar { index } => {
                for split in (0..=name.len()).rev() {
                    if !name.is_char_boundary(split) {
                        continue;
                    }
                    captures.set(*index, &name[..split]);
                    if Self::match_parts(rest, &name[split..], captures) {
                        return true;
                    }
                }
                false
            }
            Part::BackReference(index) => match captures.get(*index) {
                Some(text) => {
                    let text = text.to_string();
                    match name.strip_prefix(text.as_str()) {
                        Some(remaining) => Self::match_parts(rest, remaining, captures),
                        None => false,
                    }
                }
                None => false,
            },
        }
    }
}

/// A comma-separated list filter over names, with `!` negation
///
/// The first entry that matches decides the outcome: a plain entry accepts,
/// a negated entry rejects. When nothing matches, the result is positive
/// only if the last entry was negated (so `!com.sun.**` means "everything
/// except com.sun").
#[derive(Clone, Debug)]
pub struct NameFilter {
    entries: Vec<(bool, NamePattern)>,
}

impl NameFilter {
    pub fn compile(list: &[String]) -> Result<NameFilter, String> {
        let mut entries = vec![];
        for entry in list {
            let (negated, pattern) = match entry.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, entry.as_str()),
            };
            // Filters don't participate in rule captures
            let mut manager = WildcardManager::new();
            entries.push((negated, NamePattern::compile(pattern, &mut manager)?));
        }
        Ok(NameFilter { entries })
    }

    pub fn matches(&self, name: &str) -> bool {
        for (negated, pattern) in &self.entries {
            let mut captures = Self::scratch_captures(pattern);
            if pattern.matches(name, &mut captures) {
                return !negated;
            }
        }
        matches!(self.entries.last(), Some((true, _)))
    }

    fn scratch_captures(pattern: &NamePattern) -> Captures {
        let mut manager = WildcardManager::new();
        for part in &pattern.parts {
            if !matches!(part, Part::Literal(_) | Part::BackReference(_)) {
                manager.reserve();
            }
        }
        manager.captures()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn compile(pattern: &str) -> (NamePattern, WildcardManager) {
        let mut manager = WildcardManager::new();
        let compiled = NamePattern::compile(pattern, &mut manager).unwrap();
        (compiled, manager)
    }

    fn matches(pattern: &str, name: &str) -> bool {
        let (compiled, manager) = compile(pattern);
        compiled.matches(name, &mut manager.captures())
    }

    #[test]
    fn literal_patterns() {
        assert!(matches("com/example/Foo", "com/example/Foo"));
        assert!(!matches("com/example/Foo", "com/example/Bar"));
        assert!(!matches("com/example/Foo", "com/example/FooBar"));
    }

    #[test]
    fn question_mark_is_one_character() {
        assert!(matches("Fo?", "Foo"));
        assert!(!matches("Fo?", "Fo"));
        assert!(!matches("Fo?", "Fooo"));
        assert!(!matches("a?b", "a/b"));
    }

    #[test]
    fn star_stays_in_segment() {
        assert!(matches("com/example/*", "com/example/Foo"));
        assert!(!matches("com/example/*", "com/example/sub/Foo"));
        assert!(matches("com/*/Foo", "com/example/Foo"));
    }

    #[test]
    fn standalone_star_matches_any_package() {
        assert!(matches("*", "Foo"));
        assert!(matches("*", "com/example/Foo"));
        // Only the standalone form is special; embedded stars still stop
        // at the package separator
        assert!(!matches("com/*", "com/sub/Foo"));
    }

    #[test]
    fn double_star_crosses_segments() {
        assert!(matches("com/example/**", "com/example/Foo"));
        assert!(matches("com/example/**", "com/example/sub/Foo"));
        assert!(!matches("com/example/**", "org/example/Foo"));
    }

    #[test]
    fn captures_record_matched_text() {
        let (compiled, manager) = compile("com/*/Bean*");
        let mut captures = manager.captures();
        assert!(compiled.matches("com/example/BeanFactory", &mut captures));
        assert_eq!(captures.get(1), Some("example"));
        assert_eq!(captures.get(2), Some("Factory"));
    }

    #[test]
    fn back_reference_within_a_pattern() {
        let mut manager = WildcardManager::new();
        let compiled = NamePattern::compile("*/impl/<1>Impl", &mut manager).unwrap();

        let mut captures = manager.captures();
        assert!(compiled.matches("service/impl/serviceImpl", &mut captures));

        let mut captures = manager.captures();
        assert!(!compiled.matches("service/impl/otherImpl", &mut captures));
    }

    #[test]
    fn back_reference_across_patterns_shares_captures() {
        let mut manager = WildcardManager::new();
        let class_pattern = NamePattern::compile("com/*", &mut manager).unwrap();
        let member_pattern = NamePattern::compile("get<1>", &mut manager).unwrap();

        let mut captures = manager.captures();
        assert!(class_pattern.matches("com/Name", &mut captures));
        assert!(member_pattern.matches("getName", &mut captures));
        assert!(!member_pattern.matches("getOther", &mut captures));
    }

    #[test]
    fn forward_back_reference_is_rejected() {
        let mut manager = WildcardManager::new();
        assert!(NamePattern::compile("<1>Foo", &mut manager).is_err());
    }

    #[test]
    fn init_is_not_a_back_reference() {
        let mut manager = WildcardManager::new();
        let compiled = NamePattern::compile("<init>", &mut manager).unwrap();
        assert!(!compiled.has_wildcards());
        assert!(compiled.matches("<init>", &mut manager.captures()));
    }

    #[test]
    fn exact_name_only_for_wildcard_free_patterns() {
        let (compiled, _) = compile("com/example/Foo");
        assert_eq!(compiled.exact_name(), Some("com/example/Foo"));
        let (compiled, _) = compile("com/example/*");
        assert_eq!(compiled.exact_name(), None);
    }

    #[test]
    fn name_filter_negation() {
        let filter = NameFilter::compile(&[
            String::from("!com/sun/**"),
            String::from("com/**"),
        ])
        .unwrap();
        assert!(filter.matches("com/example/Foo"));
        assert!(!filter.matches("com/sun/Secret"));
        assert!(!filter.matches("org/example/Foo"));

        let all_but = NameFilter::compile(&[String::from("!com/sun/**")]).unwrap();
        assert!(all_but.matches("org/example/Foo"));
        assert!(!all_but.matches("com/sun/Secret"));
    }
}
