//! Fully Qualified Attribute Names.
//!
//! An FQAN names a position in a VO's group hierarchy, optionally qualified
//! by a role: `/vo/group/subgroup/Role=role`. The first group is always the
//! VO itself.
//!
//! Containment follows the hierarchy: `/vo/a` contains `/vo/a/b/Role=admin`
//! because it is a path prefix and carries no role of its own. A role only
//! contains FQANs carrying the same role.
//!
//! Group and role names may contain `/`, `=` or `\` when escaped with a
//! backslash. The legacy suffixes `/Role=NULL` and `/Capability=NULL` are
//! accepted and mean "no role".

use crate::error::FqanError;
use nonempty::NonEmpty;
use std::{fmt, str::FromStr};

const ROLE: &str = "Role";
const CAPABILITY: &str = "Capability";
const NULL: &str = "NULL";

/// A parsed FQAN: a non-empty group path plus an optional role.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fqan {
    groups: NonEmpty<String>,
    role: Option<String>,
}

impl Fqan {
    /// Creates an FQAN for the root group of a VO.
    ///
    /// Fails if `vo` is empty or contains whitespace or control characters.
    pub fn new(vo: impl Into<String>) -> Result<Self, FqanError> {
        let fqan = Self {
            groups: NonEmpty::new(vo.into()),
            role: None,
        };
        check_segment(&fqan, 0, &fqan.groups.head)?;
        Ok(fqan)
    }

    /// Extends the group path by one segment, under the same rules as
    /// [`Fqan::new`].
    pub fn with_group(mut self, group: impl Into<String>) -> Result<Self, FqanError> {
        let position = self.groups.len();
        self.groups.push(group.into());
        check_segment(&self, position, self.groups.last())?;
        Ok(self)
    }

    /// Sets the role qualifier. `NULL` clears it, as it does when parsing.
    pub fn with_role(mut self, role: impl Into<String>) -> Result<Self, FqanError> {
        let role = role.into();
        if role.is_empty() {
            return Err(FqanError::EmptyQualifier(format!("{self}/{ROLE}=")));
        }
        if role.chars().any(disallowed) {
            return Err(FqanError::DisallowedCharacter(self.to_string()));
        }
        self.role = (role != NULL).then_some(role);
        Ok(self)
    }

    /// Parse an FQAN from its textual form.
    pub fn parse(input: &str) -> Result<Self, FqanError> {
        let body = input
            .strip_prefix('/')
            .ok_or_else(|| FqanError::MissingLeadingSlash(input.to_string()))?;

        let mut groups: Vec<String> = Vec::new();
        let mut role: Option<String> = None;
        let mut saw_capability = false;

        for (position, segment) in split_segments(input, body)?.into_iter().enumerate() {
            let Segment { text, separator } = segment;

            let Some(at) = separator else {
                if text.is_empty() {
                    return Err(FqanError::EmptySegment {
                        fqan: input.to_string(),
                        position,
                    });
                }
                if role.is_some() || saw_capability {
                    return Err(FqanError::MisplacedRole(input.to_string()));
                }
                groups.push(text);
                continue;
            };

            let (key, value) = (&text[..at], &text[at + 1..]);
            if value.is_empty() {
                return Err(FqanError::EmptyQualifier(input.to_string()));
            }

            match key {
                ROLE => {
                    if role.is_some() || saw_capability {
                        return Err(FqanError::MisplacedRole(input.to_string()));
                    }
                    role = Some(value.to_string());
                }
                CAPABILITY => {
                    if value != NULL {
                        return Err(FqanError::UnsupportedCapability(input.to_string()));
                    }
                    if saw_capability {
                        return Err(FqanError::MisplacedRole(input.to_string()));
                    }
                    saw_capability = true;
                }
                _ => {
                    return Err(FqanError::UnescapedSeparator {
                        fqan: input.to_string(),
                        segment: text.clone(),
                    });
                }
            }
        }

        let groups =
            NonEmpty::from_vec(groups).ok_or_else(|| FqanError::NoGroup(input.to_string()))?;
        let role = role.filter(|role| role != NULL);

        Ok(Self { groups, role })
    }

    /// The VO this FQAN belongs to (the first group).
    pub fn vo(&self) -> &str {
        &self.groups.head
    }

    /// Group path segments, root first.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }

    /// Number of groups in the path.
    pub fn depth(&self) -> usize {
        self.groups.len()
    }

    /// The role qualifier, if any.
    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    /// The group path without the role, e.g. `/vo/group`.
    pub fn group(&self) -> String {
        let mut out = String::new();
        for group in self.groups.iter() {
            out.push('/');
            escape_into(&mut out, group);
        }
        out
    }

    /// Returns `true` if `other` lies at or below this FQAN in the hierarchy
    /// and this FQAN is either role-less or carries the same role.
    pub fn contains(&self, other: &Fqan) -> bool {
        if self.groups.len() > other.groups.len() {
            return false;
        }
        let prefix = self
            .groups
            .iter()
            .zip(other.groups.iter())
            .all(|(ours, theirs)| ours == theirs);

        prefix
            && match &self.role {
                None => true,
                Some(role) => other.role.as_ref() == Some(role),
            }
    }

    /// Inverse of [`Fqan::contains`].
    pub fn is_contained_in(&self, other: &Fqan) -> bool {
        other.contains(self)
    }

    /// Renders the pre-normalisation form with explicit `Role` and
    /// `Capability` qualifiers, e.g. `/vo/group/Role=NULL/Capability=NULL`.
    pub fn to_legacy_string(&self) -> String {
        let mut out = self.group();
        out.push_str("/Role=");
        match &self.role {
            Some(role) => escape_into(&mut out, role),
            None => out.push_str(NULL),
        }
        out.push_str("/Capability=NULL");
        out
    }
}

impl fmt::Display for Fqan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.group())?;
        if let Some(role) = &self.role {
            let mut escaped = String::with_capacity(role.len());
            escape_into(&mut escaped, role);
            write!(f, "/{ROLE}={escaped}")?;
        }
        Ok(())
    }
}

impl FromStr for Fqan {
    type Err = FqanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Fqan::parse(s)
    }
}

/// One `/`-delimited segment with escapes resolved.
struct Segment {
    text: String,
    /// Byte offset in `text` of the single unescaped `=`, if any.
    separator: Option<usize>,
}

fn split_segments(input: &str, body: &str) -> Result<Vec<Segment>, FqanError> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut separator = None;
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('/' | '=' | '\\')) => text.push(escaped),
                _ => return Err(FqanError::InvalidEscape(input.to_string())),
            },
            '/' => {
                segments.push(Segment {
                    text: std::mem::take(&mut text),
                    separator: separator.take(),
                });
            }
            '=' => {
                if separator.is_some() {
                    return Err(FqanError::UnescapedSeparator {
                        fqan: input.to_string(),
                        segment: text,
                    });
                }
                separator = Some(text.len());
                text.push('=');
            }
            c if disallowed(c) => {
                return Err(FqanError::DisallowedCharacter(input.to_string()));
            }
            c => text.push(c),
        }
    }
    segments.push(Segment { text, separator });

    Ok(segments)
}

fn check_segment(fqan: &Fqan, position: usize, text: &str) -> Result<(), FqanError> {
    if text.is_empty() {
        return Err(FqanError::EmptySegment {
            fqan: fqan.to_string(),
            position,
        });
    }
    if text.chars().any(disallowed) {
        return Err(FqanError::DisallowedCharacter(fqan.to_string()));
    }
    Ok(())
}

fn disallowed(c: char) -> bool {
    c.is_control() || c.is_whitespace()
}

fn escape_into(out: &mut String, raw: &str) {
    for c in raw.chars() {
        if matches!(c, '/' | '=' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use testresult::TestResult;

    #[test]
    fn it_parses_groups_and_role() -> TestResult {
        let fqan = Fqan::parse("/atlas/production/Role=pilot")?;
        assert_eq!(fqan.vo(), "atlas");
        assert_eq!(fqan.groups().collect::<Vec<_>>(), vec!["atlas", "production"]);
        assert_eq!(fqan.role(), Some("pilot"));
        assert_eq!(fqan.group(), "/atlas/production");
        assert_eq!(fqan.to_string(), "/atlas/production/Role=pilot");
        Ok(())
    }

    #[test]
    fn it_normalises_legacy_null_qualifiers() -> TestResult {
        let plain = Fqan::parse("/cms/uscms")?;
        assert_eq!(Fqan::parse("/cms/uscms/Role=NULL/Capability=NULL")?, plain);
        assert_eq!(Fqan::parse("/cms/uscms/Role=NULL")?, plain);
        assert_eq!(Fqan::parse("/cms/uscms/Capability=NULL")?, plain);
        assert_eq!(
            Fqan::parse("/cms/Role=lcgadmin/Capability=NULL")?,
            Fqan::new("cms")?.with_role("lcgadmin")?
        );
        Ok(())
    }

    #[test]
    fn it_renders_the_legacy_form() -> TestResult {
        assert_eq!(
            Fqan::parse("/cms/uscms")?.to_legacy_string(),
            "/cms/uscms/Role=NULL/Capability=NULL"
        );
        assert_eq!(
            Fqan::parse("/cms/Role=pilot")?.to_legacy_string(),
            "/cms/Role=pilot/Capability=NULL"
        );
        Ok(())
    }

    #[test]
    fn it_rejects_malformed_names() {
        let cases = [
            "atlas",
            "/",
            "/atlas//prod",
            "/atlas/",
            "/atlas/Role=prod/sub",
            "/atlas/Role=",
            "/atlas/Role=a/Role=b",
            "/atlas/Capability=write",
            "/atlas/grp=x",
            "/atlas/Role=a=b",
            "/Role=prod",
            "/atlas/bad\\q",
            "/atlas/trailing\\",
            "/atlas/with space",
        ];
        for case in cases {
            assert!(Fqan::parse(case).is_err(), "{case} should be rejected");
        }
    }

    #[test]
    fn it_reports_specific_faults() {
        assert_eq!(
            Fqan::parse("/atlas/Role=prod/sub"),
            Err(FqanError::MisplacedRole("/atlas/Role=prod/sub".into()))
        );
        assert_eq!(
            Fqan::parse("/atlas//prod"),
            Err(FqanError::EmptySegment {
                fqan: "/atlas//prod".into(),
                position: 1
            })
        );
        assert_eq!(
            Fqan::parse("/Role=prod"),
            Err(FqanError::NoGroup("/Role=prod".into()))
        );
    }

    #[test]
    fn it_accepts_escaped_separators() -> TestResult {
        let fqan = Fqan::parse(r"/vo/a\/b/c\=d/Role=x\/y")?;
        assert_eq!(fqan.groups().collect::<Vec<_>>(), vec!["vo", "a/b", "c=d"]);
        assert_eq!(fqan.role(), Some("x/y"));
        assert_eq!(fqan.to_string(), r"/vo/a\/b/c\=d/Role=x\/y");
        Ok(())
    }

    #[test]
    fn it_builds_only_names_that_parse_back() -> TestResult {
        let built = Fqan::new("vo")?.with_group("a/b")?.with_role("x=y")?;
        assert_eq!(built.to_string(), r"/vo/a\/b/Role=x\=y");
        assert_eq!(Fqan::parse(&built.to_string())?, built);

        assert_eq!(
            Fqan::new(""),
            Err(FqanError::EmptySegment {
                fqan: "/".into(),
                position: 0
            })
        );
        assert_eq!(
            Fqan::new("vo")?.with_group(""),
            Err(FqanError::EmptySegment {
                fqan: "/vo/".into(),
                position: 1
            })
        );
        assert_eq!(
            Fqan::new("vo")?.with_role(""),
            Err(FqanError::EmptyQualifier("/vo/Role=".into()))
        );
        assert!(matches!(
            Fqan::new("vo")?.with_group("with space"),
            Err(FqanError::DisallowedCharacter(_))
        ));
        assert!(matches!(
            Fqan::new("vo")?.with_role("tab\t"),
            Err(FqanError::DisallowedCharacter(_))
        ));
        assert_eq!(Fqan::new("vo")?.with_role("NULL")?, Fqan::parse("/vo")?);
        Ok(())
    }

    #[test]
    fn a_group_contains_its_descendants() -> TestResult {
        let parent = Fqan::parse("/vo/groupA")?;
        let child = Fqan::parse("/vo/groupA/groupB/Role=admin")?;
        assert!(parent.contains(&child));
        assert!(!child.contains(&parent));
        assert!(child.is_contained_in(&parent));
        Ok(())
    }

    #[test]
    fn a_role_only_contains_the_same_role() -> TestResult {
        let admin = Fqan::parse("/vo/Role=admin")?;
        assert!(admin.contains(&Fqan::parse("/vo/sub/Role=admin")?));
        assert!(!admin.contains(&Fqan::parse("/vo/sub/Role=user")?));
        assert!(!admin.contains(&Fqan::parse("/vo/sub")?));
        Ok(())
    }

    #[test]
    fn siblings_do_not_contain_each_other() -> TestResult {
        let a = Fqan::parse("/vo/a")?;
        let b = Fqan::parse("/vo/b")?;
        assert!(!a.contains(&b));
        assert!(!b.contains(&a));
        assert!(!Fqan::parse("/vo/ab")?.contains(&Fqan::parse("/vo/a")?));
        Ok(())
    }

    fn arb_fqan() -> impl Strategy<Value = Fqan> {
        (
            prop::collection::vec("[ab]", 0..3),
            prop::option::of("[xy]"),
        )
            .prop_map(|(groups, role)| {
                let fqan = groups.into_iter().fold(Fqan::new("vo").unwrap(), |fqan, group| {
                    fqan.with_group(group).unwrap()
                });
                match role {
                    Some(role) => fqan.with_role(role).unwrap(),
                    None => fqan,
                }
            })
    }

    proptest! {
        #[test]
        fn containment_is_reflexive(a in arb_fqan()) {
            prop_assert!(a.contains(&a));
        }

        #[test]
        fn containment_is_antisymmetric(a in arb_fqan(), b in arb_fqan()) {
            if a.contains(&b) && b.contains(&a) {
                prop_assert_eq!(a, b);
            }
        }

        #[test]
        fn containment_is_transitive(a in arb_fqan(), b in arb_fqan(), c in arb_fqan()) {
            if a.contains(&b) && b.contains(&c) {
                prop_assert!(a.contains(&c));
            }
        }

        #[test]
        fn display_reparses_to_the_same_fqan(a in arb_fqan()) {
            prop_assert_eq!(Fqan::parse(&a.to_string()).unwrap(), a);
        }
    }
}
