//! Declaration kinds and exclusivity policy
//!
//! A kind is the typed stance a user takes on a target. Which kinds may
//! coexist for one user on one target is declared here as data, consulted
//! once by the ledger, rather than branch logic per call site.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A typed stance on a target
///
/// Reports carry a free-form classification; every classification is a
/// distinct kind for uniqueness purposes but they all feed one counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Like,
    Dislike,
    Happy,
    Follow,
    Block,
    Report(String),
}

impl Default for DeclarationKind {
    fn default() -> Self {
        Self::Like
    }
}

impl DeclarationKind {
    /// The denormalized counter field this kind maintains on its target
    pub fn counter_field(&self) -> &'static str {
        match self {
            Self::Like => "likeCount",
            Self::Dislike => "dislikeCount",
            Self::Happy => "happyCount",
            Self::Follow => "followerCount",
            Self::Block => "blockCount",
            Self::Report(_) => "reportedCount",
        }
    }

    /// Key used in the target's free-form `declareCounts` map
    pub fn declare_key(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
            Self::Happy => "happy",
            Self::Follow => "follow",
            Self::Block => "block",
            Self::Report(_) => "report",
        }
    }

    /// Whether this kind feeds the rating weight recompute
    pub fn is_weight_sensitive(&self) -> bool {
        matches!(self, Self::Like | Self::Dislike)
    }

    pub fn is_report(&self) -> bool {
        matches!(self, Self::Report(_))
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Like => write!(f, "like"),
            Self::Dislike => write!(f, "dislike"),
            Self::Happy => write!(f, "happy"),
            Self::Follow => write!(f, "follow"),
            Self::Block => write!(f, "block"),
            Self::Report(class) => write!(f, "report:{}", class),
        }
    }
}

impl FromStr for DeclarationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(Self::Like),
            "dislike" => Ok(Self::Dislike),
            "happy" => Ok(Self::Happy),
            "follow" => Ok(Self::Follow),
            "block" => Ok(Self::Block),
            other => match other.strip_prefix("report:") {
                Some(class) if !class.is_empty() => Ok(Self::Report(class.to_string())),
                _ => Err(format!("unknown declaration kind: {}", other)),
            },
        }
    }
}

impl Serialize for DeclarationKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DeclarationKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A set of kinds of which a user may hold at most one active declaration
/// per target, minus the compatible kinds exempt from that rule
#[derive(Debug, Clone)]
pub struct KindGroup {
    /// Group name, stored on declaration rows for the storage-level
    /// uniqueness constraint
    pub name: String,
    /// All kinds belonging to the group
    pub members: Vec<DeclarationKind>,
    /// Members exempt from exclusivity (they only forbid their own duplicate)
    pub compatible: Vec<DeclarationKind>,
}

impl KindGroup {
    pub fn new(name: &str, members: Vec<DeclarationKind>, compatible: Vec<DeclarationKind>) -> Self {
        Self {
            name: name.to_string(),
            members,
            compatible,
        }
    }

    /// Kinds that exclude each other within this group
    pub fn exclusive_members(&self) -> impl Iterator<Item = &DeclarationKind> {
        self.members.iter().filter(|k| !self.compatible.contains(k))
    }
}

/// Declared exclusivity groups, optionally scoped to one target family
#[derive(Debug, Clone, Default)]
pub struct ExclusivityPolicy {
    /// (family scope, group); `None` scope applies to every family
    groups: Vec<(Option<String>, KindGroup)>,
}

impl ExclusivityPolicy {
    /// The standard policy: like and dislike exclude each other on every
    /// target family, happy coexists with either but forbids its own
    /// duplicate. Follow, block and report kinds are ungrouped and only
    /// forbid their own duplicates.
    pub fn standard() -> Self {
        Self::default().with_group(
            None,
            KindGroup::new(
                "attitude",
                vec![
                    DeclarationKind::Like,
                    DeclarationKind::Dislike,
                    DeclarationKind::Happy,
                ],
                vec![DeclarationKind::Happy],
            ),
        )
    }

    /// Register a group, optionally scoped to one target family
    pub fn with_group(mut self, family: Option<&str>, group: KindGroup) -> Self {
        self.groups.push((family.map(|f| f.to_string()), group));
        self
    }

    /// The group a kind belongs to as an *exclusive* member, for the given
    /// target family. Family-scoped groups take precedence over global ones.
    pub fn group_for(&self, target_type: &str, kind: &DeclarationKind) -> Option<&KindGroup> {
        let scoped = self.groups.iter().find(|(family, group)| {
            family.as_deref() == Some(target_type)
                && group.exclusive_members().any(|k| k == kind)
        });
        scoped
            .or_else(|| {
                self.groups.iter().find(|(family, group)| {
                    family.is_none() && group.exclusive_members().any(|k| k == kind)
                })
            })
            .map(|(_, group)| group)
    }

    /// Whether a kind is compatible (exempt from its group's exclusivity)
    pub fn is_compatible(&self, target_type: &str, kind: &DeclarationKind) -> bool {
        self.groups.iter().any(|(family, group)| {
            (family.is_none() || family.as_deref() == Some(target_type))
                && group.compatible.contains(kind)
        })
    }
}
