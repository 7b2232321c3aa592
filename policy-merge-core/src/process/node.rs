use serde_yaml::{Mapping, Value};

use crate::error::{BuildError, MergeError};
use crate::value::{push_unique, string_list, string_field};
use crate::wildcard::{fnmatch, generalize};

/// One node of a process-execution tree.
///
/// Nodes live in a [`ProcessNodeList`](super::ProcessNodeList) arena and
/// refer to their children by id only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessNode {
    /// Identity, unique within the owning list.
    pub id: String,
    /// Process name; may be a glob pattern.
    pub name: String,
    /// Executable path patterns, without duplicates.
    pub exe: Vec<String>,
    /// Effective users, inherited from the nearest declaring ancestor.
    pub euser: Vec<String>,
    /// Child node ids in document order.
    pub children: Vec<String>,
    /// Id of the node this one was folded into during the last merge.
    pub merged_id: Option<String>,
    pub(crate) euser_declared: bool,
}

impl ProcessNode {
    /// Parse the scalar fields of a process node mapping.
    ///
    /// `inherited` is the parent's effective user set; children are parsed
    /// by the owning list.
    pub(crate) fn from_mapping(
        map: &Mapping,
        inherited: Option<&[String]>,
    ) -> Result<Self, BuildError> {
        const CONTEXT: &str = "process node";
        let id = string_field(map, "id", CONTEXT)?.ok_or(BuildError::MissingField {
            context: CONTEXT,
            field: "id",
        })?;
        let name = string_field(map, "name", CONTEXT)?.ok_or(BuildError::MissingField {
            context: CONTEXT,
            field: "name",
        })?;
        let exe = string_list(map.get("exe"), CONTEXT, "exe")?;
        let declared = string_list(map.get("euser"), CONTEXT, "euser")?;
        let euser_declared = !declared.is_empty();
        let euser = if euser_declared {
            declared
        } else {
            inherited.map(<[String]>::to_vec).unwrap_or_default()
        };
        if euser.is_empty() {
            return Err(BuildError::MissingEuser(id));
        }

        Ok(Self {
            id,
            name,
            exe,
            euser,
            children: Vec::new(),
            merged_id: None,
            euser_declared,
        })
    }

    /// `true` when this node's name pattern and executables cover `other`.
    pub fn contains(&self, other: &ProcessNode) -> bool {
        fnmatch(&other.name, &self.name) && self.exe_matches(other, true)
    }

    /// Stricter containment: exact executable match and the same users.
    pub fn equals(&self, other: &ProcessNode) -> bool {
        fnmatch(&other.name, &self.name)
            && self.exe_matches(other, false)
            && same_set(&self.euser, &other.euser)
    }

    /// `true` when either node contains the other.
    pub fn symmetric_in(&self, other: &ProcessNode) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// Partner test used by tree merges.
    ///
    /// Besides containment, a node carrying the same id and a matching name
    /// is the same process observed under another executable path.
    pub fn is_partner(&self, other: &ProcessNode, symmetric: bool) -> bool {
        if symmetric {
            self.symmetric_in(other) || (self.id == other.id && self.names_overlap(other))
        } else {
            self.contains(other) || (self.id == other.id && fnmatch(&other.name, &self.name))
        }
    }

    /// Widen this node toward `other` and record where `other` went.
    ///
    /// The name becomes a generalization of both names; when no common
    /// pattern exists the side whose pattern already covers the other wins.
    pub fn symmetric_merge(&mut self, other: &mut ProcessNode) -> Result<(), MergeError> {
        let generalized = generalize(&[self.name.as_str(), other.name.as_str()])
            .filter(|p| fnmatch(&self.name, p) && fnmatch(&other.name, p));
        let name = match generalized {
            Some(pattern) => pattern,
            None if fnmatch(&other.name, &self.name) => self.name.clone(),
            None if fnmatch(&self.name, &other.name) => other.name.clone(),
            None => {
                return Err(MergeError::Invariant(format!(
                    "process names '{}' and '{}' cannot be generalized",
                    self.name, other.name
                )))
            }
        };
        self.name = name;
        self.absorb(other);
        Ok(())
    }

    /// Extend this node to cover `other`; `other`'s name must already match.
    pub fn asymmetric_merge(&mut self, other: &mut ProcessNode) -> Result<(), MergeError> {
        if !fnmatch(&other.name, &self.name) {
            return Err(MergeError::Invariant(format!(
                "asymmetric merge target '{}' does not match name '{}'",
                self.name, other.name
            )));
        }
        self.absorb(other);
        Ok(())
    }

    fn absorb(&mut self, other: &mut ProcessNode) {
        for exe in &other.exe {
            push_unique(&mut self.exe, exe);
        }
        let before = self.euser.len();
        for user in &other.euser {
            push_unique(&mut self.euser, user);
        }
        if self.euser.len() != before {
            self.euser_declared = true;
        }
        other.merged_id = Some(self.id.clone());
    }

    fn names_overlap(&self, other: &ProcessNode) -> bool {
        fnmatch(&other.name, &self.name) || fnmatch(&self.name, &other.name)
    }

    fn exe_matches(&self, other: &ProcessNode, basename_fallback: bool) -> bool {
        other.exe.iter().any(|theirs| {
            self.exe.iter().any(|ours| {
                fnmatch(theirs, ours)
                    || (basename_fallback && fnmatch(basename(theirs), basename(ours)))
            })
        })
    }

    /// Serialize scalar fields; `euser` is written when declared or when it
    /// differs from the parent's effective users.
    pub(crate) fn to_mapping(&self, parent_euser: Option<&[String]>) -> Mapping {
        let mut map = Mapping::new();
        map.insert("name".into(), self.name.clone().into());
        map.insert(
            "exe".into(),
            Value::Sequence(self.exe.iter().cloned().map(Value::from).collect()),
        );
        map.insert("id".into(), self.id.clone().into());
        let inherited = parent_euser.is_some_and(|parent| same_set(parent, &self.euser));
        if self.euser_declared || !inherited {
            map.insert(
                "euser".into(),
                Value::Sequence(self.euser.iter().cloned().map(Value::from).collect()),
            );
        }
        map
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn same_set(a: &[String], b: &[String]) -> bool {
    a.iter().all(|x| b.contains(x)) && b.iter().all(|x| a.contains(x))
}
