use std::fmt;

/// Identifies a resource type by API group and kind.
///
/// The core API group is represented by the empty string; references that
/// spell it `core` are normalized on construction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKind {
    pub group: String,
    pub kind: String,
}

impl GroupKind {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        let group = group.into();
        Self {
            group: if group == "core" { String::new() } else { group },
            kind: kind.into(),
        }
    }

    /// Builds the group kind of a reference whose group may be omitted.
    pub fn from_ref(group: Option<&str>, kind: &str) -> Self {
        Self::new(group.unwrap_or_default(), kind)
    }

    pub fn of<T>() -> Self
    where
        T: kube::Resource<DynamicType = ()>,
    {
        Self::new(T::group(&()), T::kind(&()))
    }

    pub fn is_core(&self) -> bool {
        self.group.is_empty()
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            f.write_str(&self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}
