use rustc_hash::FxHashSet;

/// A set of names that hands out collision-free variants.
///
/// A taken name gets a numeric postfix: trailing digits are replaced by the
/// lowest free number (`light_3` -> `light_1` if that is free), names
/// without digits get `_1`, `_2`, ... appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniqueNameSet {
    names: FxHashSet<String>,
}

impl UniqueNameSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Returns false if the name was already present.
    pub fn insert(&mut self, name: &str) -> bool {
        self.names.insert(name.to_owned())
    }

    pub fn erase(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    /// `name` if it is free, otherwise the first free postfixed variant.
    /// Nothing is inserted.
    #[must_use]
    pub fn make_unique(&self, name: &str) -> String {
        if !self.contains(name) {
            return name.to_owned();
        }

        let prefix = postfix_prefix(name);
        let mut postfix: u64 = 1;
        loop {
            let candidate = format!("{prefix}{postfix}");
            if !self.contains(&candidate) {
                return candidate;
            }
            postfix += 1;
        }
    }

    /// Inserts and returns a unique variant of `name`.
    pub fn insert_unique(&mut self, name: &str) -> String {
        let unique = self.make_unique(name);
        self.names.insert(unique.clone());
        unique
    }

    /// Adds every name of `other`.
    pub fn merge(&mut self, other: &UniqueNameSet) {
        self.names.extend(other.names.iter().cloned());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All names, sorted.
    #[must_use]
    pub fn sorted(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.iter().cloned().collect();
        names.sort();
        names
    }
}

/// The part of `name` a numeric postfix is appended to.
fn postfix_prefix(name: &str) -> String {
    let stem = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if stem.len() < name.len() {
        stem.to_owned()
    } else if name.ends_with('_') {
        name.to_owned()
    } else {
        format!("{name}_")
    }
}
