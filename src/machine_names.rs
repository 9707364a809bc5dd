use std::collections::{HashMap, HashSet};

/// Folds free-form machine names onto canonical lowercase names.
#[derive(Debug, Clone, Default)]
pub struct MachineAliases {
    // alias (lowercase) -> canonical name (lowercase)
    aliases: HashMap<String, String>,
}

impl MachineAliases {
    pub fn new(mapping: HashMap<String, String>) -> Self {
        let aliases = mapping
            .into_iter()
            .map(|(alias, canonical)| {
                (
                    alias.trim().to_lowercase(),
                    canonical.trim().to_lowercase(),
                )
            })
            .collect();
        Self { aliases }
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(a, c)| (a.to_string(), c.to_string()))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// An already-canonical name passes through unchanged.
    pub fn standardize(&self, raw: &str) -> String {
        let name = raw.trim().to_lowercase();
        match self.aliases.get(&name) {
            Some(canonical) => canonical.clone(),
            None => name,
        }
    }

    pub fn standardize_set<S: AsRef<str>>(&self, names: &[S]) -> HashSet<String> {
        names
            .iter()
            .map(|n| self.standardize(n.as_ref()))
            .collect()
    }
}

pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, word) in name.split(' ').enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{MachineAliases, title_case};

    fn aliases() -> MachineAliases {
        MachineAliases::from_pairs([
            ("pulp fiction le", "pulp fiction"),
            ("Medieval Madness (Remake)", "medieval madness"),
            ("tx sector", "tx-sector"),
        ])
    }

    #[test]
    fn alias_variants_fold_to_canonical() {
        let a = aliases();
        assert_eq!(a.standardize("Pulp Fiction LE"), "pulp fiction");
        assert_eq!(a.standardize("  medieval madness (remake) "), "medieval madness");
        assert_eq!(a.standardize("TX Sector"), "tx-sector");
    }

    #[test]
    fn unknown_names_pass_through_lowercased() {
        let a = aliases();
        assert_eq!(a.standardize("  Godzilla  "), "godzilla");
        assert_eq!(a.standardize("cleopatra"), "cleopatra");
    }

    #[test]
    fn standardize_is_idempotent() {
        let a = aliases();
        for raw in ["Pulp Fiction LE", "pulp fiction", "Godzilla", "TX SECTOR"] {
            let once = a.standardize(raw);
            assert_eq!(a.standardize(&once), once);
        }
    }

    #[test]
    fn standardize_set_dedupes_variants() {
        let a = aliases();
        let set = a.standardize_set(&["Pulp Fiction LE", "pulp fiction", "Godzilla"]);
        assert_eq!(set.len(), 2);
        assert!(set.contains("pulp fiction"));
        assert!(set.contains("godzilla"));
    }

    #[test]
    fn title_case_per_word() {
        assert_eq!(title_case("pulp fiction"), "Pulp Fiction");
        assert_eq!(title_case("attack from mars"), "Attack From Mars");
        assert_eq!(title_case("godzilla"), "Godzilla");
    }
}
