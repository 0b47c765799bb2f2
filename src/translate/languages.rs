use std::collections::HashMap;

use anyhow::Result;

/// Built-in short codes and the NLLB codes they stand for.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("EN", "eng_Latn"),
    ("FR", "fra_Latn"),
    ("ES", "spa_Latn"),
    ("DE", "deu_Latn"),
    ("PT", "por_Latn"),
    ("IT", "ita_Latn"),
    ("NL", "nld_Latn"),
    ("RU", "rus_Cyrl"),
    ("AR", "arb_Arab"),
    ("ZH", "zho_Hans"),
];

/// Read-only table from human-facing codes to model language codes.
///
/// Keys are stored upper-cased; lookups upper-case the probe the same way.
#[derive(Debug, Clone)]
pub struct LanguageAliases {
    table: HashMap<String, String>,
}

impl LanguageAliases {
    pub fn builtin() -> Self {
        let table = BUILTIN_ALIASES
            .iter()
            .map(|(alias, code)| (alias.to_string(), code.to_string()))
            .collect();
        Self { table }
    }

    /// Built-in table plus `extra`. An extra alias replaces a built-in one with the
    /// same key, but two extras that collide once upper-cased are rejected.
    pub fn with_overrides(extra: &HashMap<String, String>) -> Result<Self> {
        let mut aliases = Self::builtin();
        let mut seen: HashMap<String, &str> = HashMap::new();

        for (alias, code) in extra {
            let key = alias.trim().to_uppercase();
            if key.is_empty() {
                anyhow::bail!("Language alias for '{}' must not be empty", code);
            }
            if code.trim().is_empty() {
                anyhow::bail!("Language alias '{}' maps to an empty code", alias);
            }
            if let Some(previous) = seen.insert(key.clone(), alias.as_str()) {
                anyhow::bail!(
                    "Language aliases '{}' and '{}' collide after normalization",
                    previous,
                    alias
                );
            }
            aliases.table.insert(key, code.trim().to_string());
        }

        Ok(aliases)
    }

    /// Look up an already-trimmed identifier.
    pub fn lookup(&self, identifier: &str) -> Option<&str> {
        self.table
            .get(&identifier.to_uppercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.table.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for LanguageAliases {
    fn default() -> Self {
        Self::builtin()
    }
}
