//! English pluralisation used to derive REST routes from logical type names.
//!
//! The rules are evaluated in three ordered passes: the uncountable set, the
//! irregular word table, and finally the general suffix rules. The first rule
//! whose pattern matches wins, so broader patterns sit at the end of each
//! table.
//!
//! ```rust
//! use rest_steps::pluralize::pluralize;
//!
//! assert_eq!(pluralize("category"), "categories");
//! assert_eq!(pluralize("child"), "children");
//! assert_eq!(pluralize("sheep"), "sheep");
//! ```

use regex::Regex;
use std::sync::LazyLock;

/// Words whose plural is identical to the singular form.
const UNCOUNTABLE: &[&str] = &[
    "sheep",
    "fish",
    "deer",
    "series",
    "species",
    "money",
    "rice",
    "information",
    "equipment",
];

/// Irregular singular suffixes and their plural replacements.
const IRREGULAR: &[(&str, &str)] = &[
    ("move", "moves"),
    ("foot", "feet"),
    ("goose", "geese"),
    ("sex", "sexes"),
    ("child", "children"),
    ("man", "men"),
    ("tooth", "teeth"),
    ("person", "people"),
    ("valve", "valves"),
];

/// General suffix rules. Replacement strings use `${n}` group syntax.
const PLURAL: &[(&str, &str)] = &[
    (r"(?i)(quiz)$", "${1}zes"),
    (r"(?i)^(ox)$", "${1}en"),
    (r"(?i)([ml])ouse$", "${1}ice"),
    (r"(?i)(matr|vert|ind)(?:ix|ex)$", "${1}ices"),
    (r"(?i)(x|ch|ss|sh)$", "${1}es"),
    (r"(?i)([^aeiouy]|qu)y$", "${1}ies"),
    (r"(?i)(hive)$", "${1}s"),
    (r"(?i)(?:([^f])fe|([lr])f)$", "${1}${2}ves"),
    (r"(?i)(shea|lea|loa|thie)f$", "${1}ves"),
    (r"(?i)sis$", "ses"),
    (r"(?i)([ti])um$", "${1}a"),
    (r"(?i)(tomat|potat|ech|her|vet)o$", "${1}oes"),
    (r"(?i)(bu)s$", "${1}ses"),
    (r"(?i)(alias)$", "${1}es"),
    (r"(?i)(octop)us$", "${1}i"),
    (r"(?i)(ax|test)is$", "${1}es"),
    (r"(?i)(us)$", "${1}es"),
    (r"(?i)s$", "s"),
    (r"$", "s"),
];

struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

impl Rule {
    fn apply(&self, word: &str) -> Option<String> {
        self.pattern
            .is_match(word)
            .then(|| self.pattern.replace(word, self.replacement).into_owned())
    }
}

#[expect(
    clippy::expect_used,
    reason = "rule patterns are static literals covered by unit tests"
)]
fn compile(pattern: &str, replacement: &'static str) -> Rule {
    Rule {
        pattern: Regex::new(pattern).expect("pluralisation pattern should compile"),
        replacement,
    }
}

static IRREGULAR_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    IRREGULAR
        .iter()
        .map(|(singular, plural)| compile(&format!("(?i){singular}$"), plural))
        .collect()
});

static PLURAL_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    PLURAL
        .iter()
        .map(|(pattern, replacement)| compile(pattern, replacement))
        .collect()
});

/// Return the plural form of `word`.
///
/// The function is pure: the same input always yields the same output.
/// Pluralising a word that is already plural is not supported.
#[must_use]
pub fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    if UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_owned();
    }

    IRREGULAR_RULES
        .iter()
        .chain(PLURAL_RULES.iter())
        .find_map(|rule| rule.apply(word))
        .unwrap_or_else(|| format!("{word}s"))
}
