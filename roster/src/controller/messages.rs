// User-facing notification text. Collaborator error detail never reaches these.

/// Singular and plural nouns for the rows a view holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Nouns {
    one: String,
    many: String,
}

impl Default for Nouns {
    fn default() -> Self {
        Nouns::new("record", "records")
    }
}

impl Nouns {
    pub(crate) fn new(one: &str, many: &str) -> Self {
        Nouns {
            one: one.to_string(),
            many: many.to_string(),
        }
    }

    pub(crate) fn one(&self) -> &str {
        &self.one
    }

    pub(crate) fn deleted_one(&self) -> String {
        format!("{} deleted successfully", capitalize(&self.one))
    }

    pub(crate) fn deleted_many(&self, count: usize) -> String {
        format!("{count} {} deleted successfully", self.many)
    }

    pub(crate) fn bulk_partial(&self, deleted: usize, total: usize) -> String {
        format!(
            "Deleted {deleted} of {total} {}; {} could not be deleted. Please try again.",
            self.many,
            total - deleted
        )
    }

    pub(crate) fn bulk_failure(&self) -> String {
        format!("Failed to delete some or all {}. Please try again.", self.many)
    }

    pub(crate) fn load_failure(&self) -> String {
        format!("Failed to load {}", self.many)
    }
}

pub(crate) fn generic_failure() -> String {
    "Something went wrong, please try again.".to_string()
}

pub(crate) fn load_options_failed() -> String {
    "Failed to load options".to_string()
}

/// Best-effort singular of an English plural ("fee records" -> "fee record").
pub(crate) fn singular(plural: &str) -> &str {
    // "categories" has no borrowed singular
    if plural.ends_with("ies") {
        return plural;
    }
    plural
        .strip_suffix('s')
        .filter(|stem| !stem.is_empty() && !stem.ends_with('s'))
        .unwrap_or(plural)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_texts() {
        let nouns = Nouns::new("routine", "routines");
        assert_eq!(nouns.deleted_many(2), "2 routines deleted successfully");
        assert_eq!(
            nouns.bulk_partial(2, 3),
            "Deleted 2 of 3 routines; 1 could not be deleted. Please try again."
        );
        assert_eq!(
            nouns.bulk_failure(),
            "Failed to delete some or all routines. Please try again."
        );
        assert_eq!(nouns.deleted_one(), "Routine deleted successfully");
    }

    #[test]
    fn test_singular() {
        assert_eq!(singular("routines"), "routine");
        assert_eq!(singular("fee records"), "fee record");
        assert_eq!(singular("class"), "class");
        assert_eq!(singular("categories"), "categories");
        assert_eq!(singular("s"), "s");
    }
}
