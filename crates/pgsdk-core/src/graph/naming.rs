//! Relation-key inflection. The trailing-s heuristic matches what most
//! English table names need; schemas named differently can swap the
//! implementation behind the trait.

/// Derives relation keys from table names.
pub trait Inflector: Send + Sync {
    fn singularize(&self, word: &str) -> String;
    fn pluralize(&self, word: &str) -> String;
}

/// Default trailing-s rule: `books` ↔ `book`, `categories` ↔ `category`.
pub struct TrailingS;

impl Inflector for TrailingS {
    fn singularize(&self, word: &str) -> String {
        if let Some(stem) = word.strip_suffix("ies") {
            if !stem.is_empty() {
                return format!("{stem}y");
            }
        }
        if word.ends_with('s') && !word.ends_with("ss") && word.len() > 1 {
            return word[..word.len() - 1].to_string();
        }
        word.to_string()
    }

    fn pluralize(&self, word: &str) -> String {
        if word.ends_with('s') {
            return word.to_string();
        }
        if let Some(stem) = word.strip_suffix('y') {
            let before = stem.chars().last();
            if !matches!(before, Some('a' | 'e' | 'i' | 'o' | 'u')) && !stem.is_empty() {
                return format!("{stem}ies");
            }
        }
        format!("{word}s")
    }
}
