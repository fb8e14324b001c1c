//! English pluralisation of object type names, used to derive the plural lookup aliases.
//!
//! Names are lower cased before they get here (`hostclass`, `computeinstance`). The rules are
//! the ones of the `pluralize` family of libraries, so aliases stay the same across clients.

/// Returns the plural of a lower case word.
pub(crate) fn plural(word: &str) -> String {
    pluralizer::pluralize(word, 2, false)
}
