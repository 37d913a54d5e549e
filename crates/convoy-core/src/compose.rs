//! Final message composition: random display-name prefix + template.

use rand::seq::SliceRandom;
use rand::Rng;

use convoy_types::plan::NameLists;

/// Pick one first name and one last name independently and uniformly.
///
/// Returns `None` when both pools are empty. Consecutive calls may repeat.
pub fn display_name<R: Rng + ?Sized>(names: &NameLists, rng: &mut R) -> Option<String> {
    let first = names.first.choose(rng);
    let last = names.last.choose(rng);
    match (first, last) {
        (Some(first), Some(last)) => Some(format!("{first} {last}")),
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (None, None) => None,
    }
}

/// Compose the text actually sent for `template`.
pub fn compose_message<R: Rng + ?Sized>(names: &NameLists, template: &str, rng: &mut R) -> String {
    match display_name(names, rng) {
        Some(name) => format!("{name} {template}"),
        None => template.to_string(),
    }
}
