use std::cmp::Ordering;

use crate::country::Country;

/// Medal-table order: gold, then silver, then bronze, all descending.
pub fn medal_order(a: &Country, b: &Country) -> Ordering {
    b.gold
        .cmp(&a.gold)
        .then_with(|| b.silver.cmp(&a.silver))
        .then_with(|| b.bronze.cmp(&a.bronze))
}

/// Returns a fresh ranked copy of `items`.
///
/// The sort is stable: exact ties keep their input order.
pub fn rank(items: &[Country]) -> Vec<Country> {
    let mut out = items.to_vec();
    out.sort_by(medal_order);
    out
}

/// True when `items` is already in medal-table order.
pub fn is_ranked(items: &[Country]) -> bool {
    items
        .windows(2)
        .all(|pair| medal_order(&pair[0], &pair[1]) != Ordering::Greater)
}
