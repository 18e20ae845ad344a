//! Pre-aggregation filters: percent cutoff, major components, null handling

use super::{AggregateOptions, ComponentRating};

/// Components that take part in map-unit aggregation
///
/// Components below the cutoff are dropped, as are minor components when
/// only majors are wanted. Null values are then dropped, kept, or replaced
/// per the null-handling mode.
pub fn qualifying_components(
    components: Vec<ComponentRating>,
    options: &AggregateOptions,
) -> Vec<ComponentRating> {
    components
        .into_iter()
        .filter(|c| c.percent >= options.percent_cutoff)
        .filter(|c| !options.major_only || c.major)
        .filter_map(|c| {
            options
                .null_handling
                .apply(c.value.clone())
                .map(|value| ComponentRating { value, ..c })
        })
        .collect()
}
