use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PALETTE: [&str; 9] = [
    "#fd7f6f", "#7eb0d5", "#b2e061", "#bd7ebe", "#ffb55a", "#ffee65", "#beb9db", "#fdcce5",
    "#8bd3c7",
];

pub fn default_palette() -> Vec<String> {
    DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorState {
    pub cursor: usize,
}

/// Picks the next color and returns it with the advanced state.
pub fn next_color(
    state: AllocatorState,
    palette: &[String],
    in_use: &HashSet<String>,
) -> (String, AllocatorState) {
    if palette.is_empty() {
        return (String::new(), state);
    }
    let len = palette.len();
    let start = state.cursor % len;
    for step in 0..len {
        let position = (start + step) % len;
        let candidate = &palette[position];
        if !in_use.contains(&candidate.to_lowercase()) {
            return (
                candidate.clone(),
                AllocatorState {
                    cursor: (position + 1) % len,
                },
            );
        }
    }
    (
        palette[start].clone(),
        AllocatorState {
            cursor: (start + 1) % len,
        },
    )
}

pub fn colors_in_use<'a, I>(entries: I, conditions: &HashSet<String>) -> HashSet<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    entries
        .into_iter()
        .filter(|(name, _)| !conditions.contains(*name))
        .map(|(_, color)| color.to_lowercase())
        .filter(|color| !color.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_palette_repeats_from_cursor() {
        let palette = vec!["#a".to_string(), "#b".to_string()];
        let in_use: HashSet<String> = ["#a".to_string(), "#b".to_string()].into();
        let (color, state) = next_color(AllocatorState { cursor: 1 }, &palette, &in_use);
        assert_eq!(color, "#b");
        assert_eq!(state.cursor, 0);
    }

    #[test]
    fn skips_taken_colors() {
        let palette = default_palette();
        let in_use: HashSet<String> = [DEFAULT_PALETTE[0].to_string()].into();
        let (color, state) = next_color(AllocatorState::default(), &palette, &in_use);
        assert_eq!(color, DEFAULT_PALETTE[1]);
        assert_eq!(state.cursor, 2);
    }

    #[test]
    fn condition_colors_are_not_in_use() {
        let conditions: HashSet<String> = ["Control".to_string()].into();
        let used = colors_in_use(
            [("Control", "#FD7F6F"), ("Kinases", "#7eb0d5")],
            &conditions,
        );
        assert_eq!(used, ["#7eb0d5".to_string()].into());
    }
}
