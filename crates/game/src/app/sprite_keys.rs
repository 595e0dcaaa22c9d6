use engine::{Furniture, NeighbourLinks};
use thiserror::Error;

use super::hooks::OPEN_PERCENT;

const FURNITURE_PREFIX: &str = "furniture/";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpriteKeyError {
    #[error("sprite key must not be empty")]
    Empty,
    #[error("sprite key must not start with '/'")]
    LeadingSlash,
    #[error("sprite key must not contain '..'")]
    ParentTraversal,
    #[error("sprite key contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

pub(crate) fn validate_sprite_key(key: &str) -> Result<(), SpriteKeyError> {
    if key.is_empty() {
        return Err(SpriteKeyError::Empty);
    }
    if key.starts_with('/') {
        return Err(SpriteKeyError::LeadingSlash);
    }
    if key.contains("..") {
        return Err(SpriteKeyError::ParentTraversal);
    }
    for ch in key.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '/' | '-') {
            continue;
        }
        return Err(SpriteKeyError::InvalidCharacter { character: ch });
    }
    Ok(())
}

/// Door frames by open fraction: closed, two opening frames, open.
fn door_frame(open_percent: f64) -> &'static str {
    if open_percent < 0.1 {
        ""
    } else if open_percent < 0.5 {
        "_opening_1"
    } else if open_percent < 0.9 {
        "_opening_2"
    } else {
        "_open"
    }
}

/// Sprite key a renderer would pick for `furniture`, e.g. `furniture/wall_ns`.
pub(crate) fn furniture_sprite_key(
    furniture: &Furniture,
    links: NeighbourLinks,
) -> Result<String, SpriteKeyError> {
    let mut key = format!(
        "{FURNITURE_PREFIX}{}",
        furniture.object_type().to_ascii_lowercase()
    );
    if furniture.can_link_to_neighbour() {
        let suffix = links.suffix().to_ascii_lowercase();
        if !suffix.is_empty() {
            key.push('_');
            key.push_str(&suffix);
        }
    } else if furniture.parameter(OPEN_PERCENT).is_some() {
        key.push_str(door_frame(furniture.number_parameter(OPEN_PERCENT, 0.0)));
    }
    validate_sprite_key(&key)?;
    Ok(key)
}
