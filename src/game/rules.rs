//! Game rules
//!
//! Room limits and the pure checks applied to usernames and submitted words.
//! Nothing in here touches room state.

use crate::error::{GameError, WordRejection};
use crate::game::dictionary::Dictionary;
use crate::game::player::UsedWord;

/// Maximum number of players seated in the room
pub const MAX_PLAYERS: usize = 5;

/// Maximum username length in characters
pub const MAX_USERNAME_LEN: usize = 20;

/// Minimum accepted word length in characters
pub const MIN_WORD_LEN: usize = 2;

/// Players required before the game starts
pub const MIN_PLAYERS_TO_START: usize = 2;

/// Trim and lowercase a raw submission
pub fn normalize_word(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Trim a requested username and check its length
pub fn validate_username(requested: &str) -> Result<String, GameError> {
    let username = requested.trim();

    if username.is_empty() {
        return Err(GameError::EmptyUsername);
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(GameError::UsernameTooLong);
    }

    Ok(username.to_string())
}

/// Check a normalized word against the dictionary and the room history.
///
/// Checks run in a fixed order and the first failure wins: empty, too short,
/// not in dictionary, already used, chain mismatch.
pub fn validate_word(
    word: &str,
    history: &[UsedWord],
    dictionary: &dyn Dictionary,
) -> Result<(), WordRejection> {
    if word.is_empty() {
        return Err(WordRejection::EmptyWord);
    }

    if word.chars().count() < MIN_WORD_LEN {
        return Err(WordRejection::TooShort);
    }

    if !dictionary.contains(word) {
        return Err(WordRejection::NotInDictionary);
    }

    let lowered = word.to_lowercase();
    if history.iter().any(|used| used.word.to_lowercase() == lowered) {
        return Err(WordRejection::AlreadyUsed);
    }

    if let Some(expected) = history.last().and_then(UsedWord::last_char) {
        let expected = expected.to_lowercase().next().unwrap_or(expected);
        let first = lowered.chars().next();
        if first != Some(expected) {
            return Err(WordRejection::ChainMismatch { expected });
        }
    }

    Ok(())
}

/// Points awarded for an accepted word
pub fn word_points(word: &str) -> u32 {
    u32::try_from(word.chars().count()).unwrap_or(u32::MAX)
}
