//! Game-wide constants for the Five Crowns deck and rules.

/// Number of suits in a Five Crowns deck.
pub const NUM_SUITS: usize = 5;

/// Number of ranks per suit (3 through K).
pub const NUM_RANKS: usize = 11;

/// Jokers contributed by each of the two decks.
pub const JOKERS_PER_DECK: usize = 3;

/// Total cards in play: two 55-card decks plus 6 jokers.
pub const DECK_SIZE: usize = 2 * (NUM_SUITS * NUM_RANKS) + 2 * JOKERS_PER_DECK;

/// First round of a game.
pub const FIRST_ROUND: u8 = 1;

/// Last round of a game (Kings wild).
pub const LAST_ROUND: u8 = 11;

/// Cards dealt in round `r` is `r + HAND_SIZE_OFFSET`.
pub const HAND_SIZE_OFFSET: u8 = 2;

/// Minimum players for a game to start.
pub const MIN_PLAYERS: usize = 2;

/// Maximum players a game can seat. Round 11 deals 13 cards each, so seven
/// players plus the discard flip still leaves stock in a 116-card deck.
pub const MAX_PLAYERS: usize = 7;

/// Smallest legal meld.
pub const MIN_MELD_SIZE: usize = 3;

/// Penalty points for a joker left in hand.
pub const JOKER_POINTS: u32 = 50;

/// Penalty points for a current-round wild left in hand.
pub const WILD_POINTS: u32 = 20;
