use rand::{rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

use super::constants;

/// Type alias for database-backed user identifiers.
pub type UserId = i64;

/// Type alias for database-backed game identifiers.
pub type GameId = i64;

/// Type alias for seat positions at the table.
pub type SeatIndex = usize;

/// Type alias for the round counter (1..=11).
pub type RoundNumber = u8;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Suit {
    Hearts,
    Spades,
    Diamonds,
    Clubs,
    Stars,
}

impl Suit {
    pub const ALL: [Suit; constants::NUM_SUITS] = [
        Suit::Hearts,
        Suit::Spades,
        Suit::Diamonds,
        Suit::Clubs,
        Suit::Stars,
    ];

    /// Single-letter wire code (`T` for stars, since `S` is spades).
    pub const fn code(self) -> char {
        match self {
            Self::Hearts => 'H',
            Self::Spades => 'S',
            Self::Diamonds => 'D',
            Self::Clubs => 'C',
            Self::Stars => 'T',
        }
    }

    pub const fn from_code(c: char) -> Option<Self> {
        match c {
            'H' => Some(Self::Hearts),
            'S' => Some(Self::Spades),
            'D' => Some(Self::Diamonds),
            'C' => Some(Self::Clubs),
            'T' => Some(Self::Stars),
            _ => None,
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Hearts => "♥",
            Self::Spades => "♠",
            Self::Diamonds => "♦",
            Self::Clubs => "♣",
            Self::Stars => "★",
        };
        write!(f, "{repr}")
    }
}

/// Card ranks 3 through King. Aces and twos do not exist in Five Crowns.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Rank {
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
}

impl Rank {
    pub const ALL: [Rank; constants::NUM_RANKS] = [
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
    ];

    /// Natural rank value, 3..=13. Doubles as the card's penalty points.
    pub const fn value(self) -> u8 {
        match self {
            Self::Three => 3,
            Self::Four => 4,
            Self::Five => 5,
            Self::Six => 6,
            Self::Seven => 7,
            Self::Eight => 8,
            Self::Nine => 9,
            Self::Ten => 10,
            Self::Jack => 11,
            Self::Queen => 12,
            Self::King => 13,
        }
    }

    pub const fn from_value(value: u8) -> Option<Self> {
        match value {
            3 => Some(Self::Three),
            4 => Some(Self::Four),
            5 => Some(Self::Five),
            6 => Some(Self::Six),
            7 => Some(Self::Seven),
            8 => Some(Self::Eight),
            9 => Some(Self::Nine),
            10 => Some(Self::Ten),
            11 => Some(Self::Jack),
            12 => Some(Self::Queen),
            13 => Some(Self::King),
            _ => None,
        }
    }

    /// Single-letter wire code (`X` for ten).
    pub const fn code(self) -> char {
        match self {
            Self::Three => '3',
            Self::Four => '4',
            Self::Five => '5',
            Self::Six => '6',
            Self::Seven => '7',
            Self::Eight => '8',
            Self::Nine => '9',
            Self::Ten => 'X',
            Self::Jack => 'J',
            Self::Queen => 'Q',
            Self::King => 'K',
        }
    }

    pub const fn from_code(c: char) -> Option<Self> {
        match c {
            '3' => Some(Self::Three),
            '4' => Some(Self::Four),
            '5' => Some(Self::Five),
            '6' => Some(Self::Six),
            '7' => Some(Self::Seven),
            '8' => Some(Self::Eight),
            '9' => Some(Self::Nine),
            'X' => Some(Self::Ten),
            'J' => Some(Self::Jack),
            'Q' => Some(Self::Queen),
            'K' => Some(Self::King),
            _ => None,
        }
    }
}

/// The rank that is wild in the given round (3s in round 1, up to Ks in
/// round 11).
pub fn wild_rank(round: RoundNumber) -> Rank {
    Rank::from_value(round + 2).expect("round is within 1..=11")
}

/// A playing card: a suited rank or a joker. Equality is structural; the
/// two decks contain exact duplicates and that is expected.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Card {
    Suited(Suit, Rank),
    Joker,
}

impl Card {
    /// Whether this card is wild in round `round`. Wildness is never stored;
    /// it is re-evaluated against the current round every time.
    pub fn is_wild(self, round: RoundNumber) -> bool {
        match self {
            Self::Joker => true,
            Self::Suited(_, rank) => rank.value() == round + 2,
        }
    }

    /// Penalty points this card is worth when left in hand at round end.
    pub fn points(self, round: RoundNumber) -> u32 {
        match self {
            Self::Joker => constants::JOKER_POINTS,
            _ if self.is_wild(round) => constants::WILD_POINTS,
            Self::Suited(_, rank) => u32::from(rank.value()),
        }
    }

    pub fn rank(self) -> Option<Rank> {
        match self {
            Self::Suited(_, rank) => Some(rank),
            Self::Joker => None,
        }
    }

    pub fn suit(self) -> Option<Suit> {
        match self {
            Self::Suited(suit, _) => Some(suit),
            Self::Joker => None,
        }
    }
}

/// Two-character wire encoding: suit code then rank code (`H7`, `TX`), with
/// `JK` for a joker.
impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Suited(suit, rank) => write!(f, "{}{}", suit.code(), rank.code()),
            Self::Joker => write!(f, "JK"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unknown card code `{0}`")]
pub struct ParseCardError(String);

impl FromStr for Card {
    type Err = ParseCardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "JK" {
            return Ok(Self::Joker);
        }
        let mut chars = s.chars();
        let card = match (chars.next(), chars.next(), chars.next()) {
            (Some(suit), Some(rank), None) => Suit::from_code(suit)
                .zip(Rank::from_code(rank))
                .map(|(suit, rank)| Self::Suited(suit, rank)),
            _ => None,
        };
        card.ok_or_else(|| ParseCardError(s.to_string()))
    }
}

impl Serialize for Card {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The 116-card stock: two copies of every suited card plus six jokers.
#[derive(Clone, Debug, PartialEq)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// Build the full two-deck multiset in a fixed order. Callers shuffle
    /// before dealing.
    pub fn full() -> Self {
        let mut cards = Vec::with_capacity(constants::DECK_SIZE);
        for _ in 0..2 {
            for suit in Suit::ALL {
                for rank in Rank::ALL {
                    cards.push(Card::Suited(suit, rank));
                }
            }
            for _ in 0..constants::JOKERS_PER_DECK {
                cards.push(Card::Joker);
            }
        }
        Self { cards }
    }

    /// Build a deck from an arbitrary card list (used when recycling the
    /// discard pile mid-round).
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    pub fn shuffle(&mut self, rng: &mut StdRng) {
        self.cards.shuffle(rng);
    }

    /// Deal the top card, if any.
    pub fn draw(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Whether a meld is a run (consecutive, one suit) or a book (one rank).
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeldKind {
    Run,
    Book,
}

impl fmt::Display for MeldKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Run => "run",
            Self::Book => "book",
        };
        write!(f, "{repr}")
    }
}

/// A laid-down meld. Runs are stored value-ascending with wilds in their gap
/// positions; book order is irrelevant.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Meld {
    pub kind: MeldKind,
    pub cards: Vec<Card>,
}

impl Meld {
    pub fn new(kind: MeldKind, cards: Vec<Card>) -> Self {
        Self { kind, cards }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// A seated player. The hand is kept in arrival order (draws appended) so
/// that replaying the event log reproduces it exactly.
#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    pub user_id: UserId,
    pub seat: SeatIndex,
    pub hand: Vec<Card>,
    pub melds: Vec<Meld>,
    pub score: u32,
    pub has_gone_out: bool,
}

impl Player {
    pub fn new(user_id: UserId, seat: SeatIndex) -> Self {
        Self {
            user_id,
            seat,
            hand: Vec::new(),
            melds: Vec::new(),
            score: 0,
            has_gone_out: false,
        }
    }
}

/// What the current player owes the table next.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TurnPhase {
    MustDraw,
    MustDiscard,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Lobby,
    Active,
    Finished,
}

impl GameStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lobby => "lobby",
            Self::Active => "active",
            Self::Finished => "finished",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "lobby" => Some(Self::Lobby),
            "active" => Some(Self::Active),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A player as seen by some viewer. `hand` is populated only in the view
/// sent to that player; everyone else sees the count.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub user_id: UserId,
    pub seat: SeatIndex,
    pub score: u32,
    pub has_gone_out: bool,
    pub melds: Vec<Meld>,
    pub hand_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand: Option<Vec<Card>>,
}

/// Per-player projection of a game, safe to put on the wire.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub game_id: GameId,
    pub status: GameStatus,
    pub round: RoundNumber,
    pub turn_index: SeatIndex,
    pub turn_phase: TurnPhase,
    pub is_final_turn_phase: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub went_out: Option<SeatIndex>,
    pub stock_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discard_top: Option<Card>,
    pub players: Vec<PlayerView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_deck_has_116_cards() {
        let deck = Deck::full();
        assert_eq!(deck.len(), constants::DECK_SIZE);
        assert_eq!(deck.len(), 116);
    }

    #[test]
    fn full_deck_has_six_jokers_and_two_of_each_suited() {
        let deck = Deck::full();
        let jokers = deck.cards.iter().filter(|c| **c == Card::Joker).count();
        assert_eq!(jokers, 6);
        for suit in Suit::ALL {
            for rank in Rank::ALL {
                let copies = deck
                    .cards
                    .iter()
                    .filter(|c| **c == Card::Suited(suit, rank))
                    .count();
                assert_eq!(copies, 2, "{suit}{rank:?}");
            }
        }
    }

    #[test]
    fn wildness_follows_the_round() {
        let seven = Card::Suited(Suit::Hearts, Rank::Seven);
        assert!(seven.is_wild(5));
        assert!(!seven.is_wild(1));
        assert!(Card::Joker.is_wild(1));
        assert!(Card::Joker.is_wild(11));
        assert_eq!(wild_rank(1), Rank::Three);
        assert_eq!(wild_rank(11), Rank::King);
    }

    #[test]
    fn points_depend_on_wildness() {
        let king = Card::Suited(Suit::Stars, Rank::King);
        assert_eq!(king.points(1), 13);
        assert_eq!(king.points(11), 20);
        assert_eq!(Card::Joker.points(4), 50);
        assert_eq!(Card::Suited(Suit::Clubs, Rank::Three).points(2), 3);
    }

    #[test]
    fn card_codes_round_trip() {
        assert_eq!(Card::Suited(Suit::Hearts, Rank::Seven).to_string(), "H7");
        assert_eq!(Card::Suited(Suit::Stars, Rank::Ten).to_string(), "TX");
        assert_eq!(Card::Joker.to_string(), "JK");
        assert_eq!(
            "H7".parse::<Card>().unwrap(),
            Card::Suited(Suit::Hearts, Rank::Seven)
        );
        assert_eq!("JK".parse::<Card>().unwrap(), Card::Joker);
        assert!("H2".parse::<Card>().is_err());
        assert!("ZZ".parse::<Card>().is_err());
        assert!("H77".parse::<Card>().is_err());
    }

    #[test]
    fn card_serde_uses_the_wire_code() {
        let card = Card::Suited(Suit::Diamonds, Rank::Queen);
        let json = serde_json::to_string(&card).unwrap();
        assert_eq!(json, "\"DQ\"");
        let back: Card = serde_json::from_str(&json).unwrap();
        assert_eq!(back, card);
    }
}
