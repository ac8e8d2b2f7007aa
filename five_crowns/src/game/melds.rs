//! Meld validation. These pure predicates are the only semantic authority on
//! what constitutes a legal run, book, extension, or go-out; every other
//! component routes through them.

use super::constants::MIN_MELD_SIZE;
use super::entities::{Card, Meld, MeldKind, RoundNumber};

/// Partition a card sequence into naturals and wilds for the given round.
fn split_wilds(cards: &[Card], round: RoundNumber) -> (Vec<Card>, Vec<Card>) {
    cards.iter().copied().partition(|c| !c.is_wild(round))
}

/// A run is ≥3 cards of one suit with consecutive rank values, where wilds
/// fill the interior gaps. Trailing wilds extend the run at the ends. A wild
/// never stands in for a natural rank that is already present: duplicate
/// natural ranks reject the run outright.
pub fn is_valid_run(cards: &[Card], round: RoundNumber) -> bool {
    if cards.len() < MIN_MELD_SIZE {
        return false;
    }
    let (mut naturals, wilds) = split_wilds(cards, round);
    if naturals.is_empty() {
        return true;
    }
    let suit = naturals[0].suit().expect("naturals are suited");
    if naturals.iter().any(|c| c.suit() != Some(suit)) {
        return false;
    }
    naturals.sort_by_key(|c| c.rank().expect("naturals are suited").value());
    let mut gaps = 0usize;
    for pair in naturals.windows(2) {
        let lo = pair[0].rank().expect("naturals are suited").value();
        let hi = pair[1].rank().expect("naturals are suited").value();
        if lo == hi {
            return false;
        }
        gaps += usize::from(hi - lo - 1);
    }
    wilds.len() >= gaps
}

/// A book is ≥3 cards of one rank, any suits. Duplicate suits are legal with
/// two decks, and there is no upper size bound.
pub fn is_valid_book(cards: &[Card], round: RoundNumber) -> bool {
    if cards.len() < MIN_MELD_SIZE {
        return false;
    }
    let (naturals, _) = split_wilds(cards, round);
    match naturals.split_first() {
        None => true,
        Some((first, rest)) => {
            let rank = first.rank().expect("naturals are suited");
            rest.iter().all(|c| c.rank() == Some(rank))
        }
    }
}

/// Classify a card set, trying run before book. All-wild sets satisfy both;
/// they are reported as runs here, and keep whatever kind the player declared
/// when checked through [`is_valid_meld`].
pub fn meld_kind(cards: &[Card], round: RoundNumber) -> Option<MeldKind> {
    if is_valid_run(cards, round) {
        Some(MeldKind::Run)
    } else if is_valid_book(cards, round) {
        Some(MeldKind::Book)
    } else {
        None
    }
}

/// Validate a meld under its declared kind.
pub fn is_valid_meld(meld: &Meld, round: RoundNumber) -> bool {
    match meld.kind {
        MeldKind::Run => is_valid_run(&meld.cards, round),
        MeldKind::Book => is_valid_book(&meld.cards, round),
    }
}

/// Whether `new_cards` can legally extend an existing meld: concatenate and
/// re-validate under the meld's declared kind.
pub fn can_extend_meld(meld: &Meld, new_cards: &[Card], round: RoundNumber) -> bool {
    if new_cards.is_empty() {
        return false;
    }
    let mut combined = meld.cards.clone();
    combined.extend_from_slice(new_cards);
    match meld.kind {
        MeldKind::Run => is_valid_run(&combined, round),
        MeldKind::Book => is_valid_book(&combined, round),
    }
}

/// Whether `hand` can go out by laying `melds` and discarding `discard`:
/// the melds plus the discard must consume the hand exactly.
pub fn can_go_out(
    hand: &[Card],
    melds: &[Meld],
    discard: Card,
    round: RoundNumber,
) -> bool {
    let meld_total: usize = melds.iter().map(Meld::len).sum();
    if meld_total + 1 != hand.len() {
        return false;
    }
    if !melds.iter().all(|m| is_valid_meld(m, round)) {
        return false;
    }
    let mut rest = hand.to_vec();
    for meld in melds {
        if !take_all(&mut rest, &meld.cards) {
            return false;
        }
    }
    take_one(&mut rest, discard) && rest.is_empty()
}

/// Reorder a valid run for display/storage: naturals ascending with wilds in
/// their gap positions and leftover wilds trailing. All-wild runs keep their
/// given order.
pub fn run_display_order(cards: &[Card], round: RoundNumber) -> Vec<Card> {
    let (mut naturals, wilds) = split_wilds(cards, round);
    if naturals.is_empty() {
        return cards.to_vec();
    }
    naturals.sort_by_key(|c| c.rank().expect("naturals are suited").value());
    let mut wilds = wilds.into_iter();
    let mut ordered = Vec::with_capacity(cards.len());
    ordered.push(naturals[0]);
    for pair in naturals.windows(2) {
        let lo = pair[0].rank().expect("naturals are suited").value();
        let hi = pair[1].rank().expect("naturals are suited").value();
        for _ in 0..hi.saturating_sub(lo + 1) {
            if let Some(wild) = wilds.next() {
                ordered.push(wild);
            }
        }
        ordered.push(pair[1]);
    }
    ordered.extend(wilds);
    ordered
}

/// Remove one card from `hand` by equality. Returns false if absent.
pub(crate) fn take_one(hand: &mut Vec<Card>, card: Card) -> bool {
    match hand.iter().position(|c| *c == card) {
        Some(idx) => {
            hand.remove(idx);
            true
        }
        None => false,
    }
}

/// Remove each of `cards` from `hand` as a multiset. Returns false (leaving
/// `hand` partially drained) if any card is missing; callers treat that as a
/// validation failure and discard the working copy.
pub(crate) fn take_all(hand: &mut Vec<Card>, cards: &[Card]) -> bool {
    cards.iter().all(|card| take_one(hand, *card))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Rank, Suit};

    fn c(code: &str) -> Card {
        code.parse().expect("test card code")
    }

    fn cards(codes: &[&str]) -> Vec<Card> {
        codes.iter().map(|s| c(s)).collect()
    }

    #[test]
    fn run_needs_three_cards() {
        assert!(!is_valid_run(&cards(&["H4", "H5"]), 1));
        assert!(is_valid_run(&cards(&["H4", "H5", "H6"]), 1));
    }

    #[test]
    fn run_rejects_mixed_suits() {
        assert!(!is_valid_run(&cards(&["H4", "S5", "H6"]), 1));
    }

    #[test]
    fn wilds_fill_interior_gaps_up_to_their_count() {
        // Round 5: sevens wild. Naturals {4,8} leave a gap of 3 but only two
        // wilds (the seven and the joker) are present.
        assert!(!is_valid_run(&cards(&["H4", "H7", "JK", "H8"]), 5));
        // Adding the 5 shrinks the gap to 2, which two wilds cover.
        assert!(is_valid_run(&cards(&["H4", "H5", "H7", "JK", "H8"]), 5));
    }

    #[test]
    fn duplicate_natural_ranks_reject_the_run() {
        // A wild may not substitute for a natural already present.
        assert!(!is_valid_run(&cards(&["H4", "H4", "JK"]), 1));
        assert!(!is_valid_run(&cards(&["H4", "H5", "H5", "H6"]), 1));
    }

    #[test]
    fn trailing_wilds_extend_the_run() {
        assert!(is_valid_run(&cards(&["H4", "H5", "H6", "JK", "JK"]), 1));
        assert!(is_valid_run(&cards(&["HK", "HQ", "JK"]), 1));
    }

    #[test]
    fn all_wild_melds_are_legal() {
        assert!(is_valid_run(&cards(&["JK", "JK", "H3"]), 1));
        assert!(is_valid_book(&cards(&["JK", "JK", "H3"]), 1));
        assert_eq!(meld_kind(&cards(&["JK", "JK", "JK"]), 1), Some(MeldKind::Run));
    }

    #[test]
    fn book_accepts_duplicate_suits() {
        assert!(is_valid_book(&cards(&["HQ", "HQ", "SQ"]), 1));
    }

    #[test]
    fn book_rejects_mixed_ranks() {
        assert!(!is_valid_book(&cards(&["HQ", "HJ", "SQ"]), 1));
    }

    #[test]
    fn book_has_no_upper_bound() {
        let big = cards(&["HQ", "SQ", "DQ", "CQ", "TQ", "HQ", "SQ", "JK"]);
        assert!(is_valid_book(&big, 1));
    }

    #[test]
    fn wild_rank_cards_never_count_as_naturals() {
        // Round 4: sixes wild, so this "book of sixes" is really all wilds.
        assert!(is_valid_book(&cards(&["H6", "S6", "D6"]), 4));
        // And a six may bridge a run gap in round 4.
        assert!(is_valid_run(&cards(&["H4", "H6", "H5"]), 4));
    }

    #[test]
    fn extend_revalidates_under_the_declared_kind() {
        let run = Meld::new(MeldKind::Run, cards(&["H4", "H5", "H6"]));
        assert!(can_extend_meld(&run, &cards(&["H7"]), 1));
        assert!(can_extend_meld(&run, &cards(&["JK"]), 1));
        assert!(!can_extend_meld(&run, &cards(&["S7"]), 1));
        assert!(!can_extend_meld(&run, &cards(&["H4"]), 1));
        assert!(!can_extend_meld(&run, &[], 1));

        let book = Meld::new(MeldKind::Book, cards(&["HQ", "SQ", "DQ"]));
        assert!(can_extend_meld(&book, &cards(&["HQ"]), 1));
        assert!(!can_extend_meld(&book, &cards(&["HJ"]), 1));
    }

    #[test]
    fn go_out_requires_exact_consumption() {
        let hand = cards(&["H4", "H5", "H6", "C8"]);
        let melds = vec![Meld::new(MeldKind::Run, cards(&["H4", "H5", "H6"]))];
        assert!(can_go_out(&hand, &melds, c("C8"), 1));

        let mut bigger = hand.clone();
        bigger.push(c("C9"));
        assert!(!can_go_out(&bigger, &melds, c("C8"), 1));

        // Meld card not actually in hand.
        let wrong = vec![Meld::new(MeldKind::Run, cards(&["S4", "S5", "S6"]))];
        assert!(!can_go_out(&hand, &wrong, c("C8"), 1));

        // Discard not in hand.
        assert!(!can_go_out(&hand, &melds, c("C9"), 1));
    }

    #[test]
    fn go_out_rejects_invalid_melds() {
        let hand = cards(&["H4", "H5", "S9", "C8"]);
        let melds = vec![Meld::new(MeldKind::Run, cards(&["H4", "H5", "S9"]))];
        assert!(!can_go_out(&hand, &melds, c("C8"), 1));
    }

    #[test]
    fn run_display_order_interleaves_wilds() {
        let ordered = run_display_order(&cards(&["H8", "JK", "H4", "H5", "H7"]), 5);
        // Round 5: H7 and the joker are wild, filling the 5→8 gap.
        assert_eq!(ordered[0], c("H4"));
        assert_eq!(ordered[1], c("H5"));
        assert_eq!(ordered[4], c("H8"));
        assert!(ordered[2].is_wild(5) && ordered[3].is_wild(5));
        assert_eq!(ordered.len(), 5);
    }

    #[test]
    fn run_display_order_keeps_trailing_wilds_at_the_end() {
        let ordered = run_display_order(&cards(&["JK", "H4", "H5", "H6"]), 1);
        assert_eq!(
            ordered[..3],
            [
                Card::Suited(Suit::Hearts, Rank::Four),
                Card::Suited(Suit::Hearts, Rank::Five),
                Card::Suited(Suit::Hearts, Rank::Six),
            ]
        );
        assert_eq!(ordered[3], Card::Joker);
    }
}
