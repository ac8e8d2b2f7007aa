/// Property-based tests for the meld validator and card codec using
/// proptest.
///
/// These pin down the invariants the rest of the server leans on: the wire
/// codec round-trips, run/book overlap is limited to near-wild sets, and
/// extension never produces an invalid meld.
use five_crowns::game::entities::{Card, Meld, MeldKind, Rank, Suit, wild_rank};
use five_crowns::game::melds::{
    can_extend_meld, is_valid_book, is_valid_meld, is_valid_run, meld_kind, run_display_order,
};
use proptest::prelude::*;

fn suit_strategy() -> impl Strategy<Value = Suit> {
    prop::sample::select(Suit::ALL.to_vec())
}

fn rank_strategy() -> impl Strategy<Value = Rank> {
    prop::sample::select(Rank::ALL.to_vec())
}

// One joker in roughly ten cards, matching its share of the real deck.
fn card_strategy() -> impl Strategy<Value = Card> {
    prop_oneof![
        9 => (suit_strategy(), rank_strategy()).prop_map(|(s, r)| Card::Suited(s, r)),
        1 => Just(Card::Joker),
    ]
}

fn cards_strategy(min: usize, max: usize) -> impl Strategy<Value = Vec<Card>> {
    prop::collection::vec(card_strategy(), min..=max)
}

fn round_strategy() -> impl Strategy<Value = u8> {
    1u8..=11
}

/// A generatively valid run: consecutive ranks of one suit with each gap
/// position replaced by a wild.
fn valid_run_strategy() -> impl Strategy<Value = (Vec<Card>, u8)> {
    (
        round_strategy(),
        suit_strategy(),
        0u8..=8,
        3usize..=6,
        prop::collection::vec(any::<bool>(), 6),
    )
        .prop_map(|(round, suit, start_offset, len, gap_flags)| {
            let wild = wild_rank(round);
            let start = 3 + (start_offset % 6);
            let mut cards = Vec::new();
            for (i, make_wild) in gap_flags.iter().take(len).enumerate() {
                let value = start + i as u8;
                match Rank::from_value(value) {
                    Some(rank) if rank != wild && !*make_wild => {
                        cards.push(Card::Suited(suit, rank));
                    }
                    // Off the top of the rank ladder, the wild rank itself,
                    // or an intentional gap: cover the slot with a joker.
                    _ => cards.push(Card::Joker),
                }
            }
            (cards, round)
        })
}

proptest! {
    #[test]
    fn card_codec_round_trips(card in card_strategy()) {
        let encoded = card.to_string();
        prop_assert_eq!(encoded.len(), 2);
        let decoded: Card = encoded.parse().unwrap();
        prop_assert_eq!(decoded, card);

        let json = serde_json::to_string(&card).unwrap();
        let back: Card = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, card);
    }

    #[test]
    fn run_and_book_overlap_only_near_all_wild(
        cards in cards_strategy(3, 8),
        round in round_strategy(),
    ) {
        if is_valid_run(&cards, round) && is_valid_book(&cards, round) {
            let naturals: Vec<_> = cards.iter().filter(|c| !c.is_wild(round)).collect();
            // Two distinct naturals cannot share both suit-run and
            // same-rank-book structure; duplicates reject the run.
            prop_assert!(naturals.len() <= 1, "naturals: {naturals:?}");
        }
    }

    #[test]
    fn classification_agrees_with_the_predicates(
        cards in cards_strategy(0, 8),
        round in round_strategy(),
    ) {
        match meld_kind(&cards, round) {
            Some(MeldKind::Run) => prop_assert!(is_valid_run(&cards, round)),
            Some(MeldKind::Book) => {
                prop_assert!(is_valid_book(&cards, round));
                prop_assert!(!is_valid_run(&cards, round));
            }
            None => {
                prop_assert!(!is_valid_run(&cards, round));
                prop_assert!(!is_valid_book(&cards, round));
            }
        }
    }

    #[test]
    fn extension_implies_combined_validity(
        existing in cards_strategy(3, 6),
        new_cards in cards_strategy(1, 3),
        round in round_strategy(),
    ) {
        for kind in [MeldKind::Run, MeldKind::Book] {
            let meld = Meld::new(kind, existing.clone());
            if !is_valid_meld(&meld, round) {
                continue;
            }
            if can_extend_meld(&meld, &new_cards, round) {
                let mut combined = existing.clone();
                combined.extend_from_slice(&new_cards);
                let extended = Meld::new(kind, combined);
                prop_assert!(is_valid_meld(&extended, round));
            }
        }
    }

    #[test]
    fn generated_runs_always_validate(run in valid_run_strategy()) {
        let (cards, round) = run;
        prop_assert!(is_valid_run(&cards, round), "run: {cards:?} round {round}");
    }

    #[test]
    fn books_of_one_rank_always_validate(
        rank in rank_strategy(),
        suits in prop::collection::vec(suit_strategy(), 3..=7),
        round in round_strategy(),
    ) {
        let cards: Vec<Card> = suits.into_iter().map(|s| Card::Suited(s, rank)).collect();
        prop_assert!(is_valid_book(&cards, round));
    }

    #[test]
    fn display_order_preserves_the_multiset(run in valid_run_strategy()) {
        let (cards, round) = run;
        let mut ordered = run_display_order(&cards, round);
        let mut original = cards.clone();
        ordered.sort();
        original.sort();
        prop_assert_eq!(ordered, original);
    }

    #[test]
    fn validators_never_accept_undersized_melds(
        cards in cards_strategy(0, 2),
        round in round_strategy(),
    ) {
        prop_assert!(!is_valid_run(&cards, round));
        prop_assert!(!is_valid_book(&cards, round));
        prop_assert!(meld_kind(&cards, round).is_none());
    }
}
