//! The per-game state machine. One value of [`GameState`] is the single
//! source of truth for a game; it is owned by that game's actor task and
//! never observed from outside it.
//!
//! Every mutating method is transactional: it either commits the full
//! command or returns a [`GameError`] leaving the state untouched. All
//! shuffles come from the seeded RNG stream, so replaying the event log
//! reproduces the live state exactly.

use log::debug;
use rand::{SeedableRng, rngs::StdRng};

use super::GameError;
use super::constants::{
    DECK_SIZE, FIRST_ROUND, HAND_SIZE_OFFSET, LAST_ROUND, MIN_MELD_SIZE, MIN_PLAYERS,
};
use super::entities::{
    Card, Deck, GameId, GameSnapshot, GameStatus, Meld, MeldKind, Player, PlayerView, RoundNumber,
    SeatIndex, TurnPhase, UserId,
};
use super::events::GameEvent;
use super::melds;

#[derive(Clone, Debug)]
pub struct GameState {
    game_id: GameId,
    players: Vec<Player>,
    stock: Deck,
    discard: Vec<Card>,
    turn_index: SeatIndex,
    turn_phase: TurnPhase,
    round: RoundNumber,
    went_out: Option<SeatIndex>,
    final_turn_phase: bool,
    status: GameStatus,
    seed: u64,
    rng: StdRng,
}

// The RNG carries no identity of its own: its stream position is a function
// of the seed and the committed commands, which the remaining fields pin
// down. Comparing everything else is what replay equality means.
impl PartialEq for GameState {
    fn eq(&self, other: &Self) -> bool {
        self.game_id == other.game_id
            && self.players == other.players
            && self.stock == other.stock
            && self.discard == other.discard
            && self.turn_index == other.turn_index
            && self.turn_phase == other.turn_phase
            && self.round == other.round
            && self.went_out == other.went_out
            && self.final_turn_phase == other.final_turn_phase
            && self.status == other.status
            && self.seed == other.seed
    }
}

impl GameState {
    /// Create a game in the lobby. `user_ids` are seated in the given order.
    pub fn new(game_id: GameId, seed: u64, user_ids: &[UserId]) -> Self {
        let players = user_ids
            .iter()
            .enumerate()
            .map(|(seat, user_id)| Player::new(*user_id, seat))
            .collect();
        Self {
            game_id,
            players,
            stock: Deck::from_cards(Vec::new()),
            discard: Vec::new(),
            turn_index: 0,
            turn_phase: TurnPhase::MustDraw,
            round: FIRST_ROUND,
            went_out: None,
            final_turn_phase: false,
            status: GameStatus::Lobby,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn round(&self) -> RoundNumber {
        self.round
    }

    pub fn turn_index(&self) -> SeatIndex {
        self.turn_index
    }

    pub fn turn_phase(&self) -> TurnPhase {
        self.turn_phase
    }

    pub fn is_final_turn_phase(&self) -> bool {
        self.final_turn_phase
    }

    pub fn went_out(&self) -> Option<SeatIndex> {
        self.went_out
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The user whose turn it is, if the game is running.
    pub fn current_user(&self) -> Option<UserId> {
        (self.status == GameStatus::Active).then(|| self.players[self.turn_index].user_id)
    }

    pub fn seat_of(&self, user_id: UserId) -> Option<SeatIndex> {
        self.players.iter().position(|p| p.user_id == user_id)
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.seat_of(user_id).is_some()
    }

    /// The winner of a finished game: lowest total score, earliest seat on a
    /// tie.
    pub fn winner(&self) -> Option<UserId> {
        if self.status != GameStatus::Finished {
            return None;
        }
        self.players
            .iter()
            .min_by_key(|p| (p.score, p.seat))
            .map(|p| p.user_id)
    }

    /// Total cards across stock, discard, hands, and melds. Equal to the
    /// deck size whenever a round is in progress.
    pub fn card_count(&self) -> usize {
        let in_hands: usize = self.players.iter().map(|p| p.hand.len()).sum();
        let in_melds: usize = self
            .players
            .iter()
            .flat_map(|p| p.melds.iter())
            .map(Meld::len)
            .sum();
        self.stock.len() + self.discard.len() + in_hands + in_melds
    }

    /// Replace the seating while still in the lobby (invites and lobby
    /// leaves arrive through the REST facade, not the event log).
    pub fn set_lobby_players(&mut self, user_ids: &[UserId]) -> Result<(), GameError> {
        if self.status != GameStatus::Lobby {
            return Err(GameError::AlreadyStarted);
        }
        self.players = user_ids
            .iter()
            .enumerate()
            .map(|(seat, user_id)| Player::new(*user_id, seat))
            .collect();
        Ok(())
    }

    /// `Lobby → Active`: shuffle, deal round 1, seat 0 to draw.
    pub fn start_game(&mut self) -> Result<(), GameError> {
        match self.status {
            GameStatus::Lobby => {}
            GameStatus::Active => return Err(GameError::AlreadyStarted),
            GameStatus::Finished => return Err(GameError::GameNotActive),
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers);
        }
        self.status = GameStatus::Active;
        self.round = FIRST_ROUND;
        self.deal_round();
        Ok(())
    }

    /// Draw the top stock card. Recycles the discard pile (all but its top)
    /// through a seeded shuffle when the stock runs dry.
    pub fn draw_from_stock(&mut self, actor: UserId) -> Result<(), GameError> {
        self.require_turn(actor, TurnPhase::MustDraw)?;
        if self.stock.is_empty() {
            self.recycle_discard()?;
        }
        let card = self.stock.draw().ok_or(GameError::StockEmpty)?;
        self.players[self.turn_index].hand.push(card);
        self.turn_phase = TurnPhase::MustDiscard;
        debug_assert_eq!(self.card_count(), DECK_SIZE);
        Ok(())
    }

    /// Take the top of the discard pile instead of drawing blind.
    pub fn draw_from_discard(&mut self, actor: UserId) -> Result<(), GameError> {
        self.require_turn(actor, TurnPhase::MustDraw)?;
        let card = self.discard.pop().ok_or(GameError::EmptyDiscard)?;
        self.players[self.turn_index].hand.push(card);
        self.turn_phase = TurnPhase::MustDiscard;
        debug_assert_eq!(self.card_count(), DECK_SIZE);
        Ok(())
    }

    /// Lay one or more new melds from the current hand. Runs are stored in
    /// display order. The phase does not change; a discard must follow.
    pub fn lay_melds(&mut self, actor: UserId, laid: &[Meld]) -> Result<(), GameError> {
        self.require_turn(actor, TurnPhase::MustDiscard)?;
        if laid.is_empty() {
            return Err(GameError::InvalidMeld);
        }
        for meld in laid {
            if meld.len() < MIN_MELD_SIZE || !melds::is_valid_meld(meld, self.round) {
                return Err(GameError::InvalidMeld);
            }
        }
        let mut remaining = self.players[self.turn_index].hand.clone();
        for meld in laid {
            if !melds::take_all(&mut remaining, &meld.cards) {
                return Err(GameError::CardNotInHand);
            }
        }
        let normalized: Vec<Meld> = laid.iter().map(|meld| self.normalized(meld)).collect();
        let player = &mut self.players[self.turn_index];
        player.hand = remaining;
        for meld in normalized {
            player.melds.push(meld);
        }
        debug_assert_eq!(self.card_count(), DECK_SIZE);
        Ok(())
    }

    /// Extend any player's existing meld with cards from the current hand.
    /// Locked once the final-turn phase begins.
    pub fn lay_off(
        &mut self,
        actor: UserId,
        target_seat: SeatIndex,
        meld_index: usize,
        cards: &[Card],
    ) -> Result<(), GameError> {
        self.require_turn(actor, TurnPhase::MustDiscard)?;
        if self.final_turn_phase {
            return Err(GameError::FinalTurnPhase);
        }
        let target = self
            .players
            .get(target_seat)
            .and_then(|p| p.melds.get(meld_index))
            .ok_or(GameError::MeldNotFound)?;
        if !melds::can_extend_meld(target, cards, self.round) {
            return Err(GameError::CannotExtendMeld);
        }
        let mut remaining = self.players[self.turn_index].hand.clone();
        if !melds::take_all(&mut remaining, cards) {
            return Err(GameError::CardNotInHand);
        }
        self.players[self.turn_index].hand = remaining;
        let meld = &mut self.players[target_seat].melds[meld_index];
        meld.cards.extend_from_slice(cards);
        if meld.kind == MeldKind::Run {
            meld.cards = melds::run_display_order(&meld.cards, self.round);
        }
        debug_assert_eq!(self.card_count(), DECK_SIZE);
        Ok(())
    }

    /// Discard a card and pass the turn, ending the round once the final
    /// rotation completes.
    pub fn discard_card(&mut self, actor: UserId, card: Card) -> Result<(), GameError> {
        self.require_turn(actor, TurnPhase::MustDiscard)?;
        if !melds::take_one(&mut self.players[self.turn_index].hand, card) {
            return Err(GameError::CardNotInHand);
        }
        self.discard.push(card);
        self.advance_turn();
        Ok(())
    }

    /// Atomically lay melds covering all but one card, then discard the
    /// last. Starts the final-turn phase for everyone else.
    pub fn go_out(
        &mut self,
        actor: UserId,
        laid: &[Meld],
        final_discard: Card,
    ) -> Result<(), GameError> {
        self.require_turn(actor, TurnPhase::MustDiscard)?;
        let seat = self.turn_index;
        if !melds::can_go_out(&self.players[seat].hand, laid, final_discard, self.round) {
            return Err(GameError::CannotGoOut);
        }
        {
            let round = self.round;
            let normalized: Vec<Meld> = laid
                .iter()
                .map(|m| normalize_meld(m, round))
                .collect();
            let player = &mut self.players[seat];
            for meld in &normalized {
                // can_go_out proved the multiset subtraction works.
                melds::take_all(&mut player.hand, &meld.cards);
            }
            player.melds.extend(normalized);
            melds::take_one(&mut player.hand, final_discard);
            player.has_gone_out = true;
        }
        debug!(
            "game {}: seat {seat} went out in round {}",
            self.game_id, self.round
        );
        // A later player may also go out during the final rotation; the
        // fence stays on whoever went out first.
        if self.went_out.is_none() {
            self.went_out = Some(seat);
        }
        self.discard.push(final_discard);
        self.advance_turn();
        self.final_turn_phase = self.went_out.is_some();
        Ok(())
    }

    /// Apply a logged event by routing it through the command it records.
    pub fn apply(&mut self, actor: UserId, event: &GameEvent) -> Result<(), GameError> {
        match event {
            GameEvent::GameStarted => self.start_game(),
            GameEvent::DrewFromStock => self.draw_from_stock(actor),
            GameEvent::DrewFromDiscard => self.draw_from_discard(actor),
            GameEvent::LaidMelds { melds } => self.lay_melds(actor, melds),
            GameEvent::LaidOff {
                target_seat,
                meld_index,
                cards,
            } => self.lay_off(actor, *target_seat, *meld_index, cards),
            GameEvent::Discarded { card } => self.discard_card(actor, *card),
            GameEvent::WentOut { melds, discard } => self.go_out(actor, melds, *discard),
        }
    }

    /// Rebuild a game by replaying its ordered event log into a freshly
    /// seeded state.
    pub fn replay(
        game_id: GameId,
        seed: u64,
        user_ids: &[UserId],
        events: &[(UserId, GameEvent)],
    ) -> Result<Self, GameError> {
        let mut state = Self::new(game_id, seed, user_ids);
        for (actor, event) in events {
            state.apply(*actor, event)?;
        }
        Ok(state)
    }

    /// Project the game for one viewer: everyone's melds, scores, and hand
    /// counts; only the viewer's own cards.
    pub fn snapshot_for(&self, viewer: UserId) -> GameSnapshot {
        let players = self
            .players
            .iter()
            .map(|p| PlayerView {
                user_id: p.user_id,
                seat: p.seat,
                score: p.score,
                has_gone_out: p.has_gone_out,
                melds: p.melds.clone(),
                hand_count: p.hand.len(),
                hand: (p.user_id == viewer).then(|| p.hand.clone()),
            })
            .collect();
        GameSnapshot {
            game_id: self.game_id,
            status: self.status,
            round: self.round,
            turn_index: self.turn_index,
            turn_phase: self.turn_phase,
            is_final_turn_phase: self.final_turn_phase,
            went_out: self.went_out,
            stock_size: self.stock.len(),
            discard_top: self.discard.last().copied(),
            players,
        }
    }

    fn require_turn(&self, actor: UserId, phase: TurnPhase) -> Result<(), GameError> {
        if self.status != GameStatus::Active {
            return Err(GameError::GameNotActive);
        }
        let seat = self.seat_of(actor).ok_or(GameError::NotInGame)?;
        if seat != self.turn_index {
            return Err(GameError::NotYourTurn);
        }
        if self.turn_phase != phase {
            return Err(GameError::WrongPhase);
        }
        Ok(())
    }

    fn normalized(&self, meld: &Meld) -> Meld {
        normalize_meld(meld, self.round)
    }

    /// Shuffle everything but the discard top back into the stock, keyed by
    /// the next draw from the seeded stream.
    fn recycle_discard(&mut self) -> Result<(), GameError> {
        if self.discard.len() <= 1 {
            return Err(GameError::StockEmpty);
        }
        let top = self.discard.pop().expect("discard checked non-empty");
        let recycled = std::mem::take(&mut self.discard);
        self.discard.push(top);
        let mut stock = Deck::from_cards(recycled);
        stock.shuffle(&mut self.rng);
        debug!(
            "game {}: recycled {} discards into the stock",
            self.game_id,
            stock.len()
        );
        self.stock = stock;
        Ok(())
    }

    fn deal_round(&mut self) {
        let hand_size = usize::from(self.round + HAND_SIZE_OFFSET);
        let mut deck = Deck::full();
        deck.shuffle(&mut self.rng);
        for player in &mut self.players {
            player.hand.clear();
            player.melds.clear();
            player.has_gone_out = false;
        }
        // Round-robin deal keeps card destinations a pure function of the
        // shuffle order.
        for _ in 0..hand_size {
            for seat in 0..self.players.len() {
                let card = deck.draw().expect("full deck covers every deal");
                self.players[seat].hand.push(card);
            }
        }
        self.discard = vec![deck.draw().expect("full deck covers the flip")];
        self.stock = deck;
        self.went_out = None;
        self.final_turn_phase = false;
        self.turn_index = usize::from(self.round - 1) % self.players.len();
        self.turn_phase = TurnPhase::MustDraw;
        debug_assert_eq!(self.card_count(), DECK_SIZE);
        debug!(
            "game {}: dealt round {} ({hand_size} cards each), seat {} to act",
            self.game_id, self.round, self.turn_index
        );
    }

    fn advance_turn(&mut self) {
        let next = (self.turn_index + 1) % self.players.len();
        if self.went_out.is_some_and(|out| next == out) {
            self.end_round();
            return;
        }
        self.turn_index = next;
        self.turn_phase = TurnPhase::MustDraw;
    }

    fn end_round(&mut self) {
        for player in &mut self.players {
            let penalty: u32 = player.hand.iter().map(|c| c.points(self.round)).sum();
            player.score += penalty;
        }
        debug!(
            "game {}: round {} over, scores {:?}",
            self.game_id,
            self.round,
            self.players.iter().map(|p| p.score).collect::<Vec<_>>()
        );
        if self.round == LAST_ROUND {
            self.status = GameStatus::Finished;
        } else {
            self.round += 1;
            self.deal_round();
        }
    }
}

fn normalize_meld(meld: &Meld, round: RoundNumber) -> Meld {
    match meld.kind {
        MeldKind::Run => Meld::new(MeldKind::Run, melds::run_display_order(&meld.cards, round)),
        MeldKind::Book => meld.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_game(n: usize) -> GameState {
        let users: Vec<UserId> = (1..=n as i64).collect();
        let mut game = GameState::new(7, 42, &users);
        game.start_game().unwrap();
        game
    }

    fn c(code: &str) -> Card {
        code.parse().expect("test card code")
    }

    fn cards(codes: &[&str]) -> Vec<Card> {
        codes.iter().map(|s| c(s)).collect()
    }

    /// Build a mid-turn game with exact hands, keeping the 116-card
    /// conservation law intact: everything not dealt sits in the stock.
    fn rigged_game(hands: &[&[&str]], discard_top: &str, phase: TurnPhase) -> GameState {
        let users: Vec<UserId> = (1..=hands.len() as i64).collect();
        let mut game = GameState::new(99, 0, &users);
        let mut pool = Vec::new();
        {
            let mut full = Deck::full();
            while let Some(card) = full.draw() {
                pool.push(card);
            }
        }
        for (seat, hand) in hands.iter().enumerate() {
            let hand: Vec<Card> = hand.iter().map(|s| c(s)).collect();
            assert!(
                melds::take_all(&mut pool, &hand),
                "rigged hand must exist in the deck"
            );
            game.players[seat].hand = hand;
        }
        let top = c(discard_top);
        assert!(melds::take_all(&mut pool, &[top]));
        game.discard = vec![top];
        game.stock = Deck::from_cards(pool);
        game.status = GameStatus::Active;
        game.round = 1;
        game.turn_index = 0;
        game.turn_phase = phase;
        assert_eq!(game.card_count(), DECK_SIZE);
        game
    }

    #[test]
    fn laying_a_run_and_discarding_empties_the_hand() {
        // Round 1, hand H4 H5 H6 H7 after the draw.
        let mut game = rigged_game(
            &[&["H4", "H5", "H6", "H7"], &["S3", "S4", "S5"]],
            "CK",
            TurnPhase::MustDiscard,
        );
        game.lay_melds(1, &[Meld::new(MeldKind::Run, cards(&["H4", "H5", "H6"]))])
            .unwrap();
        assert_eq!(game.players()[0].melds.len(), 1);
        assert_eq!(game.players()[0].melds[0].cards.len(), 3);
        assert_eq!(game.players()[0].hand, cards(&["H7"]));

        game.discard_card(1, c("H7")).unwrap();
        assert!(game.players()[0].hand.is_empty());
        assert_eq!(game.turn_index(), 1);
        assert_eq!(game.card_count(), DECK_SIZE);
    }

    #[test]
    fn laying_cards_not_in_hand_fails_atomically() {
        let mut game = rigged_game(
            &[&["H4", "H5", "H6", "H7"], &["S3", "S4", "S5"]],
            "CK",
            TurnPhase::MustDiscard,
        );
        let before = game.clone();
        // Two melds, the second impossible: nothing may be consumed.
        let err = game.lay_melds(
            1,
            &[
                Meld::new(MeldKind::Run, cards(&["H4", "H5", "H6"])),
                Meld::new(MeldKind::Book, cards(&["DQ", "SQ", "CQ"])),
            ],
        );
        assert_eq!(err, Err(GameError::CardNotInHand));
        assert_eq!(game, before);
    }

    #[test]
    fn lay_off_extends_another_players_meld() {
        // Seat 0 melds a run and discards; seat 1 draws and lays off H7.
        let mut game = rigged_game(
            &[&["H4", "H5", "H6", "SQ"], &["H7", "C3", "C9"]],
            "CK",
            TurnPhase::MustDiscard,
        );
        game.lay_melds(1, &[Meld::new(MeldKind::Run, cards(&["H4", "H5", "H6"]))])
            .unwrap();
        game.discard_card(1, c("SQ")).unwrap();

        game.draw_from_stock(2).unwrap();
        game.lay_off(2, 0, 0, &cards(&["H7"])).unwrap();
        assert_eq!(game.players()[0].melds[0].cards.len(), 4);
        assert_eq!(*game.players()[0].melds[0].cards.last().unwrap(), c("H7"));
        assert!(!game.players()[1].hand.contains(&c("H7")));
        assert_eq!(game.card_count(), DECK_SIZE);
    }

    #[test]
    fn lay_off_rejects_bad_targets() {
        let mut game = rigged_game(
            &[&["H4", "H5", "H6", "SQ"], &["H7", "C3", "C9"]],
            "CK",
            TurnPhase::MustDiscard,
        );
        game.lay_melds(1, &[Meld::new(MeldKind::Run, cards(&["H4", "H5", "H6"]))])
            .unwrap();
        assert_eq!(
            game.lay_off(1, 0, 5, &cards(&["SQ"])),
            Err(GameError::MeldNotFound)
        );
        assert_eq!(
            game.lay_off(1, 3, 0, &cards(&["SQ"])),
            Err(GameError::MeldNotFound)
        );
        assert_eq!(
            game.lay_off(1, 0, 0, &cards(&["SQ"])),
            Err(GameError::CannotExtendMeld)
        );
    }

    #[test]
    fn going_out_locks_lay_offs_for_the_final_rotation() {
        let mut game = rigged_game(
            &[&["H4", "H5", "H6", "C8"], &["H7", "C3", "C9"]],
            "CK",
            TurnPhase::MustDiscard,
        );
        game.go_out(
            1,
            &[Meld::new(MeldKind::Run, cards(&["H4", "H5", "H6"]))],
            c("C8"),
        )
        .unwrap();
        assert!(game.is_final_turn_phase());
        assert_eq!(game.went_out(), Some(0));
        assert!(game.players()[0].has_gone_out);
        assert!(game.players()[0].hand.is_empty());
        assert_eq!(game.turn_index(), 1);

        game.draw_from_stock(2).unwrap();
        let before = game.clone();
        assert_eq!(
            game.lay_off(2, 0, 0, &cards(&["H7"])),
            Err(GameError::FinalTurnPhase)
        );
        assert_eq!(game, before);

        // Laying a fresh meld is still allowed during the final turn.
        assert!(game.players()[1].hand.contains(&c("H7")));
    }

    #[test]
    fn go_out_with_leftover_cards_is_rejected() {
        let mut game = rigged_game(
            &[&["H4", "H5", "H6", "C8", "C9"], &["H7", "C3", "D9"]],
            "CK",
            TurnPhase::MustDiscard,
        );
        let before = game.clone();
        let err = game.go_out(
            1,
            &[Meld::new(MeldKind::Run, cards(&["H4", "H5", "H6"]))],
            c("C8"),
        );
        assert_eq!(err, Err(GameError::CannotGoOut));
        assert_eq!(game, before);
    }

    #[test]
    fn round_ends_after_each_other_player_takes_one_turn() {
        let mut game = rigged_game(
            &[&["H4", "H5", "H6", "C8"], &["JK", "C3", "C9"]],
            "CK",
            TurnPhase::MustDiscard,
        );
        game.go_out(
            1,
            &[Meld::new(MeldKind::Run, cards(&["H4", "H5", "H6"]))],
            c("C8"),
        )
        .unwrap();

        // Seat 1's single final turn.
        game.draw_from_stock(2).unwrap();
        let card = game.players()[1]
            .hand
            .iter()
            .copied()
            .find(|c| *c != Card::Joker)
            .unwrap();
        game.discard_card(2, card).unwrap();

        // Round 1 is over: seat 0 scored nothing, seat 1 keeps a joker
        // (50) plus two naturals, and round 2 is dealt.
        assert_eq!(game.round(), 2);
        assert!(!game.is_final_turn_phase());
        assert_eq!(game.went_out(), None);
        assert_eq!(game.players()[0].score, 0);
        assert!(game.players()[1].score >= 50);
        assert_eq!(game.turn_index(), 1);
        for player in game.players() {
            assert_eq!(player.hand.len(), 4);
            assert!(player.melds.is_empty());
        }
        assert_eq!(game.card_count(), DECK_SIZE);
    }

    #[test]
    fn second_player_going_out_keeps_the_original_fence() {
        let mut game = rigged_game(
            &[
                &["H4", "H5", "H6", "C8"],
                &["S4", "S5", "S6"],
                &["C3", "C9", "DX"],
            ],
            "CK",
            TurnPhase::MustDiscard,
        );
        game.go_out(
            1,
            &[Meld::new(MeldKind::Run, cards(&["H4", "H5", "H6"]))],
            c("C8"),
        )
        .unwrap();
        assert_eq!(game.went_out(), Some(0));

        // Seat 1 also goes out on their final turn: melds their run and
        // discards whatever they drew.
        game.draw_from_stock(2).unwrap();
        let drawn = *game.players()[1].hand.last().unwrap();
        game.go_out(
            2,
            &[Meld::new(MeldKind::Run, cards(&["S4", "S5", "S6"]))],
            drawn,
        )
        .unwrap();
        assert!(game.players()[1].has_gone_out);

        // Fence still points at seat 0; seat 2 gets the last word.
        assert_eq!(game.went_out(), Some(0));
        assert_eq!(game.round(), 1);
        game.draw_from_stock(3).unwrap();
        let card = game.players()[2].hand[0];
        game.discard_card(3, card).unwrap();
        assert_eq!(game.round(), 2);
    }

    #[test]
    fn start_deals_round_one() {
        let game = active_game(3);
        assert_eq!(game.status(), GameStatus::Active);
        assert_eq!(game.round(), 1);
        assert_eq!(game.turn_index(), 0);
        assert_eq!(game.turn_phase(), TurnPhase::MustDraw);
        for player in game.players() {
            assert_eq!(player.hand.len(), 3);
        }
        assert_eq!(game.card_count(), DECK_SIZE);
    }

    #[test]
    fn start_requires_two_players() {
        let mut game = GameState::new(1, 0, &[1]);
        assert_eq!(game.start_game(), Err(GameError::NotEnoughPlayers));
        assert_eq!(game.status(), GameStatus::Lobby);
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut game = active_game(2);
        assert_eq!(game.start_game(), Err(GameError::AlreadyStarted));
    }

    #[test]
    fn commands_out_of_phase_leave_state_unchanged() {
        let mut game = active_game(2);
        let before = game.clone();
        assert_eq!(game.discard_card(1, Card::Joker), Err(GameError::WrongPhase));
        assert_eq!(game.draw_from_stock(2), Err(GameError::NotYourTurn));
        assert_eq!(game.draw_from_stock(99), Err(GameError::NotInGame));
        assert_eq!(game, before);
    }

    #[test]
    fn draw_then_discard_advances_the_turn() {
        let mut game = active_game(2);
        game.draw_from_stock(1).unwrap();
        assert_eq!(game.turn_phase(), TurnPhase::MustDiscard);
        assert_eq!(game.players()[0].hand.len(), 4);
        let card = game.players()[0].hand[0];
        game.discard_card(1, card).unwrap();
        assert_eq!(game.turn_index(), 1);
        assert_eq!(game.turn_phase(), TurnPhase::MustDraw);
        assert_eq!(game.players()[0].hand.len(), 3);
        assert_eq!(game.card_count(), DECK_SIZE);
    }

    #[test]
    fn draw_from_discard_takes_the_top() {
        let mut game = active_game(2);
        let top = game.snapshot_for(1).discard_top.unwrap();
        game.draw_from_discard(1).unwrap();
        assert_eq!(*game.players()[0].hand.last().unwrap(), top);
    }

    #[test]
    fn discarding_a_card_not_in_hand_fails() {
        use crate::game::entities::{Rank, Suit};

        let mut game = active_game(2);
        game.draw_from_stock(1).unwrap();
        // A 4-card hand cannot cover all 55 distinct suited cards.
        let absent = Suit::ALL
            .iter()
            .flat_map(|s| Rank::ALL.iter().map(|r| Card::Suited(*s, *r)))
            .find(|c| !game.players()[0].hand.contains(c))
            .unwrap();
        let before = game.clone();
        assert_eq!(game.discard_card(1, absent), Err(GameError::CardNotInHand));
        assert_eq!(game, before);
    }

    #[test]
    fn replay_reproduces_live_state() {
        let users = vec![11, 22, 33];
        let mut live = GameState::new(5, 2024, &users);
        let mut log: Vec<(UserId, GameEvent)> = Vec::new();

        live.start_game().unwrap();
        log.push((11, GameEvent::GameStarted));

        // Three scripted turns.
        for _ in 0..3 {
            let actor = live.current_user().unwrap();
            live.draw_from_stock(actor).unwrap();
            log.push((actor, GameEvent::DrewFromStock));
            let seat = live.turn_index();
            let card = live.players()[seat].hand[0];
            live.discard_card(actor, card).unwrap();
            log.push((actor, GameEvent::Discarded { card }));
        }

        let replayed = GameState::replay(5, 2024, &users, &log).unwrap();
        assert_eq!(replayed, live);
    }

    #[test]
    fn snapshot_hides_other_hands() {
        let game = active_game(3);
        let snap = game.snapshot_for(2);
        for view in &snap.players {
            if view.user_id == 2 {
                assert_eq!(view.hand.as_ref().unwrap().len(), view.hand_count);
            } else {
                assert!(view.hand.is_none());
                assert_eq!(view.hand_count, 3);
            }
        }
        // 9 cards in hands plus the discard flip leave 106 in the stock.
        assert_eq!(snap.stock_size, DECK_SIZE - 10);
        assert!(snap.discard_top.is_some());
    }
}
