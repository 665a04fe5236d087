//! Home card deck
//!
//! One card per activity, in a fixed order (feeding, watering, elimination),
//! with a single cursor. The deck is rebuilt from the latest home bundle and
//! re-derived against the clock; a card marked completed locally shows a full
//! cycle ahead until the server reports a newer event.

use chrono::{DateTime, Local};
use petlog_api::{ActivityKind, HomeData, NewActivityLog};
use std::collections::HashMap;
use tracing::debug;

use crate::schedule::{
    ActivityStatus, derive_status_with_override, describe_elimination, describe_status,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// What a card shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardState {
    Scheduled {
        status: ActivityStatus,
        cycle_hours: u32,
    },
    /// Elimination has no cycle, only today's count
    Tally { count_today: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityCard {
    pub kind: ActivityKind,
    pub state: CardState,
    pub last_actor_name: String,
    pub last_note: String,
    /// Set while a local completion is waiting for the server to catch up
    pub just_completed: bool,
}

impl ActivityCard {
    /// Card headline; `pet_name` is used by the feeding reminder
    pub fn headline(&self, pet_name: &str) -> String {
        match &self.state {
            CardState::Scheduled { status, .. } => describe_status(self.kind, status, pet_name),
            CardState::Tally { count_today } => describe_elimination(*count_today),
        }
    }

    pub fn actor_label(&self) -> &'static str {
        match self.kind {
            ActivityKind::Elimination => "보호자",
            _ => "급여자",
        }
    }

    pub fn status(&self) -> Option<ActivityStatus> {
        match self.state {
            CardState::Scheduled { status, .. } => Some(status),
            CardState::Tally { .. } => None,
        }
    }
}

/// Local completion waiting for server confirmation
#[derive(Debug, Clone)]
struct Completion {
    /// `last_event_time` (scheduled kinds) the server had reported when marked
    seen_event_time: Option<DateTime<Local>>,
    /// Tally the server had reported when marked
    seen_count: u32,
    actor_name: String,
    note: String,
}

/// Ordered activity cards with a cursor
#[derive(Debug, Default)]
pub struct CardDeck {
    source: Option<HomeData>,
    cards: Vec<ActivityCard>,
    index: usize,
    completions: HashMap<ActivityKind, Completion>,
}

impl CardDeck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the underlying bundle and re-derive every card.
    ///
    /// `None` empties the deck (no group joined yet). Local completions
    /// the new bundle has caught up with are dropped.
    pub fn rebuild(&mut self, home: Option<&HomeData>, now: DateTime<Local>) {
        self.source = home.cloned();

        match &self.source {
            Some(home) => {
                self.completions.retain(|kind, completion| {
                    let stale = match home.schedule(*kind) {
                        Some(schedule) => completion
                            .seen_event_time
                            .is_some_and(|seen| schedule.last_event_time > seen),
                        None => home.elimination.count_today > completion.seen_count,
                    };
                    if stale {
                        debug!(kind = %kind, "Server caught up with local completion");
                    }
                    !stale
                });
            }
            None => self.completions.clear(),
        }

        self.rederive(now);
    }

    /// Re-derive statuses against `now` without changing the bundle.
    pub fn rederive(&mut self, now: DateTime<Local>) {
        self.cards = match &self.source {
            Some(home) => ActivityKind::ALL
                .iter()
                .map(|kind| self.build_card(home, *kind, now))
                .collect(),
            None => Vec::new(),
        };
        self.index = self.index.min(self.cards.len().saturating_sub(1));
    }

    fn build_card(&self, home: &HomeData, kind: ActivityKind, now: DateTime<Local>) -> ActivityCard {
        let completion = self.completions.get(&kind);

        let (state, actor, note) = match home.schedule(kind) {
            Some(schedule) => (
                CardState::Scheduled {
                    status: derive_status_with_override(schedule, now, completion.is_some()),
                    cycle_hours: schedule.cycle_hours,
                },
                &schedule.last_actor_name,
                &schedule.last_note,
            ),
            None => {
                let server_count = home.elimination.count_today;
                let count_today = match completion {
                    Some(c) => server_count.max(c.seen_count.saturating_add(1)),
                    None => server_count,
                };
                (
                    CardState::Tally { count_today },
                    &home.elimination.last_actor_name,
                    &home.elimination.last_note,
                )
            }
        };

        let (last_actor_name, last_note) = match completion {
            Some(c) => (c.actor_name.clone(), c.note.clone()),
            None => (actor.clone(), note.clone()),
        };

        ActivityCard {
            kind,
            state,
            last_actor_name,
            last_note,
            just_completed: completion.is_some(),
        }
    }

    /// Record a successful local submission for `kind`.
    ///
    /// Scheduled cards show a full cycle remaining and the elimination
    /// tally goes up by one, until a rebuild brings newer server data.
    pub fn mark_completed(&mut self, kind: ActivityKind, log: &NewActivityLog, now: DateTime<Local>) {
        let Some(home) = &self.source else {
            return;
        };

        let completion = Completion {
            seen_event_time: home.schedule(kind).map(|s| s.last_event_time),
            seen_count: home.elimination.count_today,
            actor_name: log.actor_name.clone(),
            note: log.note.clone().unwrap_or_default(),
        };
        self.completions.insert(kind, completion);
        self.rederive(now);
    }

    pub fn is_marked_completed(&self, kind: ActivityKind) -> bool {
        self.completions.contains_key(&kind)
    }

    /// Step the cursor; never wraps.
    pub fn advance(&mut self, direction: Direction) {
        match direction {
            Direction::Next => {
                if self.index + 1 < self.cards.len() {
                    self.index += 1;
                }
            }
            Direction::Previous => {
                if self.index > 0 {
                    self.index -= 1;
                }
            }
        }
    }

    /// Translate a drag of `delta` into at most one step.
    ///
    /// Positive deltas move to the next card, negative to the previous one;
    /// `|delta| <= threshold` is ignored.
    pub fn jump_to(&mut self, delta: f64, threshold: f64) {
        if delta.abs() <= threshold || delta.is_nan() {
            return;
        }
        if delta > 0.0 {
            self.advance(Direction::Next);
        } else {
            self.advance(Direction::Previous);
        }
    }

    /// A tap moves to the next card
    pub fn tap(&mut self) {
        self.advance(Direction::Next);
    }

    pub fn current(&self) -> Option<&ActivityCard> {
        self.cards.get(self.index)
    }

    pub fn card(&self, kind: ActivityKind) -> Option<&ActivityCard> {
        self.cards.iter().find(|c| c.kind == kind)
    }

    pub fn cards(&self) -> &[ActivityCard] {
        &self.cards
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn source(&self) -> Option<&HomeData> {
        self.source.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use petlog_api::{ActivitySchedule, EliminationLog, Gender, Profile};
    use std::time::Duration;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 10, 31, 12, 0, 0).unwrap()
    }

    fn home(feeding_last: DateTime<Local>, poop_count: u32) -> HomeData {
        HomeData {
            profile: Profile {
                image_url: String::new(),
                name: "여름".into(),
                age: "2개월".into(),
                weight_kg: 1.5,
                gender: Gender::Female,
            },
            feeding: ActivitySchedule::new(6, feeding_last).with_actor("서은", "조금만"),
            watering: ActivitySchedule::new(6, now()).with_actor("예린", ""),
            elimination: EliminationLog {
                count_today: poop_count,
                last_actor_name: "동하".into(),
                last_note: "굿".into(),
            },
            invite_code: "ABC123".into(),
        }
    }

    fn deck() -> CardDeck {
        let mut deck = CardDeck::new();
        deck.rebuild(Some(&home(now() - TimeDelta::hours(7), 2)), now());
        deck
    }

    #[test]
    fn cards_follow_fixed_order() {
        let deck = deck();
        let kinds: Vec<_> = deck.cards().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![ActivityKind::Feeding, ActivityKind::Watering, ActivityKind::Elimination]
        );
        assert_eq!(deck.index(), 0);
        assert_eq!(
            deck.cards()[0].status(),
            Some(ActivityStatus::Overdue {
                elapsed: Duration::from_secs(3600)
            })
        );
        assert_eq!(deck.cards()[2].state, CardState::Tally { count_today: 2 });
    }

    #[test]
    fn advance_does_not_wrap() {
        let mut deck = deck();
        deck.advance(Direction::Previous);
        assert_eq!(deck.index(), 0);

        deck.advance(Direction::Next);
        deck.advance(Direction::Next);
        assert_eq!(deck.index(), 2);
        deck.advance(Direction::Next);
        assert_eq!(deck.index(), 2);
        deck.tap();
        assert_eq!(deck.index(), 2);
    }

    #[test]
    fn jump_respects_threshold() {
        let mut deck = deck();
        deck.advance(Direction::Next);

        deck.jump_to(30.0, 50.0);
        assert_eq!(deck.index(), 1);
        deck.jump_to(50.0, 50.0);
        assert_eq!(deck.index(), 1);

        deck.jump_to(-60.0, 50.0);
        assert_eq!(deck.index(), 0);
        deck.jump_to(-60.0, 50.0);
        assert_eq!(deck.index(), 0);

        deck.jump_to(120.0, 50.0);
        assert_eq!(deck.index(), 1);
    }

    #[test]
    fn empty_deck_ignores_navigation() {
        let mut deck = CardDeck::new();
        deck.advance(Direction::Next);
        deck.tap();
        assert!(deck.current().is_none());
        assert_eq!(deck.index(), 0);
    }

    #[test]
    fn completion_overrides_until_server_catches_up() {
        let mut deck = deck();
        let log = NewActivityLog::new("지민", Some("다 먹음".into()));
        deck.mark_completed(ActivityKind::Feeding, &log, now());

        let card = deck.card(ActivityKind::Feeding).unwrap();
        assert!(card.just_completed);
        assert_eq!(card.last_actor_name, "지민");
        assert_eq!(
            card.status(),
            Some(ActivityStatus::Upcoming {
                remaining: Duration::from_secs(6 * 3600)
            })
        );

        // A rebuild with the same server data keeps the override
        deck.rebuild(Some(&home(now() - TimeDelta::hours(7), 2)), now());
        assert!(deck.is_marked_completed(ActivityKind::Feeding));

        // A newer event time from the server clears it
        let later = now() + TimeDelta::minutes(1);
        deck.rebuild(Some(&home(now(), 2)), later);
        assert!(!deck.is_marked_completed(ActivityKind::Feeding));
        let card = deck.card(ActivityKind::Feeding).unwrap();
        assert_eq!(card.last_actor_name, "서은");
        assert_eq!(
            card.status(),
            Some(ActivityStatus::Upcoming {
                remaining: Duration::from_secs(6 * 3600 - 60)
            })
        );
    }

    #[test]
    fn elimination_completion_bumps_count_once() {
        let mut deck = deck();
        let log = NewActivityLog::new("동하", None);
        deck.mark_completed(ActivityKind::Elimination, &log, now());
        assert_eq!(
            deck.card(ActivityKind::Elimination).unwrap().state,
            CardState::Tally { count_today: 3 }
        );

        deck.rebuild(Some(&home(now() - TimeDelta::hours(7), 3)), now());
        assert!(!deck.is_marked_completed(ActivityKind::Elimination));
        assert_eq!(
            deck.card(ActivityKind::Elimination).unwrap().state,
            CardState::Tally { count_today: 3 }
        );
    }

    #[test]
    fn clearing_the_bundle_empties_the_deck() {
        let mut deck = deck();
        deck.advance(Direction::Next);
        deck.rebuild(None, now());
        assert!(deck.is_empty());
        assert_eq!(deck.index(), 0);
    }

    #[test]
    fn headline_uses_pet_name() {
        let mut deck = CardDeck::new();
        deck.rebuild(Some(&home(now() - TimeDelta::hours(6), 0)), now());
        assert_eq!(
            deck.current().unwrap().headline("여름이"),
            "여름이 밥을 챙겨주세요"
        );
        assert_eq!(deck.current().unwrap().actor_label(), "급여자");
    }
}
