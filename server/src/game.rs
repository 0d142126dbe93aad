//! Battle resolution.
//!
//! Two robots exchange one move each per round. Both moves are resolved at
//! once: heals first, then damage, reduced by a defending target.

use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use shared::{Action, MatchStatus, PartsConfiguration, RoundReport};

pub const BASE_HEALTH: i32 = 50;
pub const BASE_ATTACK: i32 = 10;
pub const BASE_DEFEND: i32 = 5;
/// Rounds before the healthier robot is declared the winner.
pub const MAX_TURNS: u32 = 19;
/// Rounds a charge or heal stays unavailable after use.
pub const COOLDOWN: u32 = 2;

/// Bonus a numeric part id gives to its stat.
fn part_bonus(part: &str) -> i32 {
    part.parse::<u32>().map(|n| (n % 3) as i32).unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Robot {
    pub attack: i32,
    pub defend: i32,
    pub max_health: i32,
    pub health: i32,
    pub charge_cooldown: u32,
    pub heal_cooldown: u32,
}

impl Robot {
    /// Arms (slots 2 and 3) add attack; torso and legs (slots 1 and 4) add defence.
    pub fn from_parts(parts: &PartsConfiguration) -> Self {
        let attack = BASE_ATTACK + part_bonus(&parts[2]) + part_bonus(&parts[3]);
        let defend = BASE_DEFEND + part_bonus(&parts[1]) + part_bonus(&parts[4]);
        let max_health = BASE_HEALTH + 2 * defend;
        Self {
            attack,
            defend,
            max_health,
            health: max_health,
            charge_cooldown: 0,
            heal_cooldown: 0,
        }
    }

    fn is_down(&self) -> bool {
        self.health < 1
    }

    /// The move that actually takes effect; one still cooling down does nothing.
    fn effective(&self, action: Action) -> Option<Action> {
        match action {
            Action::Charge if self.charge_cooldown > 0 => None,
            Action::Heal if self.heal_cooldown > 0 => None,
            other => Some(other),
        }
    }
}

pub struct Battle<R: Rng = StdRng> {
    robots: [Robot; 2],
    turn: u32,
    over: bool,
    rng: R,
}

impl<R: Rng> Battle<R> {
    pub fn new(parts: [&PartsConfiguration; 2], rng: R) -> Self {
        Self {
            robots: parts.map(Robot::from_parts),
            turn: 0,
            over: false,
            rng,
        }
    }

    pub fn robot(&self, seat: usize) -> &Robot {
        &self.robots[seat]
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    fn d6(&mut self) -> i32 {
        self.rng.gen_range(1..=6)
    }

    /// Reports sent right after both players confirmed.
    pub fn opening_reports(&self) -> [RoundReport; 2] {
        [0, 1].map(|seat| self.report(seat, MatchStatus::None, None))
    }

    fn report(&self, seat: usize, status: MatchStatus, opponent_action: Option<Action>) -> RoundReport {
        let me = &self.robots[seat];
        let other = &self.robots[1 - seat];
        RoundReport {
            health: me.health,
            opponent_health: other.health,
            status,
            charge_cooldown: me.charge_cooldown,
            heal_cooldown: me.heal_cooldown,
            turn: self.turn,
            opponent_action,
        }
    }

    /// Resolves one round and returns each seat's report.
    pub fn play_round(&mut self, actions: [Action; 2]) -> [RoundReport; 2] {
        self.turn += 1;

        let statuses = match actions {
            [Action::Forfeit, Action::Forfeit] => Some([MatchStatus::Lose, MatchStatus::Lose]),
            [Action::Forfeit, _] => Some([MatchStatus::Forfeit, MatchStatus::Win]),
            [_, Action::Forfeit] => Some([MatchStatus::Win, MatchStatus::Forfeit]),
            _ => None,
        };
        let statuses = match statuses {
            Some(statuses) => statuses,
            None => {
                self.resolve(actions);
                self.standings()
            }
        };

        self.over = statuses[0].is_final();
        debug!(
            "Turn {}: {:?} -> {} / {}",
            self.turn, actions, self.robots[0].health, self.robots[1].health
        );
        [
            self.report(0, statuses[0], Some(actions[1])),
            self.report(1, statuses[1], Some(actions[0])),
        ]
    }

    fn resolve(&mut self, actions: [Action; 2]) {
        let effective = [
            self.robots[0].effective(actions[0]),
            self.robots[1].effective(actions[1]),
        ];

        let mut damage = [0; 2];
        for seat in 0..2 {
            damage[1 - seat] = match effective[seat] {
                Some(Action::Attack) => self.robots[seat].attack,
                Some(Action::Charge) => self.robots[seat].attack + self.d6(),
                _ => 0,
            };
        }

        for seat in 0..2 {
            if effective[seat] == Some(Action::Defend) && damage[seat] > 0 {
                let block = self.robots[seat].defend + self.d6();
                damage[seat] = (damage[seat] - block).max(0);
            }
        }

        for seat in 0..2 {
            if effective[seat] == Some(Action::Heal) {
                let amount = self.robots[seat].defend + self.d6();
                let robot = &mut self.robots[seat];
                robot.health = (robot.health + amount).min(robot.max_health);
            }
        }

        for seat in 0..2 {
            let robot = &mut self.robots[seat];
            robot.health -= damage[seat];
            robot.charge_cooldown = robot.charge_cooldown.saturating_sub(1);
            robot.heal_cooldown = robot.heal_cooldown.saturating_sub(1);
            match effective[seat] {
                Some(Action::Charge) => robot.charge_cooldown = COOLDOWN,
                Some(Action::Heal) => robot.heal_cooldown = COOLDOWN,
                _ => {}
            }
        }
    }

    fn standings(&self) -> [MatchStatus; 2] {
        let [first, second] = &self.robots;
        let by_health = || {
            if first.health > second.health {
                [MatchStatus::Win, MatchStatus::Lose]
            } else if first.health < second.health {
                [MatchStatus::Lose, MatchStatus::Win]
            } else {
                [MatchStatus::Draw, MatchStatus::Draw]
            }
        };

        match (first.is_down(), second.is_down()) {
            (true, true) => by_health(),
            (true, false) => [MatchStatus::Lose, MatchStatus::Win],
            (false, true) => [MatchStatus::Win, MatchStatus::Lose],
            (false, false) if self.turn >= MAX_TURNS => by_health(),
            (false, false) => [MatchStatus::None, MatchStatus::None],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn parts(ids: [&str; 6]) -> PartsConfiguration {
        PartsConfiguration::new(ids).unwrap()
    }

    fn battle() -> Battle<StdRng> {
        let plain = parts(["0", "0", "0", "0", "0", "0"]);
        Battle::new([&plain, &plain], StdRng::seed_from_u64(42))
    }

    #[test]
    fn test_robot_stats_from_parts() {
        let robot = Robot::from_parts(&parts(["9", "1", "2", "5", "4", "7"]));
        assert_eq!(robot.attack, BASE_ATTACK + 2 + 2);
        assert_eq!(robot.defend, BASE_DEFEND + 1 + 1);
        assert_eq!(robot.max_health, BASE_HEALTH + 2 * robot.defend);
        assert_eq!(robot.health, robot.max_health);

        let named = Robot::from_parts(&parts(["H", "T", "LA", "RA", "L", "X"]));
        assert_eq!(named.attack, BASE_ATTACK);
        assert_eq!(named.defend, BASE_DEFEND);
    }

    #[test]
    fn test_opening_reports() {
        let battle = battle();
        let [first, second] = battle.opening_reports();
        assert_eq!(first.turn, 0);
        assert_eq!(first.health, 60);
        assert_eq!(first.opponent_health, 60);
        assert_eq!(first.status, MatchStatus::None);
        assert_eq!(first.opponent_action, None);
        assert_eq!(second.health, 60);
    }

    #[test]
    fn test_attacks_trade_exact_damage() {
        let mut battle = battle();
        let [first, second] = battle.play_round([Action::Attack, Action::Attack]);
        assert_eq!(first.health, 50);
        assert_eq!(first.opponent_health, 50);
        assert_eq!(first.turn, 1);
        assert_eq!(first.opponent_action, Some(Action::Attack));
        assert_eq!(second.health, 50);
        assert!(!battle.is_over());
    }

    #[test]
    fn test_defend_reduces_damage() {
        let mut battle = battle();
        let [attacker, defender] = battle.play_round([Action::Attack, Action::Defend]);
        // Block is defend + d6 = 6..=11 against 10 damage.
        assert!(attacker.opponent_health >= 60 - 4);
        assert_eq!(defender.health, attacker.opponent_health);
        assert_eq!(attacker.health, 60);
    }

    #[test]
    fn test_charge_hits_harder_and_cools_down() {
        let mut battle = battle();
        let [charger, _] = battle.play_round([Action::Charge, Action::Defend]);
        assert_eq!(charger.charge_cooldown, COOLDOWN);

        let mut battle = self::battle();
        let [charger, target] = battle.play_round([Action::Charge, Action::Attack]);
        let dealt = 60 - target.health;
        assert!((11..=16).contains(&dealt));
        assert_eq!(charger.health, 50);

        // Still cooling: the charge does nothing.
        let [_, target] = battle.play_round([Action::Charge, Action::Attack]);
        assert_eq!(target.health, 60 - dealt);
        let [charger, _] = battle.play_round([Action::Defend, Action::Defend]);
        assert_eq!(charger.charge_cooldown, 0);
    }

    #[test]
    fn test_heal_is_capped_and_cools_down() {
        let mut battle = battle();
        let [healer, _] = battle.play_round([Action::Heal, Action::Defend]);
        assert_eq!(healer.health, 60);
        assert_eq!(healer.heal_cooldown, COOLDOWN);

        let mut battle = self::battle();
        battle.play_round([Action::Attack, Action::Attack]);
        let before = battle.robot(0).health;
        assert_eq!(before, 50);
        let [healer, _] = battle.play_round([Action::Heal, Action::Defend]);
        assert!(healer.health > before);
        assert!(healer.health <= 60);
    }

    #[test]
    fn test_forfeit_rules() {
        let mut battle = battle();
        let [quitter, other] = battle.play_round([Action::Forfeit, Action::Attack]);
        assert_eq!(quitter.status, MatchStatus::Forfeit);
        assert_eq!(other.status, MatchStatus::Win);
        assert_eq!(other.opponent_action, Some(Action::Forfeit));
        assert_eq!(quitter.health, 60);
        assert!(battle.is_over());

        let mut battle = self::battle();
        let [first, second] = battle.play_round([Action::Forfeit, Action::Forfeit]);
        assert_eq!(first.status, MatchStatus::Lose);
        assert_eq!(second.status, MatchStatus::Lose);
    }

    #[test]
    fn test_knockout() {
        let strong = parts(["0", "2", "2", "2", "2", "0"]);
        let weak = parts(["0", "0", "0", "0", "0", "0"]);
        let mut battle = Battle::new([&strong, &weak], StdRng::seed_from_u64(1));

        let mut last = battle.opening_reports();
        while !last[0].status.is_final() {
            last = battle.play_round([Action::Attack, Action::Attack]);
        }
        assert_eq!(last[0].status, MatchStatus::Win);
        assert_eq!(last[1].status, MatchStatus::Lose);
        assert!(last[1].health < 1);
    }

    #[test]
    fn test_mirror_knockout_is_draw() {
        let mut battle = battle();
        let mut last = battle.opening_reports();
        while !last[0].status.is_final() {
            last = battle.play_round([Action::Attack, Action::Attack]);
        }
        assert_eq!(last[0].health, 0);
        assert_eq!(last[0].status, MatchStatus::Draw);
        assert_eq!(last[1].status, MatchStatus::Draw);
    }

    #[test]
    fn test_turn_limit_favours_healthier() {
        let mut battle = battle();
        battle.play_round([Action::Attack, Action::Defend]);
        let mut last = battle.opening_reports();
        while !last[0].status.is_final() {
            last = battle.play_round([Action::Defend, Action::Defend]);
        }
        assert_eq!(battle.turn(), MAX_TURNS);
        assert_eq!(last[0].turn, MAX_TURNS);
        if last[0].health > last[0].opponent_health {
            assert_eq!(last[0].status, MatchStatus::Win);
        } else {
            assert_eq!(last[0].status, MatchStatus::Draw);
        }
    }
}
