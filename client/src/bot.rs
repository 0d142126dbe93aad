//! A scripted player: queues, confirms and plays random moves until the match ends.

use crate::error::ClientError;
use crate::network::GameClient;
use crate::transport::Connector;
use log::{debug, info};
use rand::Rng;
use shared::{Action, MatchStart, PartsConfiguration, RoundReport};

/// Below this health the bot heals whenever the cooldown allows.
const LOW_HEALTH: i32 = 20;

const MOVES: [Action; 4] = [Action::Attack, Action::Defend, Action::Heal, Action::Charge];

#[derive(Debug, Clone)]
pub struct MatchSummary {
    pub opponent_id: String,
    pub opponent_parts: Option<PartsConfiguration>,
    pub final_report: RoundReport,
    pub rounds: u32,
}

/// Picks the next move from the last report. Never forfeits.
pub fn choose_action<R: Rng>(report: &RoundReport, rng: &mut R) -> Action {
    if report.health < LOW_HEALTH && report.heal_cooldown == 0 {
        return Action::Heal;
    }
    loop {
        let action = MOVES[rng.gen_range(0..MOVES.len())];
        let cooling = match action {
            Action::Heal => report.heal_cooldown > 0,
            Action::Charge => report.charge_cooldown > 0,
            _ => false,
        };
        if !cooling {
            return action;
        }
    }
}

/// Queues up to `attempts` times and plays the first match found.
///
/// Returns `None` when every attempt ended without an opponent. After
/// `rounds_limit` rounds the bot forfeits so a stuck match cannot hold it.
pub async fn play_match<C: Connector, R: Rng + Send>(
    client: &GameClient<C>,
    mut rng: R,
    attempts: u32,
    rounds_limit: u32,
) -> Result<Option<MatchSummary>, ClientError> {
    for attempt in 1..=attempts {
        client.request_match().await?;
        let assignment = match client.start_match().await? {
            MatchStart::Matched(assignment) => assignment,
            MatchStart::NoOpponent => {
                info!("Attempt {}/{}: nobody to play", attempt, attempts);
                continue;
            }
        };

        client.confirm().await?;
        let mut report = client.get_result().await?;
        let mut rounds = 0;
        while !report.status.is_final() {
            let action = if rounds >= rounds_limit {
                Action::Forfeit
            } else {
                choose_action(&report, &mut rng)
            };
            client.make_move(action).await?;
            report = client.get_result().await?;
            rounds += 1;
            debug!(
                "Round {}: {} vs {} ({})",
                report.turn, report.health, report.opponent_health, report.status
            );
        }

        let opponent_parts = client.other_parts().map(|parts| (*parts).clone());
        client.end_match().await?;
        info!(
            "Match against {} finished: {}",
            assignment.opponent_id, report.status
        );
        return Ok(Some(MatchSummary {
            opponent_id: assignment.opponent_id,
            opponent_parts,
            final_report: report,
            rounds,
        }));
    }
    Ok(None)
}
