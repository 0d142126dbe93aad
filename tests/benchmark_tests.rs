//! Performance checks for the hot paths of a frame's life

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use server::client_manager::ClientManager;
use server::config::Account;
use server::game::Battle;
use shared::{
    decode, frame, Action, MatchStart, MatchStatus, PartsConfiguration, RoundReport,
};
use std::time::Instant;

/// Frames and decodes a full match request
#[test]
fn benchmark_frame_codec() {
    let fields = ["user1", "head", "torso", "left-arm", "right-arm", "legs", "extra"];
    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let bytes = frame(&fields).unwrap();
        let message = decode(&bytes);
        assert_eq!(message.field(6), Some("extra"));
    }

    let duration = start.elapsed();
    println!(
        "Frame codec: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Decodes the typed replies a client reads most
#[test]
fn benchmark_typed_decoding() {
    let assignment = decode(&frame(&["sess1", "opp7", "H", "T", "LA", "RA", "L", "X", ""]).unwrap());
    let report = decode(&frame(&["42", "17", "none", "2", "0", "3", "defend", ""]).unwrap());

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        assert!(matches!(
            MatchStart::from_message(&assignment),
            Ok(MatchStart::Matched(_))
        ));
        assert_eq!(RoundReport::from_message(&report).unwrap().turn, 3);
    }

    let duration = start.elapsed();
    println!(
        "Typed decoding: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Plays many complete battles with random moves
#[test]
fn benchmark_battle_resolution() {
    let first = PartsConfiguration::new(["0", "1", "2", "3", "4", "5"]).unwrap();
    let second = PartsConfiguration::new(["6", "7", "8", "9", "10", "11"]).unwrap();
    let moves = [Action::Attack, Action::Defend, Action::Heal, Action::Charge];
    let mut picker = StdRng::seed_from_u64(99);

    let battles = 1_000;
    let start = Instant::now();

    for seed in 0..battles {
        let mut battle = Battle::new([&first, &second], StdRng::seed_from_u64(seed));
        let mut status = MatchStatus::None;
        while !status.is_final() {
            let actions = [
                moves[picker.gen_range(0..moves.len())],
                moves[picker.gen_range(0..moves.len())],
            ];
            status = battle.play_round(actions)[0].status;
        }
        assert!(battle.turn() <= 19);
    }

    let duration = start.elapsed();
    println!(
        "Battle resolution: {} battles in {:?} ({:.2} μs/battle)",
        battles,
        duration,
        duration.as_micros() as f64 / battles as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Builds the player list over a large account table
#[test]
fn benchmark_closest_players() {
    let accounts: Vec<Account> = (0..1_000)
        .map(|n| Account {
            user_id: format!("player{}", n),
            password: "pw".into(),
        })
        .collect();
    let mut manager = ClientManager::new(10, &accounts);
    for n in 0..1_000 {
        for _ in 0..(n % 7) {
            manager.record_result(&format!("player{}", n), MatchStatus::Win);
        }
    }

    let queries = 200;
    let start = Instant::now();

    for n in 0..queries {
        let players = manager.closest_players(&format!("player{}", n));
        assert_eq!(players.len(), 10);
    }

    let duration = start.elapsed();
    println!(
        "Closest players: {} queries in {:?} ({:.2} μs/query)",
        queries,
        duration,
        duration.as_micros() as f64 / queries as f64
    );

    assert!(duration.as_millis() < 5000);
}
