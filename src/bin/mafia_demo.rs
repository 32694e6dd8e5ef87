//! Demo application that simulates a complete trustless Mafia game.
//!
//! This demo:
//! - Creates a room and fills it with N simulated players
//! - Runs the full mental-poker shuffle (N commit+reveal turns)
//! - Exchanges decryption keys and lets every player recover their role
//! - Plays a scripted day/vote/night cycle and a second day that votes the
//!   mafia out, then finalizes the game through the ledger-verified path
//!
//! Time is simulated: the ledger takes explicit timestamps, so the demo
//! advances a virtual clock past the waterfall and phase windows.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use mental_mafia::client::PlayerClient;
use mental_mafia::commitment::payload::{
    commit_payload, MafiaTargetPayload, NightAction, NightActionPayload,
};
use mental_mafia::config::{default_sra_params, RoomConfig};
use mental_mafia::crypto::SraParams;
use mental_mafia::ledger::types::PlayerId;
use mental_mafia::{InMemoryLedger, Phase, Role};

const LOG_TARGET: &str = "mafia_demo";

#[derive(Parser, Debug)]
#[command(about = "Simulate a complete trustless Mafia game")]
struct Args {
    /// Number of players (needs a detective and two civilians).
    #[arg(long, default_value_t = 5)]
    players: usize,

    /// Seed for the simulated players' randomness.
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Use the original 2^31 - 1 group instead of the 2048-bit default.
    #[arg(long)]
    toy: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    // 5 players deals every role; 8+ deals a second mafia the script does
    // not coordinate, so the demo stays below that.
    if !(5..=7).contains(&args.players) {
        bail!("--players must be in 5..=7");
    }

    let params = if args.toy {
        SraParams::toy()
    } else {
        default_sra_params().clone()
    };
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut clock: DateTime<Utc> = Utc::now();

    let ledger = InMemoryLedger::new();
    let config = RoomConfig {
        min_players: 3,
        max_players: args.players,
        ..RoomConfig::default()
    };

    // ---- lobby -------------------------------------------------------------

    let room = ledger.create_room("demo-room", config.clone(), "p0", "pk0", "0x0", clock)?;
    for i in 1..args.players {
        ledger.join_room(room, format!("0x{i}"), format!("p{i}"), format!("pk{i}"), clock)?;
    }
    info!(target: LOG_TARGET, %room, players = args.players, "room filled, shuffle started");

    // ---- shuffle -----------------------------------------------------------

    let mut players: Vec<PlayerClient> = (0..args.players as PlayerId)
        .map(|id| PlayerClient::new(id, params.clone()))
        .collect();

    for i in 0..args.players {
        let input = (i > 0).then(|| ledger.revealed_deck(room)).transpose()?;
        let hash = players[i].begin_shuffle_turn(input.as_ref(), args.players, &mut rng)?;
        ledger.commit_deck(room, i as PlayerId, hash, clock)?;
        let (deck, salt) = players[i].shuffle_reveal()?;
        ledger.reveal_deck(room, i as PlayerId, deck, salt, clock)?;
        info!(target: LOG_TARGET, shuffler = i, "shuffle turn committed and revealed");
    }

    // ---- key exchange and role recovery -------------------------------------

    for i in 0..args.players as PlayerId {
        let others = (0..args.players as PlayerId).filter(|id| *id != i);
        let shares = players[i as usize].export_keys_for(others)?;
        ledger.share_decryption_keys(room, i, shares, clock)?;
    }
    for i in 0..args.players as PlayerId {
        for (sender, blob) in ledger.key_shares_for(room, i)? {
            players[i as usize].import_decryption_key(sender, &blob)?;
        }
    }

    let deck = ledger.revealed_deck(room)?;
    let mut roles: BTreeMap<PlayerId, Role> = BTreeMap::new();
    for i in 0..args.players {
        let role = players[i].decrypt_own_card(&deck, i, args.players - 1)?;
        info!(target: LOG_TARGET, player = i, ?role, "recovered own role");
        roles.insert(i as PlayerId, role);
    }

    for i in 0..args.players {
        let role = roles[&(i as PlayerId)];
        let hash = players[i].prepare_role_commit(role, &mut rng);
        ledger.commit_role(room, i as PlayerId, hash, clock)?;
        ledger.confirm_role(room, i as PlayerId, clock)?;
    }
    info!(target: LOG_TARGET, "all roles confirmed, day 1 begins");

    let mafia = *roles
        .iter()
        .find(|(_, r)| **r == Role::Mafia)
        .map(|(id, _)| id)
        .context("a mafia role is always dealt")?;
    let doctor = *roles
        .iter()
        .find(|(_, r)| **r == Role::Doctor)
        .map(|(id, _)| id)
        .context("a doctor is dealt for 4+ players")?;
    let detective = *roles
        .iter()
        .find(|(_, r)| **r == Role::Detective)
        .map(|(id, _)| id)
        .context("a detective is dealt for 5+ players")?;
    let civilians: Vec<PlayerId> = roles
        .iter()
        .filter(|(_, r)| **r == Role::Civilian)
        .map(|(id, _)| *id)
        .collect();

    // ---- day 1: the town votes out a civilian (bad luck) ---------------------

    clock += config.vote_trigger_base() + Duration::seconds(1);
    let trigger = alive_ids(&ledger, room)?[0];
    ledger.start_voting(room, trigger, clock)?;
    let scapegoat = civilians[0];
    for id in alive_ids(&ledger, room)? {
        ledger.cast_vote(room, id, scapegoat, clock)?;
    }
    info!(target: LOG_TARGET, eliminated = scapegoat, "day 1 vote eliminated a civilian");

    // ---- night 1: a kill attempt, a heal, an investigation -------------------

    let victim = civilians[1];
    let (mafia_hash, mafia_salt) = commit_payload(&MafiaTargetPayload { target: victim }, &mut rng);
    ledger.commit_mafia_target(room, mafia, mafia_hash, clock)?;

    let heal = NightActionPayload {
        action: NightAction::Heal,
        target: Some(doctor),
    };
    let (heal_hash, heal_salt) = commit_payload(&heal, &mut rng);
    ledger.commit_night_action(room, doctor, heal_hash, clock)?;

    let check = NightActionPayload {
        action: NightAction::Check,
        target: Some(mafia),
    };
    let (check_hash, check_salt) = commit_payload(&check, &mut rng);
    ledger.commit_night_action(room, detective, check_hash, clock)?;

    ledger.reveal_night_action(room, doctor, NightAction::Heal, Some(doctor), heal_salt, clock)?;
    ledger.reveal_night_action(
        room,
        detective,
        NightAction::Check,
        Some(mafia),
        check_salt,
        clock,
    )?;
    ledger.reveal_mafia_target(room, mafia, victim, mafia_salt, clock)?;
    info!(target: LOG_TARGET, killed = victim, "night 1 resolved, day 2 begins");

    // ---- day 2: the town has seen enough and votes the mafia out -------------

    clock += config.vote_trigger_base() + Duration::seconds(1);
    let trigger = alive_ids(&ledger, room)?[0];
    ledger.start_voting(room, trigger, clock)?;
    for id in alive_ids(&ledger, room)? {
        ledger.cast_vote(room, id, mafia, clock)?;
    }
    info!(target: LOG_TARGET, eliminated = mafia, "day 2 vote eliminated the mafia");

    // ---- endgame: disclose roles, let the ledger verify the win --------------

    for i in 0..args.players {
        let (role, salt) = players[i].role_reveal()?;
        ledger.reveal_role_for_endgame(room, i as PlayerId, role, salt, clock)?;
    }
    ledger.finalize_game(room, 0, clock)?;

    let snapshot = ledger.snapshot(room)?;
    assert_eq!(snapshot.phase, Phase::Ended);
    info!(target: LOG_TARGET, verdict = ?snapshot.verdict, "game finalized");
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}

fn alive_ids(ledger: &InMemoryLedger, room: mental_mafia::ledger::RoomId) -> Result<Vec<PlayerId>> {
    Ok(ledger
        .players(room)?
        .into_iter()
        .filter(|p| p.is_alive())
        .map(|p| p.id)
        .collect())
}
