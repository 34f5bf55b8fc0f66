//! Integration tests for desks: seating, the round state machine, the
//! control loop and the registry sweep.

use std::collections::HashMap;
use std::time::Duration;

use doushou_protocol::{
    Camp, DeskMode, DeskState, Outbound, PlayerId, Push, Reply, SessionId, code,
};
use doushou_room::{
    Action, DeskConfig, DeskError, DeskHandle, DeskNotice, DeskRegistry, DestroyCause,
    NoticeReceiver, SeatProfile,
};
use doushou_session::{Inbox, Session};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

fn pid(id: u64) -> PlayerId {
    PlayerId(id)
}

fn profile(id: u64) -> SeatProfile {
    SeatProfile {
        uid: pid(id),
        name: format!("player-{id}"),
        head_url: String::new(),
        sex: 1,
        ip: format!("10.0.0.{id}"),
        coin: 100,
    }
}

fn session(id: u64) -> (Session, Inbox) {
    Session::channel(SessionId(id), format!("10.0.0.{id}"))
}

fn registry() -> (DeskRegistry, NoticeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DeskRegistry::new(DeskConfig::default(), tx), rx)
}

fn pushes(inbox: &mut Inbox) -> Vec<Push> {
    let mut out = Vec::new();
    while let Ok(outbound) = inbox.try_recv() {
        if let Outbound::Push(push) = outbound {
            out.push(push);
        }
    }
    out
}

/// Two players seated at a fresh desk. Player 1 created it.
struct Table {
    desk: DeskHandle,
    inbox1: Inbox,
    inbox2: Inbox,
}

async fn seated_table(reg: &mut DeskRegistry) -> Table {
    let desk = reg.create(pid(1), DeskMode::Room, 2, 1_000);
    let (s1, inbox1) = session(1);
    let (s2, inbox2) = session(2);
    desk.join(profile(1), Some(s1)).await.unwrap();
    desk.join(profile(2), Some(s2)).await.unwrap();
    Table {
        desk,
        inbox1,
        inbox2,
    }
}

/// Waits until the control loop has opened a turn. `None` once the desk
/// is destroyed.
async fn wait_for_turn(desk: &DeskHandle) -> Option<Camp> {
    loop {
        if desk.is_destroyed() {
            return None;
        }
        if let Ok(info) = desk.info().await {
            if info.state == DeskState::Destroyed {
                return None;
            }
            if let Some(camp) = info.turn {
                return Some(camp);
            }
        }
        tokio::task::yield_now().await;
    }
}

/// Readies and arranges both seats, and returns which player holds which
/// camp once the first turn is open.
async fn start_round(table: &Table, notices: &mut NoticeReceiver) -> HashMap<Camp, PlayerId> {
    table.desk.ready(pid(1)).await.unwrap();
    table.desk.ready(pid(2)).await.unwrap();
    let Some(DeskNotice::RoundStarted { camps, .. }) = notices.recv().await else {
        panic!("expected RoundStarted");
    };
    table.desk.arrange_done(pid(1)).await.unwrap();
    table.desk.arrange_done(pid(2)).await.unwrap();
    wait_for_turn(&table.desk).await.unwrap();
    camps.into_iter().map(|(uid, camp)| (camp, uid)).collect()
}

fn camp_of(id: i32) -> Camp {
    if id <= 8 { Camp::A } else { Camp::B }
}

fn rank_of(id: i32) -> i32 {
    if id <= 8 { id } else { id - 8 }
}

// =========================================================================
// Registry
// =========================================================================

#[tokio::test]
async fn test_create_allocates_unique_six_digit_codes() {
    let (mut reg, _notices) = registry();
    let a = reg.create(pid(1), DeskMode::Room, 2, 0);
    let b = reg.create(pid(2), DeskMode::Match, 4, 0);

    assert_ne!(a.code(), b.code());
    for code in [a.code(), b.code()] {
        assert_eq!(code.as_str().len(), 6);
        assert!(code.as_str().chars().all(|c| c.is_ascii_digit()));
    }
    assert_eq!(reg.len(), 2);
    assert!(reg.lookup(a.code()).is_some());
}

#[tokio::test]
async fn test_remove_forgets_desk() {
    let (mut reg, _notices) = registry();
    let desk = reg.create(pid(1), DeskMode::Room, 2, 0);
    let code = desk.code().clone();

    assert!(reg.remove(&code).is_some());
    assert!(reg.lookup(&code).is_none());
    assert!(reg.remove(&code).is_none());
    assert!(reg.is_empty());
}

#[tokio::test]
async fn test_record_id_comes_back_with_destroyed_notice() {
    let (mut reg, mut notices) = registry();
    let desk = reg.create(pid(1), DeskMode::Room, 2, 0);

    desk.set_record(42).await.unwrap();
    assert_eq!(desk.info().await.unwrap().record, Some(42));

    assert!(desk.destroy().await.unwrap());
    let Some(DeskNotice::Destroyed { record, cause, .. }) = notices.recv().await else {
        panic!("expected a Destroyed notice");
    };
    assert_eq!(record, Some(42));
    assert_eq!(cause, DestroyCause::Requested);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_reclaims_destroyed_and_overage_desks() {
    let (mut reg, _notices) = registry();
    let old = reg.create(pid(1), DeskMode::Room, 2, 0);
    let fresh = reg.create(pid(2), DeskMode::Room, 2, 5_000);
    let dead = reg.create(pid(3), DeskMode::Room, 2, 5_000);
    assert!(dead.destroy().await.unwrap());

    let mut swept = reg.sweep(5_000).await;
    swept.sort();
    let mut expected = vec![old.code().clone(), dead.code().clone()];
    expected.sort();

    assert_eq!(swept, expected);
    assert_eq!(reg.len(), 1);
    assert!(reg.lookup(fresh.code()).is_some());
    assert!(old.is_destroyed());
}

#[tokio::test]
async fn test_shutdown_all_destroys_every_desk() {
    let (mut reg, mut notices) = registry();
    let a = reg.create(pid(1), DeskMode::Room, 2, 0);
    let b = reg.create(pid(2), DeskMode::Room, 2, 0);

    assert_eq!(reg.shutdown_all().await, 2);
    assert!(reg.is_empty());
    assert!(a.is_destroyed() && b.is_destroyed());
    for _ in 0..2 {
        assert!(matches!(
            notices.recv().await,
            Some(DeskNotice::Destroyed {
                cause: DestroyCause::Requested,
                ..
            })
        ));
    }
}

// =========================================================================
// Seating
// =========================================================================

#[tokio::test]
async fn test_join_returns_table_info_and_broadcasts_enter() {
    let (mut reg, _notices) = registry();
    let mut table = seated_table(&mut reg).await;

    let info = table.desk.info().await.unwrap();
    let tableinfo = info.table();
    assert_eq!(tableinfo.creator, pid(1));
    assert_eq!(tableinfo.status, DeskState::Created);
    assert_eq!(tableinfo.mode, DeskMode::Room);
    assert_eq!(info.players, vec![pid(1), pid(2)]);

    // Player 1 saw both enter broadcasts, the second listing two seats.
    let seen = pushes(&mut table.inbox1);
    assert_eq!(seen.len(), 2);
    let Push::PlayerEnter(enter) = &seen[1] else {
        panic!("expected onPlayerEnter");
    };
    assert_eq!(enter.data.len(), 2);
    assert_eq!(enter.data[1].uid, pid(2));
    assert_eq!(enter.data[1].desk_pos, 1);
    assert_eq!(pushes(&mut table.inbox2).len(), 1);
}

#[tokio::test]
async fn test_join_third_player_rejected_without_mutating_roster() {
    let (mut reg, _notices) = registry();
    let table = seated_table(&mut reg).await;
    let (s3, _inbox3) = session(3);

    let err = table.desk.join(profile(3), Some(s3)).await.unwrap_err();
    assert_eq!(err, DeskError::Full(table.desk.code().clone()));
    assert_eq!(table.desk.info().await.unwrap().players, vec![pid(1), pid(2)]);
}

#[tokio::test]
async fn test_join_same_player_twice_is_already_seated() {
    let (mut reg, _notices) = registry();
    let desk = reg.create(pid(1), DeskMode::Room, 2, 0);
    desk.join(profile(1), None).await.unwrap();
    assert!(matches!(
        desk.join(profile(1), None).await,
        Err(DeskError::AlreadySeated(..))
    ));
}

#[tokio::test]
async fn test_ready_from_unseated_player_is_rejected() {
    let (mut reg, _notices) = registry();
    let table = seated_table(&mut reg).await;
    assert!(matches!(
        table.desk.ready(pid(9)).await,
        Err(DeskError::NotSeated(..))
    ));
}

// =========================================================================
// Dealing and arranging
// =========================================================================

#[tokio::test]
async fn test_both_ready_deals_round_with_two_camps() {
    let (mut reg, mut notices) = registry();
    let mut table = seated_table(&mut reg).await;
    pushes(&mut table.inbox1);

    table.desk.ready(pid(1)).await.unwrap();
    assert_eq!(table.desk.info().await.unwrap().state, DeskState::Created);
    table.desk.ready(pid(2)).await.unwrap();
    assert_eq!(table.desk.info().await.unwrap().state, DeskState::DuanPai);

    let seen = pushes(&mut table.inbox1);
    let deal = seen
        .iter()
        .find_map(|push| match push {
            Push::DuanPai(deal) => Some(deal.clone()),
            _ => None,
        })
        .expect("onDuanPai broadcast");
    let basic_at = seen
        .iter()
        .position(|p| matches!(p, Push::DeskBasicInfo(_)))
        .unwrap();
    let deal_at = seen.iter().position(|p| matches!(p, Push::DuanPai(_))).unwrap();
    assert!(basic_at < deal_at);

    let mut pieces = deal.pieces.clone();
    pieces.sort();
    assert_eq!(pieces, (1..=16).collect::<Vec<i32>>());

    assert_eq!(deal.camps.len(), 2);
    assert_ne!(deal.camps[0].camp, deal.camps[1].camp);

    let Some(DeskNotice::RoundStarted {
        creator, stake, camps, ..
    }) = notices.recv().await
    else {
        panic!("expected RoundStarted");
    };
    assert_eq!(creator, pid(1));
    assert_eq!(stake, 2);
    assert_eq!(camps.len(), 2);
}

#[tokio::test]
async fn test_arrange_done_before_deal_is_invalid_state() {
    let (mut reg, _notices) = registry();
    let table = seated_table(&mut reg).await;
    assert_eq!(
        table.desk.arrange_done(pid(1)).await,
        Err(DeskError::InvalidState(DeskState::Created))
    );
}

#[tokio::test(start_paused = true)]
async fn test_all_arranged_starts_control_loop_and_hints() {
    let (mut reg, mut notices) = registry();
    let mut table = seated_table(&mut reg).await;
    let camps = start_round(&table, &mut notices).await;

    let info = table.desk.info().await.unwrap();
    assert_eq!(info.state, DeskState::Playing);
    let turn = info.turn.unwrap();
    assert_eq!(info.last_hinted, Some(camps[&turn]));

    let hint = pushes(&mut table.inbox2)
        .into_iter()
        .find_map(|push| match push {
            Push::HintPlayer(hint) => Some(hint),
            _ => None,
        })
        .expect("onHintPlayer broadcast");
    assert_eq!(hint.camp, turn);
    assert_eq!(hint.uid, camps[&turn]);

    // Arranging again once playing is an illegal status.
    assert_eq!(
        table.desk.arrange_done(pid(1)).await,
        Err(DeskError::InvalidState(DeskState::Playing))
    );
}

// =========================================================================
// Turn ownership
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_action_from_non_owning_camp_is_noop() {
    let (mut reg, mut notices) = registry();
    let mut table = seated_table(&mut reg).await;
    let camps = start_round(&table, &mut notices).await;
    let turn = wait_for_turn(&table.desk).await.unwrap();
    let idle = camps[&turn.opponent()];
    pushes(&mut table.inbox1);
    pushes(&mut table.inbox2);

    let before = table.desk.info().await.unwrap();
    let err = table
        .desk
        .act(idle, Action::Reveal { index: 0 })
        .await
        .unwrap_err();
    assert_eq!(err, DeskError::NotYourTurn(idle));

    let after = table.desk.info().await.unwrap();
    assert_eq!(after.cells, before.cells);
    assert_eq!(after.turn, Some(turn));
    assert!(pushes(&mut table.inbox1).is_empty());
    assert!(pushes(&mut table.inbox2).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reveal_accepted_then_turn_passes_to_opponent() {
    let (mut reg, mut notices) = registry();
    let mut table = seated_table(&mut reg).await;
    let camps = start_round(&table, &mut notices).await;
    let turn = wait_for_turn(&table.desk).await.unwrap();
    pushes(&mut table.inbox1);

    let reply = table
        .desk
        .act(camps[&turn], Action::Reveal { index: 5 })
        .await
        .unwrap();
    let Reply::OpenPiece(opened) = reply else {
        panic!("expected OpenPiece reply");
    };
    assert_eq!(opened.code, code::OK);
    assert_eq!(opened.index, 5);
    assert!((1..=16).contains(&opened.piece));

    // A second action for the same turn is refused.
    assert_eq!(
        table
            .desk
            .act(camps[&turn], Action::Reveal { index: 6 })
            .await
            .unwrap_err(),
        DeskError::NotYourTurn(camps[&turn])
    );

    assert_eq!(wait_for_turn(&table.desk).await, Some(turn.opponent()));
    let seen = pushes(&mut table.inbox1);
    assert!(seen.iter().any(|p| matches!(
        p,
        Push::OpenPiece(n) if n.index == 5 && n.piece == opened.piece
    )));
}

#[tokio::test(start_paused = true)]
async fn test_reveal_already_revealed_cell_fails_without_broadcast() {
    let (mut reg, mut notices) = registry();
    let mut table = seated_table(&mut reg).await;
    let camps = start_round(&table, &mut notices).await;
    let turn = wait_for_turn(&table.desk).await.unwrap();
    table
        .desk
        .act(camps[&turn], Action::Reveal { index: 5 })
        .await
        .unwrap();
    let next = wait_for_turn(&table.desk).await.unwrap();
    assert_eq!(next, turn.opponent());
    pushes(&mut table.inbox1);

    let reply = table
        .desk
        .act(camps[&next], Action::Reveal { index: 5 })
        .await
        .unwrap();
    assert!(matches!(
        reply,
        Reply::OpenPiece(r) if r.code == code::FAIL && r.piece == -1
    ));
    assert!(pushes(&mut table.inbox1).is_empty());
    // The failed reveal did not consume the turn.
    assert_eq!(table.desk.info().await.unwrap().turn, Some(next));
}

#[tokio::test(start_paused = true)]
async fn test_move_with_opponent_piece_is_rejected() {
    let (mut reg, mut notices) = registry();
    let table = seated_table(&mut reg).await;
    let camps = start_round(&table, &mut notices).await;

    // Reveal until some cell shows a piece of the camp that is not moving.
    loop {
        let turn = wait_for_turn(&table.desk).await.unwrap();
        let info = table.desk.info().await.unwrap();
        if let Some(foreign) = info
            .cells
            .iter()
            .position(|&c| c > 0 && camp_of(c) != turn)
        {
            let err = table
                .desk
                .act(
                    camps[&turn],
                    Action::Move {
                        src: foreign as i32,
                        dest: 0,
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, DeskError::ForeignPiece { .. }));
            assert_eq!(table.desk.info().await.unwrap().cells, info.cells);
            break;
        }
        let hidden = info.cells.iter().position(|&c| c == -1).unwrap();
        table
            .desk
            .act(camps[&turn], Action::Reveal { index: hidden as i32 })
            .await
            .unwrap();
    }
}

// =========================================================================
// Settlement
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_turn_timeout_declares_opponent_winner() {
    let (mut reg, mut notices) = registry();
    let mut table = seated_table(&mut reg).await;
    let camps = start_round(&table, &mut notices).await;
    let silent = wait_for_turn(&table.desk).await.unwrap();
    let winner = silent.opponent();

    table.desk.destroyed().await;

    let result = pushes(&mut table.inbox1)
        .into_iter()
        .find_map(|push| match push {
            Push::GameEnd(result) => Some(result),
            _ => None,
        })
        .expect("onGameEnd broadcast");
    assert!(result.time_out);
    assert!(!result.giveup);
    assert_eq!(result.camp, winner.code());
    assert_eq!(result.winner, camps[&winner].0);
    assert_eq!(result.coin, 2);

    let Some(DeskNotice::Destroyed { players, cause, .. }) = notices.recv().await else {
        panic!("expected Destroyed");
    };
    assert_eq!(players.len(), 2);
    assert_eq!(cause, DestroyCause::Settled(result));
}

#[tokio::test(start_paused = true)]
async fn test_turn_timer_restarts_after_each_action() {
    let (mut reg, mut notices) = registry();
    let table = seated_table(&mut reg).await;
    let camps = start_round(&table, &mut notices).await;

    let turn = wait_for_turn(&table.desk).await.unwrap();
    tokio::time::sleep(Duration::from_secs(20)).await;
    table
        .desk
        .act(camps[&turn], Action::Reveal { index: 0 })
        .await
        .unwrap();
    wait_for_turn(&table.desk).await.unwrap();

    // 20s into the second turn the first turn's deadline has passed, but
    // the desk is still playing.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(table.desk.info().await.unwrap().state, DeskState::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_give_up_settles_with_surrender_flag() {
    let (mut reg, mut notices) = registry();
    let mut table = seated_table(&mut reg).await;
    let camps = start_round(&table, &mut notices).await;
    let turn = wait_for_turn(&table.desk).await.unwrap();

    // Only the owning camp may give up.
    assert!(table.desk.give_up(camps[&turn.opponent()]).await.is_err());
    table.desk.give_up(camps[&turn]).await.unwrap();
    table.desk.destroyed().await;

    let result = pushes(&mut table.inbox2)
        .into_iter()
        .find_map(|push| match push {
            Push::GameEnd(result) => Some(result),
            _ => None,
        })
        .expect("onGameEnd broadcast");
    assert!(result.giveup);
    assert!(!result.time_out);
    assert_eq!(result.winner, camps[&turn.opponent()].0);
}

#[tokio::test(start_paused = true)]
async fn test_full_round_trades_down_to_draw() {
    let (mut reg, mut notices) = registry();
    let mut table = seated_table(&mut reg).await;
    let camps = start_round(&table, &mut notices).await;

    while let Some(turn) = wait_for_turn(&table.desk).await {
        let player = camps[&turn];
        let cells = table.desk.info().await.unwrap().cells;
        let action = match cells.iter().position(|&c| c == -1) {
            Some(hidden) => Action::Reveal {
                index: hidden as i32,
            },
            None => {
                // Trade one of our pieces for the opponent's piece of the
                // same rank.
                let (src, dest) = cells
                    .iter()
                    .enumerate()
                    .filter(|&(_, &c)| c > 0 && camp_of(c) == turn)
                    .find_map(|(src, &mine)| {
                        cells
                            .iter()
                            .position(|&c| c > 0 && camp_of(c) != turn && rank_of(c) == rank_of(mine))
                            .map(|dest| (src, dest))
                    })
                    .expect("symmetric boards always have a trade");
                Action::Capture {
                    src: src as i32,
                    dest: dest as i32,
                }
            }
        };
        let reply = table.desk.act(player, action).await.unwrap();
        if let Reply::EatPiece(eaten) = reply {
            assert_eq!(eaten.code, 3);
        }
    }

    let result = pushes(&mut table.inbox1)
        .into_iter()
        .find_map(|push| match push {
            Push::GameEnd(result) => Some(result),
            _ => None,
        })
        .expect("onGameEnd broadcast");
    assert_eq!(result.winner, 0);
    assert_eq!(result.camp, 0);
    assert!(!result.giveup && !result.time_out);
}

// =========================================================================
// Destroy / exit
// =========================================================================

#[tokio::test]
async fn test_destroy_twice_is_idempotent() {
    let (mut reg, mut notices) = registry();
    let table = seated_table(&mut reg).await;

    assert!(table.desk.destroy().await.unwrap());
    assert!(!table.desk.destroy().await.unwrap());

    assert!(matches!(
        notices.recv().await,
        Some(DeskNotice::Destroyed { .. })
    ));
    assert!(notices.try_recv().is_err());
    assert_eq!(table.desk.info().await.unwrap().state, DeskState::Destroyed);
}

#[tokio::test(start_paused = true)]
async fn test_destroy_during_round_ends_loop_without_settlement() {
    let (mut reg, mut notices) = registry();
    let mut table = seated_table(&mut reg).await;
    start_round(&table, &mut notices).await;
    pushes(&mut table.inbox1);

    assert!(table.desk.destroy().await.unwrap());
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert!(
        !pushes(&mut table.inbox1)
            .iter()
            .any(|p| matches!(p, Push::GameEnd(_)))
    );
    assert!(matches!(
        notices.recv().await,
        Some(DeskNotice::Destroyed {
            cause: DestroyCause::Requested,
            ..
        })
    ));
    assert!(notices.try_recv().is_err());
}

#[tokio::test]
async fn test_exit_before_round_dissolves_desk() {
    let (mut reg, mut notices) = registry();
    let mut table = seated_table(&mut reg).await;
    pushes(&mut table.inbox1);

    table.desk.exit(pid(2)).await.unwrap();

    let seen = pushes(&mut table.inbox1);
    assert!(seen.iter().any(|p| matches!(
        p,
        Push::Dissolve(r) if r.code == code::DISSOLVED
    )));
    // The leaver is out of the group before the dissolve broadcast.
    assert!(
        !pushes(&mut table.inbox2)
            .iter()
            .any(|p| matches!(p, Push::Dissolve(_)))
    );
    assert!(table.desk.is_destroyed());
    assert!(matches!(
        notices.recv().await,
        Some(DeskNotice::Destroyed { ref players, cause: DestroyCause::Dissolved, .. })
            if players == &vec![pid(1)]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_exit_during_round_is_invalid_state() {
    let (mut reg, mut notices) = registry();
    let table = seated_table(&mut reg).await;
    start_round(&table, &mut notices).await;
    assert_eq!(
        table.desk.exit(pid(1)).await,
        Err(DeskError::InvalidState(DeskState::Playing))
    );
}

// =========================================================================
// Disconnect and rejoin
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_detach_then_rejoin_keeps_seat_and_camp() {
    let (mut reg, mut notices) = registry();
    let mut table = seated_table(&mut reg).await;
    let camps = start_round(&table, &mut notices).await;
    let turn = wait_for_turn(&table.desk).await.unwrap();
    let mover = camps[&turn];
    let (waiting, waiting_session) = if mover == pid(1) {
        (pid(2), SessionId(2))
    } else {
        (pid(1), SessionId(1))
    };

    table
        .desk
        .detach(waiting, waiting_session, true)
        .await
        .unwrap();
    pushes(&mut table.inbox1);
    pushes(&mut table.inbox2);

    table
        .desk
        .act(mover, Action::Reveal { index: 3 })
        .await
        .unwrap();
    let old_inbox = if waiting == pid(1) {
        &mut table.inbox1
    } else {
        &mut table.inbox2
    };
    assert!(
        !pushes(old_inbox)
            .iter()
            .any(|p| matches!(p, Push::OpenPiece(_)))
    );

    let info = table.desk.info().await.unwrap();
    assert!(info.is_seated(waiting));

    let (fresh, mut fresh_inbox) = session(30);
    table.desk.rejoin(waiting, fresh).await.unwrap();
    let seen = pushes(&mut fresh_inbox);
    assert!(matches!(seen[0], Push::DeskBasicInfo(_)));
    let Push::PlayerEnter(enter) = &seen[1] else {
        panic!("expected onPlayerEnter");
    };
    assert!(enter.data.iter().any(|e| e.uid == waiting && e.offline));
    let Push::SyncDesk(sync) = &seen[2] else {
        panic!("expected onSyncDesk");
    };
    assert_eq!(sync.status, DeskState::Playing);
    let mine = sync.players.iter().find(|p| p.uid == waiting).unwrap();
    assert_eq!(mine.camp, Some(turn.opponent()));
    assert_eq!(sync.pieces[3], info.cells[3]);

    // The new session is in the group.
    let next = wait_for_turn(&table.desk).await.unwrap();
    assert_eq!(next, turn.opponent());
    table
        .desk
        .act(waiting, Action::Reveal { index: 4 })
        .await
        .unwrap();
    assert!(
        pushes(&mut fresh_inbox)
            .iter()
            .any(|p| matches!(p, Push::OpenPiece(n) if n.uid == waiting && n.index == 4))
    );
}

#[tokio::test]
async fn test_rejoin_before_round_marks_ready() {
    let (mut reg, _notices) = registry();
    let table = seated_table(&mut reg).await;
    table
        .desk
        .detach(pid(2), SessionId(2), true)
        .await
        .unwrap();

    let (fresh, _fresh_inbox) = session(20);
    table.desk.rejoin(pid(2), fresh).await.unwrap();
    assert_eq!(table.desk.info().await.unwrap().ready, vec![pid(2)]);
}

#[tokio::test]
async fn test_emoji_is_broadcast_to_the_desk() {
    let (mut reg, _notices) = registry();
    let mut table = seated_table(&mut reg).await;
    pushes(&mut table.inbox2);

    table.desk.emoji(pid(1), 4).await.unwrap();
    table.desk.info().await.unwrap();
    assert!(
        pushes(&mut table.inbox2)
            .iter()
            .any(|p| matches!(p, Push::Emoji(e) if e.uid == pid(1) && e.index == 4))
    );
}
