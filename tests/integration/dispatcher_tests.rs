//! End-to-end dispatcher tests against the mock rig.
//!
//! Covers the JSON envelope, every action handler, per-client rate
//! limiting, restart delivery and the drop-on-lock-timeout rule.

use std::time::Duration;

use smartplate::app::ports::{Actuator, Clock};
use smartplate::rpc::dispatcher::{CommandDispatcher, Outbound};
use smartplate::rpc::protocol::{MAX_MESSAGE_LEN, Reply};
use smartplate::scheduler;
use smartplate::state::Mode;

use crate::mock_hw::Rig;

fn error_message(out: &Outbound) -> &str {
    match &out.reply {
        Some(Reply::Error { message }) => message,
        other => panic!("expected error reply, got {other:?}"),
    }
}

// ── Envelope ──────────────────────────────────────────────────

#[test]
fn unknown_action_is_named_in_error() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();
    let out = d.dispatch(&rig.ctx, 1, r#"{"action":"foo"}"#);
    assert_eq!(error_message(&out), "Unknown action: foo");
    assert!(out.broadcast.is_none());
}

#[test]
fn malformed_envelopes_rejected() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();

    let out = d.dispatch(&rig.ctx, 1, "not json at all");
    assert_eq!(error_message(&out), "Invalid JSON");

    let out = d.dispatch(&rig.ctx, 1, r#"{"data":{}}"#);
    assert_eq!(error_message(&out), "Missing action field");

    let out = d.dispatch(&rig.ctx, 1, r#"{"action":42}"#);
    assert_eq!(error_message(&out), "Missing action field");

    let out = d.dispatch(&rig.ctx, 1, "[1,2,3]");
    assert_eq!(error_message(&out), "Missing action field");
}

#[test]
fn oversized_message_rejected() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();
    let big = format!(r#"{{"action":"getConfig","pad":"{}"}}"#, "x".repeat(MAX_MESSAGE_LEN));
    let out = d.dispatch(&rig.ctx, 1, &big);
    assert_eq!(error_message(&out), "Message too large");
}

#[test]
fn action_names_ignore_case() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();
    let out = d.dispatch(&rig.ctx, 1, r#"{"action":"GETCONFIG"}"#);
    assert!(matches!(out.reply, Some(Reply::Config { .. })));
}

// ── controlUpdate ─────────────────────────────────────────────

#[test]
fn mode_only_update_keeps_setpoint() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();

    let out = d.dispatch(
        &rig.ctx,
        1,
        r#"{"action":"controlUpdate","data":{"mode":"hold"}}"#,
    );
    assert_eq!(out.reply, Some(Reply::ack("Update received")));
    match out.broadcast {
        Some(Reply::DataUpdate { data }) => {
            assert_eq!(data.mode, Mode::Hold);
            assert!((data.temp_setpoint - 30.0).abs() < f32::EPSILON);
        }
        other => panic!("expected dataUpdate broadcast, got {other:?}"),
    }

    rig.ctx
        .store
        .with_lock(|s| {
            assert_eq!(s.modes.mode(), Mode::Hold);
            assert!((s.actuator.target() - 30.0).abs() < f32::EPSILON);
            assert!(s.actuator.is_running());
        })
        .unwrap();
}

#[test]
fn setpoint_change_is_logged_as_event() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();
    d.dispatch(
        &rig.ctx,
        1,
        r#"{"action":"controlUpdate","data":{"temp_setpoint":45.5,"mode":"Hold"}}"#,
    );

    let out = d.dispatch(&rig.ctx, 1, r#"{"action":"getEvents"}"#);
    let Some(Reply::Events { data }) = out.reply else {
        panic!("expected events reply");
    };
    let descriptions: Vec<&str> = data.iter().map(|e| e.description.as_str()).collect();
    assert_eq!(
        descriptions,
        vec![
            "Temperature setpoint changed from 30.0 to 45.5",
            "Mode changed to: Hold"
        ]
    );
    assert!(data.iter().all(|e| e.time == 1_000));
}

#[test]
fn control_update_resets_running_time() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();
    rig.clock.set(60_000);
    let out = d.dispatch(
        &rig.ctx,
        1,
        r#"{"action":"controlUpdate","data":{"rpm_setpoint":150}}"#,
    );
    let Some(Reply::DataUpdate { data }) = out.broadcast else {
        panic!("expected dataUpdate");
    };
    assert_eq!(data.running_time, 0);

    rig.clock.advance(5_500);
    let snap = rig.ctx.store.snapshot(rig.clock.now_ms()).unwrap();
    assert_eq!(snap.running_time, 5);
}

#[test]
fn invalid_control_payloads_rejected() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();

    let out = d.dispatch(&rig.ctx, 1, r#"{"action":"controlUpdate"}"#);
    assert_eq!(error_message(&out), "Missing or invalid data field");

    let out = d.dispatch(&rig.ctx, 1, r#"{"action":"controlUpdate","data":"hot"}"#);
    assert_eq!(error_message(&out), "Missing or invalid data field");

    let out = d.dispatch(
        &rig.ctx,
        1,
        r#"{"action":"controlUpdate","data":{"temp_setpoint":"hot"}}"#,
    );
    assert_eq!(error_message(&out), "Invalid control data");

    let out = d.dispatch(
        &rig.ctx,
        1,
        r#"{"action":"controlUpdate","data":{"mode":"boil"}}"#,
    );
    assert_eq!(error_message(&out), "Invalid control data");

    let out = d.dispatch(
        &rig.ctx,
        1,
        r#"{"action":"controlUpdate","data":{"ramp_rate":0}}"#,
    );
    assert_eq!(error_message(&out), "Invalid ramp_rate");

    // Nothing above touched state.
    let view = rig.ctx.store.with_lock(|s| s.system.config_view()).unwrap();
    assert_eq!(view.mode, Mode::Off);
    assert!((view.ramp_rate - 1.0).abs() < f32::EPSILON);
}

// ── Queries ───────────────────────────────────────────────────

#[test]
fn empty_history_serialises_as_empty_array() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();
    let out = d.dispatch(&rig.ctx, 1, r#"{"action":"getHistory"}"#);
    let reply = out.reply.unwrap();
    assert_eq!(reply, Reply::History { data: Vec::new() });
    assert_eq!(reply.to_json(), r#"{"type":"history","data":[]}"#);
}

#[test]
fn history_is_chronological() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();
    assert!(rig.ctx.store.append_history(21.0, 100));
    assert!(rig.ctx.store.append_history(22.5, 600));

    let out = d.dispatch(&rig.ctx, 1, r#"{"action":"getHistory"}"#);
    let Some(Reply::History { data }) = out.reply else {
        panic!("expected history reply");
    };
    let times: Vec<u64> = data.iter().map(|e| e.time).collect();
    assert_eq!(times, vec![100, 600]);
}

#[test]
fn get_config_reports_alert_thresholds() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();
    d.dispatch(
        &rig.ctx,
        1,
        r#"{"action":"controlUpdate","data":{"alertTempThreshold":90,"ramp_rate":2.5}}"#,
    );
    let out = d.dispatch(&rig.ctx, 1, r#"{"action":"getConfig"}"#);
    let json = out.reply.unwrap().to_json();
    let v: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(v["type"], "config");
    assert_eq!(v["data"]["alertTempThreshold"], 90.0);
    assert_eq!(v["data"]["ramp_rate"], 2.5);
    assert_eq!(v["data"]["mode"], "Off");
}

// ── clearFault ────────────────────────────────────────────────

#[test]
fn clear_fault_resets_actuator_latch() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();
    rig.actuator_fault
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let out = d.dispatch(&rig.ctx, 1, r#"{"action":"clearFault"}"#);
    assert_eq!(out.reply, Some(Reply::ack("Fault cleared")));
    assert!(!rig.actuator_fault.load(std::sync::atomic::Ordering::SeqCst));

    let events = rig.ctx.store.list_events().unwrap();
    assert_eq!(events.last().unwrap().description, "Fault cleared");
}

#[test]
fn clear_fault_without_fault_logs_nothing() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();

    let out = d.dispatch(&rig.ctx, 1, r#"{"action":"clearFault"}"#);
    assert_eq!(out.reply, Some(Reply::ack("Fault cleared")));
    assert!(rig.ctx.store.list_events().unwrap().is_empty());
}

// ── Notes ─────────────────────────────────────────────────────

#[test]
fn notepad_save_list_load() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();

    let out = d.dispatch(
        &rig.ctx,
        1,
        r#"{"action":"notepadSave","data":{"experiment":"run1","notes":"stirred at 150"}}"#,
    );
    assert_eq!(out.reply, Some(Reply::ack("Note saved")));

    let out = d.dispatch(&rig.ctx, 1, r#"{"action":"notepadList"}"#);
    assert_eq!(
        out.reply,
        Some(Reply::NotepadList {
            experiments: vec!["run1".to_owned()]
        })
    );

    let out = d.dispatch(
        &rig.ctx,
        1,
        r#"{"action":"notepadLoad","data":{"experiment":"run1"}}"#,
    );
    assert_eq!(
        out.reply,
        Some(Reply::NotepadData {
            experiment: "run1".to_owned(),
            notes: "stirred at 150".to_owned(),
        })
    );
}

#[test]
fn notepad_errors() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();

    let out = d.dispatch(
        &rig.ctx,
        1,
        r#"{"action":"notepadLoad","data":{"experiment":"ghost"}}"#,
    );
    assert_eq!(error_message(&out), "Note not found");

    let out = d.dispatch(&rig.ctx, 1, r#"{"action":"notepadLoad","data":{}}"#);
    assert_eq!(error_message(&out), "Missing experiment parameter");

    let out = d.dispatch(
        &rig.ctx,
        1,
        r#"{"action":"notepadSave","data":{"experiment":"run1"}}"#,
    );
    assert_eq!(error_message(&out), "Missing experiment or notes parameter");

    let out = d.dispatch(
        &rig.ctx,
        1,
        r#"{"action":"notepadSave","data":{"experiment":"///","notes":"x"}}"#,
    );
    assert_eq!(error_message(&out), "Failed to save note");
}

#[test]
fn notes_work_while_state_lock_is_held() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();
    let _guard = rig.ctx.store.try_lock(Duration::from_secs(1)).unwrap();

    let out = d.dispatch(
        &rig.ctx,
        1,
        r#"{"action":"notepadSave","data":{"experiment":"a","notes":"b"}}"#,
    );
    assert_eq!(out.reply, Some(Reply::ack("Note saved")));
}

// ── Rate limiting ─────────────────────────────────────────────

#[test]
fn eleventh_message_in_a_burst_is_rate_limited() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();
    for _ in 0..10 {
        let out = d.dispatch(&rig.ctx, 1, r#"{"action":"getConfig"}"#);
        assert!(matches!(out.reply, Some(Reply::Config { .. })));
    }
    let out = d.dispatch(&rig.ctx, 1, r#"{"action":"getConfig"}"#);
    assert_eq!(error_message(&out), "Rate limit exceeded");

    // Other clients keep their own budget.
    let out = d.dispatch(&rig.ctx, 2, r#"{"action":"getConfig"}"#);
    assert!(matches!(out.reply, Some(Reply::Config { .. })));
}

// ── resetSystem ───────────────────────────────────────────────

#[test]
fn reset_acks_before_requesting_restart() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();

    let out = d.dispatch(&rig.ctx, 7, r#"{"action":"resetSystem"}"#);
    assert!(out.restart);
    assert!(!rig.latch.requested(), "dispatch alone must not restart");

    CommandDispatcher::deliver(&rig.ctx, 7, &out);
    assert_eq!(
        rig.transport.sent_to(7),
        vec![r#"{"type":"ack","message":"Restarting"}"#.to_owned()]
    );
    assert!(rig.latch.requested());
}

// ── Lock timeout ──────────────────────────────────────────────

#[test]
fn lock_timeout_drops_message_without_reply() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();
    {
        let _guard = rig.ctx.store.try_lock(Duration::from_secs(1)).unwrap();

        let out = d.dispatch(&rig.ctx, 1, r#"{"action":"getConfig"}"#);
        assert!(out.is_empty());

        let out = d.dispatch(
            &rig.ctx,
            1,
            r#"{"action":"controlUpdate","data":{"temp_setpoint":55}}"#,
        );
        assert!(out.is_empty());
        CommandDispatcher::deliver(&rig.ctx, 1, &out);
    }

    assert!(rig.transport.sent_to(1).is_empty());
    let view = rig.ctx.store.with_lock(|s| s.system.config_view()).unwrap();
    assert!((view.temp_setpoint - 30.0).abs() < f32::EPSILON);
}

// ── Session loop ──────────────────────────────────────────────

#[test]
fn session_tick_drains_queue_and_forgets_disconnected_clients() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();
    rig.transport.connect(3);

    rig.inbound
        .push(3, r#"{"action":"getConfig"}"#.to_owned())
        .unwrap();
    rig.inbound
        .push(3, r#"{"action":"controlUpdate","data":{"mode":"off"}}"#.to_owned())
        .unwrap();

    assert_eq!(scheduler::session_tick(&rig.ctx, &mut d), 2);
    assert!(rig.inbound.is_empty());
    assert_eq!(rig.transport.sent_to(3).len(), 2);
    assert_eq!(rig.transport.broadcasts().len(), 1);
    assert_eq!(d.sessions().len(), 1);

    rig.transport.disconnect(3);
    rig.inbound.notify_disconnect(3);
    assert_eq!(scheduler::session_tick(&rig.ctx, &mut d), 0);
    assert!(d.sessions().is_empty());
}

#[test]
fn sessions_released_when_disconnect_notices_overflow() {
    let rig = Rig::new();
    let mut d = CommandDispatcher::new();

    // Two batches keep each one inside the inbound queue depth.
    for batch in [1..=10u32, 11..=20] {
        for id in batch {
            rig.transport.connect(id);
            rig.inbound
                .push(id, r#"{"action":"getConfig"}"#.to_owned())
                .unwrap();
        }
        assert_eq!(scheduler::session_tick(&rig.ctx, &mut d), 10);
    }
    assert_eq!(d.sessions().len(), 20);

    // Everyone leaves within one tick; most notices do not fit.
    for id in 1..=20 {
        rig.transport.disconnect(id);
        rig.inbound.notify_disconnect(id);
    }
    scheduler::session_tick(&rig.ctx, &mut d);
    assert!(d.sessions().is_empty());
}
