//! Motion state machine behavior: position tracking, DDA derivation,
//! offsets, homing, and the G-code front end, all against a scripted
//! transport.

mod common;

use common::ScriptedTransport;
use fablink::machine::dda;
use fablink::{
    Axis, AxisSet, Driver, GcodeError, GcodeInterpreter, MachineProfile, MotionController,
    MotionError, Point, Target,
};
use std::time::Duration;

const SUCCESS: u8 = 0x81;

fn test_profile() -> MachineProfile {
    MachineProfile {
        name: "test".to_string(),
        axis_count: 5,
        steps_per_mm: [10.0, 10.0, 10.0, 10.0, 10.0],
        max_feedrate: [1_000.0, 1_000.0, 1_000.0, 1_000.0, 1_000.0],
        homing_timeout_s: 60,
    }
}

fn controller(transport: &ScriptedTransport) -> MotionController<ScriptedTransport> {
    let driver = Driver::new(transport.clone()).with_timeout(Duration::from_millis(20));
    MotionController::new(driver, test_profile())
}

#[test]
fn move_updates_position_and_queues_extended_point() {
    let transport = ScriptedTransport::new();
    transport.respond(SUCCESS, &[]); // set_position ack
    transport.respond(SUCCESS, &[]); // move ack

    let mut motion = controller(&transport);
    motion.set_position(Point::zero()).unwrap();
    motion.move_to(&Target::xyz(1.0, 2.0, 3.0), 500.0).unwrap();

    let workspace = motion.position().workspace();
    assert_eq!(workspace.coords(), &[1.0, 2.0, 3.0, 0.0, 0.0]);

    let sent = transport.sent_commands();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0][0], 140); // set extended position
    assert_eq!(sent[1][0], 139); // queue extended point

    // Target steps at 10 steps/mm.
    let steps: Vec<i32> = sent[1][1..21]
        .chunks(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    assert_eq!(steps, vec![10, 20, 30, 0, 0]);

    // The wire DDA value matches the algorithm applied to this move.
    let wire_dda = u32::from_le_bytes([sent[1][21], sent[1][22], sent[1][23], sent[1][24]]);
    let displacement = Point::xyz(1.0, 2.0, 3.0);
    let profile = test_profile();
    let clamped = dda::clamped_feedrate(&displacement, &profile.max_feedrate, 500.0);
    assert_eq!(
        wire_dda,
        dda::dda_speed(&displacement, &profile.steps_per_mm, clamped)
    );
}

#[test]
fn unknown_axis_blocks_moves_without_io() {
    let transport = ScriptedTransport::new();
    transport.respond(SUCCESS, &[]);
    transport.respond(SUCCESS, &[]);

    let mut motion = controller(&transport);
    motion.set_position(Point::zero()).unwrap();
    motion.move_to(&Target::xyz(1.0, 2.0, 3.0), 500.0).unwrap();
    let writes_before = transport.write_count();

    motion.lose_position(AxisSet::single(Axis::X));
    match motion.move_to(&Target::xyz(5.0, 2.0, 3.0), 500.0) {
        Err(MotionError::UnspecifiedAxis(Axis::X)) => {}
        other => panic!("expected UnspecifiedAxis(X), got {other:?}"),
    }
    // Nothing reached the wire.
    assert_eq!(transport.write_count(), writes_before);

    // Axes not named in the target stay usable.
    transport.respond(SUCCESS, &[]);
    motion
        .move_to(&Target::new().with(Axis::Y, 9.0), 500.0)
        .unwrap();
}

#[test]
fn zero_displacement_is_rejected() {
    let transport = ScriptedTransport::new();
    transport.respond(SUCCESS, &[]);

    let mut motion = controller(&transport);
    motion.set_position(Point::xyz(1.0, 1.0, 0.0)).unwrap();
    assert!(matches!(
        motion.move_to(&Target::xyz(1.0, 1.0, 0.0), 200.0),
        Err(MotionError::ZeroDisplacement)
    ));
}

#[test]
fn invalid_feedrates_are_rejected() {
    let transport = ScriptedTransport::new();
    transport.respond(SUCCESS, &[]);

    let mut motion = controller(&transport);
    motion.set_position(Point::zero()).unwrap();
    for bad in [0.0, -10.0, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            motion.move_to(&Target::xyz(1.0, 0.0, 0.0), bad),
            Err(MotionError::InvalidFeedrate(_))
        ));
    }
}

#[test]
fn dda_scales_inversely_and_saturates_at_axis_maximum() {
    let profile = test_profile();
    let displacement = Point::xyz(10.0, 0.0, 0.0);

    let dda_at = |feedrate: f64| {
        let clamped = dda::clamped_feedrate(&displacement, &profile.max_feedrate, feedrate);
        dda::dda_speed(&displacement, &profile.steps_per_mm, clamped)
    };

    // Halving the feedrate doubles the step interval.
    assert_eq!(dda_at(250.0), 2 * dda_at(500.0));
    // Above the axis ceiling the interval stops shrinking.
    assert_eq!(dda_at(1_000.0), dda_at(5_000.0));
    assert_eq!(dda_at(1_000.0), dda_at(100_000.0));
}

#[test]
fn unsupported_axis_on_small_profile_is_rejected() {
    let transport = ScriptedTransport::new();
    transport.respond(SUCCESS, &[]);

    let driver = Driver::new(transport.clone()).with_timeout(Duration::from_millis(20));
    let mut profile = test_profile();
    profile.axis_count = 3;
    let mut motion = MotionController::new(driver, profile);

    motion.set_position(Point::zero()).unwrap();
    assert!(matches!(
        motion.move_to(&Target::new().with(Axis::B, 1.0), 100.0),
        Err(MotionError::UnsupportedAxis(Axis::B))
    ));
}

#[test]
fn homing_emits_find_axes_and_loses_position() {
    let transport = ScriptedTransport::new();
    transport.respond(SUCCESS, &[]); // set_position
    transport.respond(SUCCESS, &[]); // find axes minimums

    let mut motion = controller(&transport);
    motion.set_position(Point::zero()).unwrap();

    let axes = AxisSet::single(Axis::X).with(Axis::Y);
    motion.home_minimums(axes, 600.0).unwrap();

    let sent = transport.sent_commands();
    let homing = &sent[1];
    assert_eq!(homing[0], 131);
    assert_eq!(homing[1], 0b11);
    // 600 mm/min at 10 steps/mm: 10_000 us per step.
    assert_eq!(
        u32::from_le_bytes([homing[2], homing[3], homing[4], homing[5]]),
        10_000
    );
    assert_eq!(u16::from_le_bytes([homing[6], homing[7]]), 60);

    assert!(!motion.position().is_known(Axis::X));
    assert!(!motion.position().is_known(Axis::Y));
    assert!(motion.position().is_known(Axis::Z));
}

#[test]
fn offset_register_shifts_device_coordinates() {
    let transport = ScriptedTransport::new();
    transport.respond(SUCCESS, &[]); // set_position
    transport.respond(SUCCESS, &[]); // move

    let mut motion = controller(&transport);
    motion.set_position(Point::zero()).unwrap();

    motion.set_offset(fablink::OffsetRegister::First, Point::xyz(5.0, 0.0, 0.0));
    motion.select_offset_register(fablink::OffsetRegister::First);
    motion
        .move_to(&Target::new().with(Axis::X, 10.0), 300.0)
        .unwrap();

    let sent = transport.sent_commands();
    let x_steps = i32::from_le_bytes([sent[1][1], sent[1][2], sent[1][3], sent[1][4]]);
    // Device space is workspace plus offset: (10 + 5) mm at 10 steps/mm.
    assert_eq!(x_steps, 150);
    // Workspace position tracks the commanded coordinate.
    assert_eq!(motion.position().workspace()[Axis::X], 10.0);
    assert_eq!(motion.position().effective()[Axis::X], 15.0);
}

// ============ G-code front end ============

fn interpreter(transport: &ScriptedTransport) -> GcodeInterpreter<ScriptedTransport> {
    GcodeInterpreter::new(controller(transport))
}

#[test]
fn gcode_zeroing_then_move() {
    let transport = ScriptedTransport::new();
    transport.respond(SUCCESS, &[]); // G92
    transport.respond(SUCCESS, &[]); // G1

    let mut gcode = interpreter(&transport);
    gcode.execute_line("G92 X0 Y0 Z0 A0 B0").unwrap();
    gcode.execute_line("G1 X5 Y0 Z0 F300").unwrap();

    let sent = transport.sent_commands();
    assert_eq!(sent[0][0], 140);
    assert_eq!(sent[1][0], 139);
    assert_eq!(
        gcode.motion().position().workspace().coords(),
        &[5.0, 0.0, 0.0, 0.0, 0.0]
    );
}

#[test]
fn gcode_move_without_feedrate_is_rejected() {
    let transport = ScriptedTransport::new();
    transport.respond(SUCCESS, &[]);

    let mut gcode = interpreter(&transport);
    gcode.execute_line("G92 X0 Y0 Z0 A0 B0").unwrap();
    let writes_before = transport.write_count();

    assert!(matches!(
        gcode.execute_line("G1 X5"),
        Err(GcodeError::Motion(MotionError::FeedrateUnset))
    ));
    assert_eq!(transport.write_count(), writes_before);
}

#[test]
fn gcode_feedrate_is_modal() {
    let transport = ScriptedTransport::new();
    transport.respond(SUCCESS, &[]);
    transport.respond(SUCCESS, &[]);
    transport.respond(SUCCESS, &[]);

    let mut gcode = interpreter(&transport);
    gcode.execute_line("G92 X0 Y0 Z0 A0 B0").unwrap();
    gcode.execute_line("G1 X5 F300").unwrap();
    gcode.execute_line("G1 X10").unwrap();
    assert_eq!(gcode.motion().feedrate(), Some(300.0));
}

#[test]
fn gcode_dwell_and_offsets() {
    let transport = ScriptedTransport::new();
    transport.respond(SUCCESS, &[]); // G92
    transport.respond(SUCCESS, &[]); // G4
    transport.respond(SUCCESS, &[]); // G1

    let mut gcode = interpreter(&transport);
    gcode.execute_line("G92 X0 Y0 Z0 A0 B0").unwrap();
    gcode.execute_line("G4 P750").unwrap();
    gcode.execute_line("G10 P1 X5").unwrap();
    gcode.execute_line("G54").unwrap();
    gcode.execute_line("G1 X10 F300").unwrap();

    let sent = transport.sent_commands();
    assert_eq!(sent[1][0], 133); // delay
    assert_eq!(
        u32::from_le_bytes([sent[1][1], sent[1][2], sent[1][3], sent[1][4]]),
        750
    );
    let x_steps = i32::from_le_bytes([sent[2][1], sent[2][2], sent[2][3], sent[2][4]]);
    assert_eq!(x_steps, 150);
}

#[test]
fn gcode_homing_marks_axes_unknown() {
    let transport = ScriptedTransport::new();
    transport.respond(SUCCESS, &[]); // G92
    transport.respond(SUCCESS, &[]); // G162

    let mut gcode = interpreter(&transport);
    gcode.execute_line("G92 X0 Y0 Z0 A0 B0").unwrap();
    gcode.execute_line("G162 Z F900").unwrap();

    let sent = transport.sent_commands();
    assert_eq!(sent[1][0], 132);
    assert_eq!(sent[1][1], 0b100);
    assert!(!gcode.motion().position().is_known(Axis::Z));
    assert!(gcode.motion().position().is_known(Axis::X));
}

#[test]
fn gcode_temperature_commands_use_tool_envelope() {
    let transport = ScriptedTransport::new();
    transport.respond(SUCCESS, &[]);

    let mut gcode = interpreter(&transport);
    gcode.execute_line("M104 S220").unwrap();

    let sent = transport.sent_commands();
    assert_eq!(sent[0], vec![136, 0, 3, 2, 220, 0]);
}

#[test]
fn gcode_tool_select_remaps_extrusion_axis() {
    let transport = ScriptedTransport::new();
    transport.respond(SUCCESS, &[]); // G92
    transport.respond(SUCCESS, &[]); // T1 change tool
    transport.respond(SUCCESS, &[]); // G1 with E

    let mut gcode = interpreter(&transport);
    gcode.execute_line("G92 X0 Y0 Z0 A0 B0").unwrap();
    gcode.execute_line("T1").unwrap();
    gcode.execute_line("G1 E7 F300").unwrap();

    let sent = transport.sent_commands();
    assert_eq!(sent[1], vec![134, 1]);
    // E maps to axis B for tool 1.
    let b_steps = i32::from_le_bytes([sent[2][17], sent[2][18], sent[2][19], sent[2][20]]);
    assert_eq!(b_steps, 70);
    assert_eq!(gcode.motion().position().workspace()[Axis::B], 7.0);
}

#[test]
fn gcode_fan_and_motor_toggles() {
    let transport = ScriptedTransport::new();
    transport.respond(SUCCESS, &[]);
    transport.respond(SUCCESS, &[]);
    transport.respond(SUCCESS, &[]);

    let mut gcode = interpreter(&transport);
    gcode.execute_line("M106").unwrap();
    gcode.execute_line("M101").unwrap();
    gcode.execute_line("M103").unwrap();

    let sent = transport.sent_commands();
    assert_eq!(sent[0], vec![136, 0, 12, 1, 1]);
    assert_eq!(sent[1], vec![136, 0, 10, 1, 0b11]);
    assert_eq!(sent[2], vec![136, 0, 10, 1, 0]);
}

#[test]
fn gcode_unsupported_codes_are_rejected() {
    let transport = ScriptedTransport::new();
    let mut gcode = interpreter(&transport);

    assert!(matches!(
        gcode.execute_line("M132"),
        Err(GcodeError::UnsupportedCode {
            letter: 'M',
            number: 132
        })
    ));
    assert!(matches!(
        gcode.execute_line("G28"),
        Err(GcodeError::UnsupportedCode {
            letter: 'G',
            number: 28
        })
    ));
    assert_eq!(transport.write_count(), 0);
}

#[test]
fn gcode_display_message_carries_comment_text() {
    let transport = ScriptedTransport::new();
    transport.respond(SUCCESS, &[]);

    let mut gcode = interpreter(&transport);
    gcode.execute_line("M70 P5 (Heating...)").unwrap();

    let sent = transport.sent_commands();
    assert_eq!(sent[0][0], 149);
    assert_eq!(sent[0][4], 5); // timeout
    assert_eq!(&sent[0][5..], b"Heating...\0");
}

#[test]
fn gcode_comment_only_lines_are_no_ops() {
    let transport = ScriptedTransport::new();
    let mut gcode = interpreter(&transport);
    gcode.execute_line("").unwrap();
    gcode.execute_line("; a note").unwrap();
    gcode.execute_line("(another note)").unwrap();
    assert_eq!(transport.write_count(), 0);
}
