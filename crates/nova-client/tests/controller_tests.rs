//! 控制器门面集成测试
//!
//! 通过 `MockConnector` 驱动完整的连接 → 使能 → 运动 → 断开流程。

use nova_client::{
    AlarmStatus, DancePlayer, NovaBuilder, NovaController, RobotError, SessionState,
};
use nova_driver::PipelineConfig;
use nova_net::{MockConnector, MockRobot};
use nova_protocol::{DashboardCommand, JointTarget, Pose};
use nova_tools::choreography::BASE_POSE;
use nova_tools::{BeatSignal, DanceMove, FrequencyBand, MoveLibrary, SafetyPolicy};
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

fn fast_pipeline() -> PipelineConfig {
    PipelineConfig {
        feed_period_ms: 1,
        queue_poll_ms: 10,
        join_timeout_ms: 500,
    }
}

fn builder() -> NovaBuilder {
    NovaBuilder::new()
        .settle_times(0, 0)
        .pipeline(fast_pipeline())
}

fn controller(robot: &MockRobot) -> NovaController<MockConnector> {
    builder().build_with(MockConnector::new(robot.clone()))
}

fn enabled(robot: &MockRobot) -> NovaController<MockConnector> {
    let controller = controller(robot);
    controller.connect().unwrap();
    controller.enable().unwrap();
    robot.clear_calls();
    controller
}

/// 轮询直到条件成立或超时
fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

// ==================== 连接 ====================

#[test]
fn test_connect_and_disconnect() {
    let robot = MockRobot::new();
    let controller = controller(&robot);
    assert_eq!(controller.state(), SessionState::Disconnected);

    controller.connect().unwrap();
    assert_eq!(controller.state(), SessionState::Connected);
    assert!(robot.command_open());
    assert!(robot.feedback_open());

    // 重复连接不会再次打开通道
    controller.connect().unwrap();
    assert_eq!(robot.command_opens(), 1);

    let report = controller.disconnect();
    assert!(report.is_clean());
    assert_eq!(controller.state(), SessionState::Disconnected);
    assert!(!robot.command_open());
    assert!(!robot.feedback_open());

    // 断开后可以重新连接
    controller.connect().unwrap();
    assert_eq!(robot.command_opens(), 2);
    assert_eq!(robot.feedback_opens(), 2);
}

#[test]
fn test_connect_rolls_back_when_feedback_fails() {
    let robot = MockRobot::new();
    robot.fail_open_feedback(true);
    let controller = controller(&robot);

    let err = controller.connect().unwrap_err();
    assert!(matches!(err, RobotError::Connection(_)));
    assert!(err.is_retryable());
    assert_eq!(controller.state(), SessionState::Disconnected);

    // Dashboard 通道已打开过，必须被关闭
    assert_eq!(robot.command_opens(), 1);
    assert!(!robot.command_open());
    assert_eq!(robot.command_shutdowns(), 1);

    let errors = controller.recent_errors(10);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Connection error:"));
}

#[test]
fn test_connect_fails_before_opening_feedback() {
    let robot = MockRobot::new();
    robot.fail_open_command(true);
    let controller = controller(&robot);

    assert!(matches!(
        controller.connect(),
        Err(RobotError::Connection(_))
    ));
    assert_eq!(robot.feedback_opens(), 0);
    assert_eq!(controller.state(), SessionState::Disconnected);
}

#[test]
fn test_drop_closes_channels() {
    let robot = MockRobot::new();
    {
        let controller = controller(&robot);
        controller.connect().unwrap();
    }
    assert!(!robot.command_open());
    assert!(!robot.feedback_open());
}

// ==================== 使能 ====================

#[test]
fn test_enable_command_sequence() {
    let robot = MockRobot::new();
    let controller = controller(&robot);
    controller.connect().unwrap();
    controller.enable().unwrap();

    assert_eq!(controller.state(), SessionState::Enabled);
    assert_eq!(
        robot.calls(),
        vec![
            DashboardCommand::EnableRobot,
            DashboardCommand::ClearError,
            DashboardCommand::VelL(50),
            DashboardCommand::AccL(50),
            DashboardCommand::VelJ(50),
            DashboardCommand::AccJ(50),
        ]
    );
}

#[test]
fn test_enable_requires_connection() {
    let robot = MockRobot::new();
    let controller = controller(&robot);
    assert!(matches!(controller.enable(), Err(RobotError::NotConnected)));
    assert!(robot.calls().is_empty());
}

#[test]
fn test_enable_rejected_by_controller() {
    let robot = MockRobot::new();
    robot.set_reply("EnableRobot", "-1,{},EnableRobot();");
    let controller = controller(&robot);
    controller.connect().unwrap();

    assert!(matches!(controller.enable(), Err(RobotError::Enable(_))));
    assert_eq!(controller.state(), SessionState::Connected);
    assert_eq!(robot.count_calls("ClearError"), 0);
    assert!(controller.recent_errors(1)[0].starts_with("Enable error:"));
}

#[test]
fn test_enable_fails_outside_tcp_mode() {
    let robot = MockRobot::new();
    robot.set_reply("EnableRobot", "Control Mode Is Not Tcp");
    let controller = controller(&robot);
    controller.connect().unwrap();

    assert!(matches!(controller.enable(), Err(RobotError::Enable(_))));
    assert_eq!(controller.state(), SessionState::Connected);
}

#[test]
fn test_rejected_speed_scaling_only_warns() {
    let robot = MockRobot::new();
    robot.set_reply("VelL", "-1,{},VelL(50);");
    let controller = controller(&robot);
    controller.connect().unwrap();

    controller.enable().unwrap();
    assert_eq!(controller.state(), SessionState::Enabled);
    assert_eq!(robot.count_calls("AccJ"), 1);
}

#[test]
fn test_enable_fails_when_channel_breaks() {
    let robot = MockRobot::new();
    robot.fail_calls("ClearError");
    let controller = controller(&robot);
    controller.connect().unwrap();

    assert!(matches!(controller.enable(), Err(RobotError::Enable(_))));
    assert_eq!(controller.state(), SessionState::Connected);
}

#[test]
fn test_disable_returns_to_connected() {
    let robot = MockRobot::new();
    let controller = enabled(&robot);

    controller.disable().unwrap();
    assert_eq!(controller.state(), SessionState::Connected);
    assert_eq!(robot.count_calls("DisableRobot"), 1);
    assert!(matches!(
        controller.enqueue_move(BASE_POSE),
        Err(RobotError::NotEnabled)
    ));
}

// ==================== 速度 ====================

#[test]
fn test_set_speed_clamps_and_applies() {
    let robot = MockRobot::new();
    let controller = enabled(&robot);

    assert_eq!(controller.set_speed(150).unwrap(), 100);
    assert_eq!(controller.current_speed(), 100);
    assert_eq!(
        robot.calls(),
        vec![
            DashboardCommand::VelL(100),
            DashboardCommand::AccL(100),
            DashboardCommand::VelJ(100),
            DashboardCommand::AccJ(100),
        ]
    );

    assert_eq!(controller.set_speed(0).unwrap(), 1);
    assert!(robot.calls().contains(&DashboardCommand::AccJ(1)));
}

#[test]
fn test_set_speed_while_disconnected_only_stores() {
    let robot = MockRobot::new();
    let controller = controller(&robot);

    assert_eq!(controller.set_speed(-20).unwrap(), 1);
    assert_eq!(controller.set_speed(30).unwrap(), 30);
    assert!(robot.calls().is_empty());

    // 使能时下发保存的速度
    controller.connect().unwrap();
    controller.enable().unwrap();
    assert!(robot.calls().contains(&DashboardCommand::VelL(30)));
}

// ==================== 运动 ====================

#[test]
fn test_enqueue_requires_enabled() {
    let robot = MockRobot::new();
    let controller = controller(&robot);
    assert!(matches!(
        controller.enqueue_move(BASE_POSE),
        Err(RobotError::NotEnabled)
    ));

    controller.connect().unwrap();
    assert!(matches!(
        controller.enqueue_move(BASE_POSE),
        Err(RobotError::NotEnabled)
    ));
}

#[test]
fn test_enqueue_rejects_non_finite_pose() {
    let robot = MockRobot::new();
    let controller = enabled(&robot);
    let pose = Pose::new(f64::NAN, 0.0, 200.0, 180.0, 0.0, 0.0);
    assert!(matches!(
        controller.enqueue_move(pose),
        Err(RobotError::InvalidTarget(_))
    ));
}

#[test]
fn test_enqueued_move_is_executed_and_recorded() {
    let robot = MockRobot::new();
    let controller = enabled(&robot);
    controller.set_speed(30).unwrap();

    controller.enqueue_move(BASE_POSE).unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        controller.move_history(10).len() == 1
    }));

    let record = &controller.move_history(1)[0];
    assert_eq!(record.pose, BASE_POSE);
    assert_eq!(record.command, "MovL(-350,0,200,180,0,0,0,speed=30)");
    assert!(robot.calls().contains(&DashboardCommand::mov_l(BASE_POSE, 30)));
    assert_eq!(controller.metrics().moves_executed, 1);
}

#[test]
fn test_unsafe_target_executes_under_warn_only() {
    let robot = MockRobot::new();
    let controller = enabled(&robot);
    let near_base = Pose::new(-50.0, 50.0, 200.0, 180.0, 0.0, 0.0);

    controller.enqueue_move(near_base).unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        robot.count_calls("MovL") == 1
    }));
    assert!(wait_until(Duration::from_secs(1), || {
        controller.metrics().unsafe_targets == 1
    }));
}

#[test]
fn test_unsafe_target_blocked_under_strict_policy() {
    let robot = MockRobot::new();
    let controller = builder()
        .safety_policy(SafetyPolicy::Strict)
        .build_with(MockConnector::new(robot.clone()));
    controller.connect().unwrap();
    controller.enable().unwrap();

    controller
        .enqueue_move(Pose::new(-50.0, 50.0, 200.0, 180.0, 0.0, 0.0))
        .unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        controller.metrics().moves_rejected == 1
    }));
    assert_eq!(robot.count_calls("MovL"), 0);
    assert!(controller.recent_errors(1)[0].contains("shoulder"));
}

#[test]
fn test_failed_move_is_logged_and_dispatch_continues() {
    let robot = MockRobot::new();
    let controller = enabled(&robot);
    robot.set_reply("MovL", "-40001,{},MovL();");

    controller.enqueue_move(BASE_POSE).unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        controller.metrics().moves_failed == 1
    }));
    assert!(controller.recent_errors(1)[0].starts_with("Move execution error:"));

    robot.set_reply("MovL", "0,{},MovL();");
    controller.enqueue_move(BASE_POSE).unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        controller.metrics().moves_executed == 1
    }));
}

#[test]
fn test_move_home_sends_joint_move() {
    let robot = MockRobot::new();
    let controller = controller(&robot);
    assert!(matches!(controller.move_home(), Err(RobotError::NotEnabled)));

    controller.connect().unwrap();
    controller.enable().unwrap();
    controller.move_home().unwrap();
    let expected = DashboardCommand::mov_j(JointTarget([0.0, 45.0, 45.0, 0.0, 90.0, 0.0]), 50);
    assert!(robot.calls().contains(&expected));
}

#[test]
fn test_emergency_stop_drains_queue() {
    let robot = MockRobot::new();
    let controller = enabled(&robot);
    robot.set_call_delay(Duration::from_millis(50));

    for i in 0..8 {
        controller
            .enqueue_move(Pose::new(-350.0, i as f64, 200.0, 180.0, 0.0, 0.0))
            .unwrap();
    }
    let drained = controller.emergency_stop().unwrap();
    assert_eq!(controller.queue_len(), 0);

    controller.disconnect();
    let executed = robot.count_calls("MovL");
    assert_eq!(executed + drained, 8);
    assert!(executed <= 1);
    assert_eq!(robot.count_calls("Stop"), 1);
}

#[test]
fn test_emergency_stop_requires_connection() {
    let robot = MockRobot::new();
    let controller = controller(&robot);
    assert!(matches!(
        controller.emergency_stop(),
        Err(RobotError::NotConnected)
    ));
}

// ==================== 反馈与状态 ====================

#[test]
fn test_feedback_updates_current_position() {
    let robot = MockRobot::new();
    let controller = controller(&robot);
    controller.connect().unwrap();

    let pose = Pose::new(-300.0, 20.0, 250.0, 180.0, 0.0, 45.0);
    robot.push_feedback_pose(pose);
    assert!(wait_until(Duration::from_secs(2), || {
        controller.current_position() == pose
    }));
    assert_eq!(controller.feedback().robot_mode, Some(5));
}

#[test]
fn test_status_snapshot() {
    let robot = MockRobot::new();
    let controller = controller(&robot);

    let status = controller.status();
    assert_eq!(status.state, SessionState::Disconnected);
    assert_eq!(status.robot_mode, None);
    assert_eq!(status.speed, 50);

    controller.connect().unwrap();
    let status = controller.status();
    assert_eq!(status.state, SessionState::Connected);
    assert_eq!(status.robot_mode, Some(5));
    assert_eq!(status.queue_len, 0);

    robot.fail_calls("RobotMode");
    assert_eq!(controller.status().robot_mode, None);
}

// ==================== 报警 ====================

#[test]
fn test_alarm_info_states() {
    let robot = MockRobot::new();
    let controller = builder()
        .language("en")
        .build_with(MockConnector::new(robot.clone()));
    assert_eq!(controller.alarm_info(), AlarmStatus::Disconnected);

    controller.connect().unwrap();
    let status = controller.alarm_info();
    assert_eq!(status.label(), "normal");
    assert_eq!(status.message(), "no alarm");

    robot.set_error_ids(16, 0);
    match controller.alarm_info() {
        AlarmStatus::Alarm { event, message, .. } => {
            assert_eq!(event.controller_id, 16);
            assert_eq!(event.servo_id, 0);
            assert!(message.starts_with("[controller alarm] [general error] Collision detected"));
        },
        other => panic!("expected alarm, got {:?}", other),
    }

    robot.set_reply("GetErrorID", "garbage");
    assert_eq!(
        controller.alarm_info(),
        AlarmStatus::Unknown {
            raw: "garbage".into()
        }
    );

    robot.fail_calls("GetErrorID");
    assert_eq!(controller.alarm_info().label(), "error");
}

#[test]
fn test_error_id_and_clear_errors() {
    let robot = MockRobot::new();
    let controller = controller(&robot);
    assert!(matches!(controller.error_id(), Err(RobotError::NotConnected)));

    controller.connect().unwrap();
    robot.set_error_ids(22, 4096);
    assert_eq!(controller.error_id().unwrap(), "0,{22,4096},GetErrorID()");

    robot.fail_calls("GetErrorID");
    let _ = controller.alarm_info();
    assert_eq!(controller.recent_errors(10).len(), 1);

    controller.clear_errors().unwrap();
    assert!(controller.recent_errors(10).is_empty());
    assert_eq!(robot.count_calls("ClearError"), 1);
}

// ==================== 舞蹈 ====================

fn quick_library() -> MoveLibrary {
    let mut library = MoveLibrary::builtin();
    library.insert(
        DanceMove::new("quick_nod", "short nod")
            .with_duration(Duration::from_millis(40))
            .keyframe(BASE_POSE, 0.0)
            .keyframe([-350.0, 0.0, 220.0, 180.0, 0.0, 0.0], 0.5)
            .keyframe(BASE_POSE, 1.0),
    );
    library
}

#[test]
fn test_perform_move_ends_on_final_pose() {
    let robot = MockRobot::new();
    let controller = enabled(&robot);
    let player = DancePlayer::new(&controller, quick_library()).with_tick(Duration::from_millis(5));
    let stop = AtomicBool::new(false);

    let sent = player.perform_move("quick_nod", &stop).unwrap();
    assert!(sent >= 2);
    assert!(wait_until(Duration::from_secs(3), || {
        controller.metrics().moves_executed as usize == sent
    }));
    assert_eq!(controller.move_history(1)[0].pose, BASE_POSE);

    assert!(matches!(
        player.perform_move("moonwalk", &stop),
        Err(RobotError::UnknownMove(_))
    ));
}

#[test]
fn test_dance_follows_beats_and_returns_to_base() {
    let robot = MockRobot::new();
    let controller = enabled(&robot);
    let player = DancePlayer::new(&controller, quick_library()).with_tick(Duration::from_millis(1));
    let stop = AtomicBool::new(false);

    let mut beats = vec![
        BeatSignal::new(120.0, 0.9, FrequencyBand::High),
        BeatSignal::new(120.0, 0.9, FrequencyBand::High),
        BeatSignal::new(120.0, 0.2, FrequencyBand::Mid),
    ]
    .into_iter();
    let stats = player.dance(&mut beats, &stop).unwrap();

    // pump → sway，最后补发基准位姿
    assert_eq!(stats.moves_started, 2);
    assert_eq!(stats.targets_sent, 4);
}

#[test]
fn test_dance_stops_immediately_when_flag_set() {
    let robot = MockRobot::new();
    let controller = enabled(&robot);
    let player = DancePlayer::new(&controller, quick_library());
    let stop = AtomicBool::new(true);

    let mut beats = std::iter::repeat(BeatSignal::default());
    let stats = player.dance(&mut beats, &stop).unwrap();
    assert_eq!(stats.moves_started, 0);
    assert_eq!(stats.targets_sent, 1);
}
