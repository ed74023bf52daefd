//! Orchestrator scenario tests

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_test::assert_ok;

use samd_flasher::flash::fsm::FlashState;
use samd_flasher::flash::orchestrator::{MSG_ENTERING_BOOTLOADER, MSG_FLASHING};
use samd_flasher::{CancelToken, FlashOutcome, FlashRequest, ProgressMessage};

use crate::fakes::{board, flasher, port, FakeWorld, ToolBehavior, BOOT_LABEL, PID_APP, PID_BOOT};

const FIRMWARE: &str = "/tmp/PlantowerTestSketch.ino.bin";

async fn run_job(
    world: &Arc<FakeWorld>,
    request: FlashRequest,
    verify_timeout: Duration,
) -> (FlashOutcome, Vec<ProgressMessage>) {
    let job = flasher(world, verify_timeout).spawn(request, CancelToken::new());
    let mut messages = Vec::new();
    let outcome = assert_ok!(job.follow(|m| messages.push(m.clone())).await);
    (outcome, messages)
}

fn assert_single_terminal_last(messages: &[ProgressMessage]) {
    let terminal: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_terminal())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(terminal, vec![messages.len() - 1], "messages: {:?}", messages);
}

#[tokio::test]
async fn test_happy_path_same_port() {
    let world = Arc::new(FakeWorld::new(vec![port("ABC123", "/dev/ttyACM3", PID_APP)]));
    let request = FlashRequest::new(board("ABC123", "/dev/ttyACM3"), FIRMWARE);

    let (outcome, messages) = run_job(&world, request, Duration::from_millis(500)).await;

    assert_eq!(outcome, FlashOutcome::Success);
    assert_eq!(world.reset_calls(), vec!["/dev/ttyACM3"]);
    assert_eq!(
        world.flash_calls(),
        vec![("/dev/ttyACM3".to_string(), PathBuf::from(FIRMWARE))]
    );

    let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts[0], MSG_ENTERING_BOOTLOADER);
    assert_eq!(texts[1], MSG_FLASHING);
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[2], ProgressMessage::success("Board flash successful."));
    assert_single_terminal_last(&messages);
}

#[tokio::test]
async fn test_already_in_bootloader_skips_reset() {
    let world = Arc::new(
        FakeWorld::new(vec![port("ABC123", "/dev/ttyACM3", PID_BOOT)])
            .with_volumes(&["Macintosh HD", BOOT_LABEL], &["Macintosh HD", BOOT_LABEL]),
    );
    let request = FlashRequest::new(board("ABC123", "/dev/ttyACM3"), FIRMWARE);

    let (outcome, messages) = run_job(&world, request, Duration::from_millis(500)).await;

    assert_eq!(outcome, FlashOutcome::Success);
    assert!(world.reset_calls().is_empty());
    assert_eq!(world.flash_calls().len(), 1);
    assert!(messages.last().unwrap().is_success());
}

#[tokio::test]
async fn test_relocates_board_after_path_change() {
    let world = Arc::new(
        FakeWorld::new(vec![port("ABC123", "/dev/ttyACM3", PID_APP)])
            .with_ports_after_reset(vec![port("ABC123", "/dev/ttyACM5", PID_BOOT)]),
    );
    let request = FlashRequest::new(board("ABC123", "/dev/ttyACM3"), FIRMWARE);

    let (outcome, messages) = run_job(&world, request, Duration::from_millis(500)).await;

    assert_eq!(outcome, FlashOutcome::Success);
    assert_eq!(world.reset_calls(), vec!["/dev/ttyACM3"]);
    assert_eq!(world.flash_calls()[0].0, "/dev/ttyACM5");
    assert_single_terminal_last(&messages);
}

#[tokio::test]
async fn test_reused_path_is_not_trusted() {
    let world = Arc::new(
        FakeWorld::new(vec![
            port("ABC123", "/dev/ttyACM3", PID_APP),
            port("XYZ789", "/dev/ttyACM4", PID_APP),
        ])
        .with_ports_after_reset(vec![
            port("XYZ789", "/dev/ttyACM3", PID_APP),
            port("ABC123", "/dev/ttyACM6", PID_BOOT),
        ]),
    );
    let request = FlashRequest::new(board("ABC123", "/dev/ttyACM3"), FIRMWARE);

    let (outcome, _) = run_job(&world, request, Duration::from_millis(500)).await;

    // The old path now belongs to a different board
    assert_eq!(outcome, FlashOutcome::Success);
    assert_eq!(world.flash_calls().len(), 1);
    assert_eq!(world.flash_calls()[0].0, "/dev/ttyACM6");
}

#[tokio::test]
async fn test_device_lost_after_reset() {
    let world = Arc::new(
        FakeWorld::new(vec![port("ABC123", "/dev/ttyACM3", PID_APP)])
            .with_ports_after_reset(vec![port("OTHER", "/dev/ttyACM5", PID_BOOT)]),
    );
    let request = FlashRequest::new(board("ABC123", "/dev/ttyACM3"), FIRMWARE);

    let (outcome, messages) = run_job(&world, request, Duration::from_millis(500)).await;

    assert_eq!(outcome, FlashOutcome::DeviceLost);
    assert!(world.flash_calls().is_empty());
    let last = messages.last().unwrap();
    assert!(!last.ok);
    assert!(!last.done);
    assert_single_terminal_last(&messages);
}

#[tokio::test]
async fn test_bootloader_never_mounted() {
    let world = Arc::new(
        FakeWorld::new(vec![port("ABC123", "/dev/ttyACM3", PID_APP)])
            .with_volumes(&["Macintosh HD"], &["Macintosh HD"]),
    );
    let request = FlashRequest::new(board("ABC123", "/dev/ttyACM3"), FIRMWARE);

    let started = Instant::now();
    let (outcome, messages) = run_job(&world, request, Duration::from_millis(300)).await;

    assert_eq!(outcome, FlashOutcome::BootloaderNotVerified);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(world.flash_calls().is_empty());
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].text, MSG_ENTERING_BOOTLOADER);
    assert!(!messages[1].ok);
    assert!(!messages[1].done);
}

#[tokio::test]
async fn test_reset_request_failure() {
    let world = Arc::new(
        FakeWorld::new(vec![port("ABC123", "/dev/ttyACM3", PID_APP)]).with_failing_reset(),
    );
    let request = FlashRequest::new(board("ABC123", "/dev/ttyACM3"), FIRMWARE);

    let (outcome, messages) = run_job(&world, request, Duration::from_millis(300)).await;

    assert_eq!(outcome, FlashOutcome::BootloaderRequestFailed);
    assert_eq!(world.reset_calls().len(), 1);
    assert!(world.flash_calls().is_empty());
    assert_single_terminal_last(&messages);
}

#[tokio::test]
async fn test_volume_query_error_before_reset() {
    let world = Arc::new(
        FakeWorld::new(vec![port("ABC123", "/dev/ttyACM3", PID_APP)])
            .with_failing_volume_queries(true, false),
    );
    let request = FlashRequest::new(board("ABC123", "/dev/ttyACM3"), FIRMWARE);

    let (outcome, messages) = run_job(&world, request, Duration::from_millis(300)).await;

    assert_eq!(outcome, FlashOutcome::BootloaderRequestFailed);
    assert!(world.reset_calls().is_empty());
    assert!(world.flash_calls().is_empty());
    assert_eq!(
        messages.last().unwrap(),
        &FlashOutcome::BootloaderRequestFailed.to_message()
    );
    assert_single_terminal_last(&messages);
}

#[tokio::test]
async fn test_volume_query_error_after_reset() {
    let world = Arc::new(
        FakeWorld::new(vec![port("ABC123", "/dev/ttyACM3", PID_APP)])
            .with_failing_volume_queries(false, true),
    );
    let request = FlashRequest::new(board("ABC123", "/dev/ttyACM3"), FIRMWARE);

    let (outcome, messages) = run_job(&world, request, Duration::from_millis(300)).await;

    assert_eq!(outcome, FlashOutcome::BootloaderRequestFailed);
    assert_eq!(world.reset_calls(), vec!["/dev/ttyACM3"]);
    assert!(world.flash_calls().is_empty());
    assert_eq!(
        messages.last().unwrap(),
        &FlashOutcome::BootloaderRequestFailed.to_message()
    );
    assert_single_terminal_last(&messages);
}

#[tokio::test]
async fn test_flash_tool_exit_code_is_kept() {
    for code in [1, 2, 255] {
        let world = Arc::new(
            FakeWorld::new(vec![port("ABC123", "/dev/ttyACM3", PID_APP)])
                .with_tool(ToolBehavior::Exit(code)),
        );
        let request = FlashRequest::new(board("ABC123", "/dev/ttyACM3"), FIRMWARE);

        let (outcome, messages) = run_job(&world, request, Duration::from_millis(500)).await;

        assert_eq!(outcome, FlashOutcome::FlashToolFailed(code));
        let last = messages.last().unwrap();
        assert!(!last.ok);
        assert!(!last.done);
        assert_single_terminal_last(&messages);
    }
}

#[tokio::test]
async fn test_flash_tool_launch_error() {
    let world = Arc::new(
        FakeWorld::new(vec![port("ABC123", "/dev/ttyACM3", PID_APP)])
            .with_tool(ToolBehavior::LaunchError),
    );
    let request = FlashRequest::new(board("ABC123", "/dev/ttyACM3"), FIRMWARE);

    let (outcome, messages) = run_job(&world, request, Duration::from_millis(500)).await;

    match outcome {
        FlashOutcome::FlashToolError(reason) => assert!(reason.contains("bossac")),
        other => panic!("expected tool error, got {:?}", other),
    }
    assert!(!messages.last().unwrap().ok);
}

#[tokio::test]
async fn test_cancel_before_start_leaves_board_alone() {
    let world = Arc::new(FakeWorld::new(vec![port("ABC123", "/dev/ttyACM3", PID_APP)]));
    let request = FlashRequest::new(board("ABC123", "/dev/ttyACM3"), FIRMWARE);

    let cancel = CancelToken::new();
    cancel.cancel();
    let job = flasher(&world, Duration::from_millis(500)).spawn(request, cancel);
    let mut messages = Vec::new();
    let outcome = assert_ok!(job.follow(|m| messages.push(m.clone())).await);

    assert_eq!(outcome, FlashOutcome::Cancelled { after_reset: false });
    assert!(world.reset_calls().is_empty());
    assert!(world.flash_calls().is_empty());
    assert_single_terminal_last(&messages);
}

#[tokio::test]
async fn test_cancel_while_waiting_for_volume() {
    let world = Arc::new(
        FakeWorld::new(vec![port("ABC123", "/dev/ttyACM3", PID_APP)])
            .with_volumes(&["Macintosh HD"], &["Macintosh HD"]),
    );
    let request = FlashRequest::new(board("ABC123", "/dev/ttyACM3"), FIRMWARE);

    let cancel = CancelToken::new();
    let mut job = flasher(&world, Duration::from_secs(30)).spawn(request, cancel.clone());

    let first = job.next().await.unwrap();
    assert_eq!(first.text, MSG_ENTERING_BOOTLOADER);

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let started = Instant::now();
    let terminal = job.next().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!terminal.ok);
    assert!(terminal.text.contains("bootloader mode"));
    assert!(job.next().await.is_none());

    let outcome = assert_ok!(job.wait().await);
    assert_eq!(outcome, FlashOutcome::Cancelled { after_reset: true });
    assert_eq!(world.reset_calls().len(), 1);
    assert!(world.flash_calls().is_empty());
}

#[tokio::test]
async fn test_two_boards_flash_independently() {
    let good = Arc::new(FakeWorld::new(vec![port("AAA", "/dev/ttyACM0", PID_APP)]));
    let bad = Arc::new(
        FakeWorld::new(vec![port("BBB", "/dev/ttyACM1", PID_APP)])
            .with_tool(ToolBehavior::Exit(1)),
    );

    let job_a = flasher(&good, Duration::from_millis(500))
        .spawn(FlashRequest::new(board("AAA", "/dev/ttyACM0"), FIRMWARE), CancelToken::new());
    let job_b = flasher(&bad, Duration::from_millis(500))
        .spawn(FlashRequest::new(board("BBB", "/dev/ttyACM1"), FIRMWARE), CancelToken::new());

    let (a, b) = tokio::join!(job_a.follow(|_| {}), job_b.follow(|_| {}));

    assert_eq!(assert_ok!(a), FlashOutcome::Success);
    assert_eq!(assert_ok!(b), FlashOutcome::FlashToolFailed(1));
    assert_eq!(good.flash_calls()[0].0, "/dev/ttyACM0");
    assert_eq!(bad.flash_calls()[0].0, "/dev/ttyACM1");
}

#[tokio::test]
async fn test_orchestrator_state_after_run() {
    let world = Arc::new(FakeWorld::new(vec![port("ABC123", "/dev/ttyACM3", PID_APP)]));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let orchestrator = flasher(&world, Duration::from_millis(500)).orchestrator(tx);
    assert_eq!(orchestrator.state(), &FlashState::Idle);

    let outcome = orchestrator
        .run(
            FlashRequest::new(board("ABC123", "/dev/ttyACM3"), FIRMWARE),
            CancelToken::new(),
        )
        .await;
    assert_eq!(outcome, FlashOutcome::Success);

    let mut last = None;
    while let Ok(message) = rx.try_recv() {
        last = Some(message);
    }
    assert!(last.unwrap().is_success());
}
