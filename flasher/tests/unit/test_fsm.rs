//! FSM unit tests

use samd_flasher::flash::fsm::{FlashEvent, FlashFsm, FlashState};
use samd_flasher::FlashOutcome;

#[test]
fn test_fsm_initial_state() {
    let fsm = FlashFsm::new();
    assert_eq!(fsm.state(), &FlashState::Idle);
    assert!(fsm.outcome().is_none());
    assert!(!fsm.reset_requested());
}

#[test]
fn test_fsm_flash_success_flow() {
    let mut fsm = FlashFsm::new();

    // Idle -> RequestingBootloader
    fsm.process(FlashEvent::Begin).unwrap();
    assert_eq!(fsm.state(), &FlashState::RequestingBootloader);

    // RequestingBootloader -> VerifyingBootloader
    fsm.process(FlashEvent::BootloaderRequested).unwrap();
    assert_eq!(fsm.state(), &FlashState::VerifyingBootloader);

    // VerifyingBootloader -> Relocating -> Flashing
    fsm.process(FlashEvent::BootloaderVerified { port_present: false }).unwrap();
    assert_eq!(fsm.state(), &FlashState::Relocating);
    fsm.process(FlashEvent::Relocated).unwrap();
    assert_eq!(fsm.state(), &FlashState::Flashing);

    // Flashing -> Succeeded
    fsm.process(FlashEvent::FlashCompleted).unwrap();
    assert_eq!(fsm.state(), &FlashState::Succeeded);
    assert_eq!(fsm.outcome(), Some(FlashOutcome::Success));
}

#[test]
fn test_fsm_failure_from_every_active_state() {
    let steps = [
        vec![FlashEvent::Begin],
        vec![FlashEvent::Begin, FlashEvent::BootloaderRequested],
        vec![
            FlashEvent::Begin,
            FlashEvent::BootloaderRequested,
            FlashEvent::BootloaderVerified { port_present: false },
        ],
        vec![
            FlashEvent::Begin,
            FlashEvent::BootloaderRequested,
            FlashEvent::BootloaderVerified { port_present: true },
        ],
    ];

    for prefix in steps {
        let mut fsm = FlashFsm::new();
        for event in prefix {
            fsm.process(event).unwrap();
        }
        fsm.process(FlashEvent::Fail(FlashOutcome::FlashToolFailed(7))).unwrap();
        assert_eq!(fsm.state(), &FlashState::Failed(FlashOutcome::FlashToolFailed(7)));
        assert_eq!(fsm.outcome(), Some(FlashOutcome::FlashToolFailed(7)));
    }
}

#[test]
fn test_fsm_no_transition_after_success() {
    let mut fsm = FlashFsm::new();
    fsm.process(FlashEvent::Begin).unwrap();
    fsm.process(FlashEvent::BootloaderRequested).unwrap();
    fsm.process(FlashEvent::BootloaderVerified { port_present: true }).unwrap();
    fsm.process(FlashEvent::FlashCompleted).unwrap();

    let result = fsm.process(FlashEvent::Fail(FlashOutcome::DeviceLost));
    assert!(result.is_err());
    assert_eq!(fsm.state(), &FlashState::Succeeded);
}

#[test]
fn test_fsm_invalid_transition() {
    let mut fsm = FlashFsm::new();

    // Cannot flash before entering the bootloader
    let result = fsm.process(FlashEvent::FlashCompleted);
    assert!(result.is_err());
    assert_eq!(fsm.state(), &FlashState::Idle);
}
