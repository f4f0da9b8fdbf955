mod support;

use std::thread;

use livecast_engine::{run_command_loop, ControllerOptions};
use livecast_ipc::{BroadcastState, SessionCommand, SessionEvent};

use support::{controller, signature, wait_until, wowza, WAIT_LIMIT};

#[test]
fn test_command_loop_round_trip() {
    let (controller, script) = controller(ControllerOptions::default());
    let (command_tx, command_rx) = livecast_ipc::command_channel();
    let (event_tx, event_rx) = livecast_ipc::event_channel();

    thread::scope(|scope| {
        scope.spawn(|| run_command_loop(&controller, command_rx, event_tx));

        assert!(matches!(
            event_rx.recv_timeout(WAIT_LIMIT).unwrap(),
            SessionEvent::Ready
        ));

        command_tx
            .send(SessionCommand::Start {
                connection: wowza(),
                signature: signature(),
            })
            .unwrap();
        let _link = script.next_handshake().succeed();
        wait_until(|| controller.state().is_broadcasting());

        // Refused while live.
        command_tx
            .send(SessionCommand::Start {
                connection: wowza(),
                signature: signature(),
            })
            .unwrap();
        match event_rx.recv_timeout(WAIT_LIMIT).unwrap() {
            SessionEvent::Error { message } => assert!(message.contains("already active")),
            other => panic!("unexpected event: {other:?}"),
        }

        command_tx.send(SessionCommand::GetStatus).unwrap();
        match event_rx.recv_timeout(WAIT_LIMIT).unwrap() {
            SessionEvent::Status(status) => {
                assert_eq!(status.state, BroadcastState::Broadcasting)
            }
            other => panic!("unexpected event: {other:?}"),
        }

        command_tx.send(SessionCommand::Shutdown).unwrap();
        assert!(matches!(
            event_rx.recv_timeout(WAIT_LIMIT).unwrap(),
            SessionEvent::Shutdown
        ));
    });

    assert_eq!(controller.state(), BroadcastState::Idle);
    wait_until(|| script.closes() == 1);
}

#[test]
fn test_disconnect_stops_the_session() {
    let (controller, script) = controller(ControllerOptions::default());
    let (command_tx, command_rx) = livecast_ipc::command_channel();
    let (event_tx, _event_rx) = livecast_ipc::event_channel();

    command_tx
        .send(SessionCommand::Start {
            connection: wowza(),
            signature: signature(),
        })
        .unwrap();
    drop(command_tx);

    run_command_loop(&controller, command_rx, event_tx);
    assert_eq!(controller.state(), BroadcastState::Idle);
    assert_eq!(script.next_handshake().request.generation, 1);
}
