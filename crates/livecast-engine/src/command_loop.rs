//! Channel-driven front end for the controller.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, instrument, warn};

use livecast_ipc::{SessionCommand, SessionEvent};
use livecast_transport::Publisher;

use crate::controller::BroadcastController;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Serve `commands` until `Shutdown` arrives or the channel disconnects.
///
/// Blocks the calling thread. Replies and refusals go to `events`.
#[instrument(name = "command_loop", skip_all)]
pub fn run_command_loop<P: Publisher>(
    controller: &BroadcastController<P>,
    commands: Receiver<SessionCommand>,
    events: Sender<SessionEvent>,
) {
    info!("Command loop starting");
    send_event(&events, SessionEvent::Ready);

    loop {
        match commands.recv_timeout(POLL_INTERVAL) {
            Ok(command) => {
                if !handle_command(controller, command, &events) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("Command channel disconnected, shutting down");
                controller.stop();
                break;
            }
        }
    }

    info!("Command loop stopped");
}

/// Handle a command. Returns false if the loop should stop.
fn handle_command<P: Publisher>(
    controller: &BroadcastController<P>,
    command: SessionCommand,
    events: &Sender<SessionEvent>,
) -> bool {
    debug!(?command, "Handling command");

    match command {
        SessionCommand::Start {
            connection,
            signature,
        } => {
            if let Err(e) = controller.start(connection, signature) {
                send_event(
                    events,
                    SessionEvent::Error {
                        message: e.to_string(),
                    },
                );
            }
        }
        SessionCommand::Stop => controller.stop(),
        SessionCommand::GetStatus => send_event(events, SessionEvent::Status(controller.status())),
        SessionCommand::Shutdown => {
            controller.stop();
            send_event(events, SessionEvent::Shutdown);
            return false;
        }
    }

    true
}

fn send_event(events: &Sender<SessionEvent>, event: SessionEvent) {
    if let Err(e) = events.try_send(event) {
        warn!("Failed to send event: {}", e);
    }
}
