//! Interactive batch control from the terminal
//!
//! While a batch runs, lines typed on stdin pause, resume or stop it.

use std::sync::Arc;

use log::{debug, error};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use butterfly_pairs::{BatchController, Credential, DistanceProvider, RunState, StartOutcome};

/// A control command typed by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    Stop,
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_lowercase().as_str() {
            "p" | "pause" => Some(Command::Pause),
            "r" | "resume" | "start" => Some(Command::Resume),
            "s" | "stop" | "q" | "quit" => Some(Command::Stop),
            _ => None,
        }
    }
}

/// Apply one command to the controller
pub async fn apply(
    command: Command,
    controller: &BatchController,
    provider: &Arc<dyn DistanceProvider>,
    credential: &Option<Credential>,
) {
    match command {
        Command::Pause => {
            if controller.pause() {
                eprintln!("⏸️  Paused after the current pair. Type 'r' to resume, 's' to stop.");
            }
        }
        // Only a paused batch resumes; a stopped one is on its way to export
        Command::Resume if controller.run_state() != RunState::Paused => {
            debug!("Resume ignored in state {}", controller.run_state());
        }
        Command::Resume => match controller.start(Arc::clone(provider), credential.clone()).await {
            Ok(StartOutcome::Resumed) => eprintln!("▶️  Resumed"),
            Ok(outcome) => debug!("Resume ignored: {outcome:?}"),
            Err(e) => error!("❌ Cannot resume: {e}"),
        },
        Command::Stop => {
            if controller.stop() {
                eprintln!("⏹️  Stopping after the current pair...");
            }
        }
    }
}

/// Read control commands from stdin until it closes
pub fn spawn_stdin_control(
    controller: Arc<BatchController>,
    provider: Arc<dyn DistanceProvider>,
    credential: Option<Credential>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            match Command::parse(&line) {
                Some(command) => apply(command, &controller, &provider, &credential).await,
                None if line.trim().is_empty() => {}
                None => eprintln!("Unknown command '{}'. Use p(ause), r(esume) or s(top).", line.trim()),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use butterfly_pairs::{BatchOptions, Node, NullSink, OsrmProvider};
    use std::time::Duration;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("p"), Some(Command::Pause));
        assert_eq!(Command::parse(" PAUSE \n"), Some(Command::Pause));
        assert_eq!(Command::parse("r"), Some(Command::Resume));
        assert_eq!(Command::parse("stop"), Some(Command::Stop));
        assert_eq!(Command::parse("dance"), None);
    }

    #[tokio::test]
    async fn test_commands_on_idle_batch_are_ignored() {
        let controller = BatchController::new(Arc::new(NullSink), BatchOptions::default());
        controller
            .load(&[Node::new("A", 0.0, 0.0), Node::new("B", 1.0, 1.0)])
            .await;
        let provider: Arc<dyn DistanceProvider> = Arc::new(OsrmProvider::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            Duration::ZERO,
        ));

        apply(Command::Pause, &controller, &provider, &None).await;
        apply(Command::Stop, &controller, &provider, &None).await;
        assert_eq!(controller.run_state(), RunState::Idle);
    }

    #[tokio::test]
    async fn test_resume_after_stop_is_ignored() {
        let controller = BatchController::new(Arc::new(NullSink), BatchOptions::default());
        controller
            .load(&[Node::new("A", 0.0, 0.0), Node::new("B", 1.0, 1.0)])
            .await;
        // Nothing listens on the discard port; the long delay keeps the loop alive
        let provider: Arc<dyn DistanceProvider> = Arc::new(OsrmProvider::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            Duration::from_secs(60),
        ));

        controller.start(Arc::clone(&provider), None).await.unwrap();
        apply(Command::Stop, &controller, &provider, &None).await;
        assert_eq!(controller.wait().await, RunState::Stopped);

        apply(Command::Resume, &controller, &provider, &None).await;
        assert_eq!(controller.run_state(), RunState::Stopped);
        assert_eq!(controller.wait().await, RunState::Stopped);
    }
}
