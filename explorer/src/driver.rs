//! Request loop tying the simulator to playback.
//!
//! The driver takes requests from a channel and handles them strictly one at
//! a time. For a tree operation it starts the command on the simulator,
//! streams the narration through the player, and only then signals
//! completion. Requests arriving meanwhile wait in the channel.

use std::pin::pin;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendError;

use crate::command::{ParseError, Request};
use crate::config::ExplorerConfig;
use crate::narration::{Narration, Player, Speed};
use crate::output::Output;
use crate::simulator::{Command, Simulator};
use crate::workload::WorkloadGenerator;

/// Pause between the inserts of a `random` request.
pub const RANDOM_INSERT_GAP: Duration = Duration::from_millis(100);

type SendResult = Result<(), SendError<Output>>;

pub struct Driver {
    simulator: Simulator,
    player: Player,
    workload: WorkloadGenerator,
    viewport_width: f64,
}

impl Driver {
    #[must_use]
    pub fn new(config: &ExplorerConfig) -> Self {
        let player = Player::new(config.speed);
        Self {
            simulator: Simulator::new(config.order, config.delete_policy),
            player: if config.skip_delays {
                player.without_delays()
            } else {
                player
            },
            workload: WorkloadGenerator::new(config.seed),
            viewport_width: config.viewport_width,
        }
    }

    /// Handle requests until the request channel closes or nobody listens
    /// for output any more. A closed output is noticed while waiting for
    /// the next request too.
    pub async fn run(
        mut self,
        mut requests: mpsc::Receiver<Result<Request, ParseError>>,
        outputs: mpsc::Sender<Output>,
    ) {
        loop {
            let request = tokio::select! {
                request = requests.recv() => request,
                () = outputs.closed() => {
                    tracing::debug!("output channel closed while idle, stopping");
                    return;
                }
            };
            let Some(request) = request else {
                break;
            };
            let sent = match request {
                Ok(request) => self.handle(request, &outputs).await,
                Err(e) => {
                    tracing::warn!("rejected request: {e}");
                    outputs.send(Output::error(e)).await
                }
            };
            if sent.is_err() {
                tracing::debug!("output channel closed, stopping");
                return;
            }
        }
        tracing::debug!("request channel closed");
    }

    /// Handle one request, sending everything it produces to `outputs`.
    pub async fn handle(&mut self, request: Request, outputs: &mpsc::Sender<Output>) -> SendResult {
        match request {
            Request::Run(command) => self.perform(command, outputs).await,
            Request::Random(count) => {
                let keys = self.workload.random_keys(count);
                tracing::debug!("inserting {count} random keys: {keys:?}");
                for key in keys {
                    self.perform(Command::Insert(key), outputs).await?;
                    self.player.pause(RANDOM_INSERT_GAP).await;
                }
                Ok(())
            }
            Request::Reset => {
                let output = match self.simulator.reset() {
                    Ok(()) => Output::notice("Tree cleared"),
                    Err(e) => Output::error(e),
                };
                outputs.send(output).await
            }
            Request::SetOrder(order) => {
                let output = match self.simulator.set_order(order) {
                    Ok(()) => Output::notice(self.simulator.event_log().latest().unwrap_or_default()),
                    Err(e) => Output::error(e),
                };
                outputs.send(output).await
            }
            Request::SetSpeed(multiplier) => {
                let output = match Speed::new(multiplier) {
                    Some(speed) => {
                        self.player.set_speed(speed);
                        tracing::info!("speed set to {speed}");
                        Output::notice(format!("Speed set to {speed}"))
                    }
                    None => Output::error(format!(
                        "speed must be between {} and {}",
                        Speed::MIN,
                        Speed::MAX
                    )),
                };
                outputs.send(output).await
            }
            Request::Stats => outputs.send(Output::Stats(self.simulator.stats())).await,
            Request::Layout => {
                let root = self.simulator.layout(self.viewport_width);
                outputs.send(Output::layout(root)).await
            }
            Request::Log => {
                let entries = self.simulator.event_log().iter().map(str::to_string).collect();
                outputs.send(Output::Log { entries }).await
            }
            Request::Check => {
                let violations = self.simulator.check();
                if !violations.is_empty() {
                    tracing::error!("{} invariant violations", violations.len());
                }
                outputs.send(Output::Check { violations }).await
            }
        }
    }

    async fn perform(&mut self, command: Command, outputs: &mpsc::Sender<Output>) -> SendResult {
        let narration = match self.simulator.execute(command) {
            Ok(narration) => narration,
            Err(e) => return outputs.send(Output::error(e)).await,
        };

        tracing::debug!(
            "playing {} {}: {} steps",
            narration.operation(),
            narration.key(),
            narration.len()
        );
        let played = Self::play(self.player, &narration, outputs).await;
        if let Err(e) = self.simulator.complete() {
            tracing::warn!("completing '{command}': {e}");
        }
        played
    }

    async fn play(player: Player, narration: &Narration, outputs: &mpsc::Sender<Output>) -> SendResult {
        let mut steps = pin!(player.play(narration));
        while let Some(step) = steps.next().await {
            outputs.send(Output::Step(step)).await?;
        }
        Ok(())
    }
}
