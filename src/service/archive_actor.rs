use crate::db::BudgetStorage;
use crate::error::BudgetError;
use crate::service::archive::{ArchiveProcess, ArchiveReport};

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use tracing::{info, warn};

/// Messages handled by the archive actor. The mailbox is processed one
/// message at a time, so archive runs never overlap.
#[derive(Debug)]
pub enum ArchiveActorMessage {
    /// Run a full archive pass and reply with its report.
    Run(RpcReplyPort<Result<ArchiveReport, BudgetError>>),
    /// Reply with the report of the last successful run, if any.
    LastReport(RpcReplyPort<Option<ArchiveReport>>),
}

/// Handle for interacting with the archive actor.
#[derive(Clone)]
pub struct ArchiveHandle {
    actor: ActorRef<ArchiveActorMessage>,
}

impl ArchiveHandle {
    /// Trigger an archive run and wait for it to finish. A run requested while
    /// another is active waits in the mailbox until the first completes.
    pub async fn run(&self) -> Result<ArchiveReport, BudgetError> {
        ractor::call!(self.actor, ArchiveActorMessage::Run)
            .map_err(|e| BudgetError::RactorError(format!("Run RPC failed: {e}")))?
    }

    pub async fn last_report(&self) -> Result<Option<ArchiveReport>, BudgetError> {
        ractor::call!(self.actor, ArchiveActorMessage::LastReport)
            .map_err(|e| BudgetError::RactorError(format!("LastReport RPC failed: {e}")))
    }
}

struct ArchiveActorState {
    process: ArchiveProcess,
    last_report: Option<ArchiveReport>,
}

struct ArchiveActor;

#[ractor::async_trait]
impl Actor for ArchiveActor {
    type Msg = ArchiveActorMessage;
    type State = ArchiveActorState;
    type Arguments = BudgetStorage;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        storage: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!("ArchiveActor started");
        Ok(ArchiveActorState {
            process: ArchiveProcess::new(storage),
            last_report: None,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ArchiveActorMessage::Run(rp) => {
                let result = state.process.run().await;
                match &result {
                    Ok(report) => state.last_report = Some(report.clone()),
                    Err(e) => warn!("archive run aborted: {}", e),
                }
                let _ = rp.send(result);
            }
            ArchiveActorMessage::LastReport(rp) => {
                let _ = rp.send(state.last_report.clone());
            }
        }
        Ok(())
    }
}

/// Spawn the archive actor and return a handle.
pub async fn spawn(storage: BudgetStorage) -> Result<ArchiveHandle, BudgetError> {
    let (actor, _jh) = Actor::spawn(None, ArchiveActor, storage)
        .await
        .map_err(|e| BudgetError::RactorError(format!("failed to spawn ArchiveActor: {e}")))?;
    Ok(ArchiveHandle { actor })
}
