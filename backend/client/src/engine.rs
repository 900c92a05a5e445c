//! Drives an [`EggSession`] against the counter API.
//!
//! One task owns the session. User commands, poll ticks and finished saves and
//! polls all arrive through a single `select!`, so the session is only ever
//! touched from one place. Saves and polls run as spawned tasks and cannot be
//! cancelled, their results are applied or ignored when they come back.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use carton::DEFAULT_EGG_COUNT;
use tokio::{
    sync::mpsc::{UnboundedReceiver, UnboundedSender},
    task::JoinSet,
    time::{MissedTickBehavior, interval},
};
use tracing::{error, info, warn};

use crate::{
    api::CounterApi,
    error::ClientError,
    grid::Removal,
    session::{EggSession, SyncState, Update},
    thresholds::ThresholdEvent,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Increase,
    Decrease,
    /// Takes the egg at this grid position, 0 being bottom-left.
    RemoveAt(usize),
    Shutdown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Local,
    Server,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Loaded {
        count: u64,
        threshold: Option<ThresholdEvent>,
    },
    Changed {
        count: u64,
        source: Source,
        threshold: Option<ThresholdEvent>,
        removal: Option<Removal>,
        state: SyncState,
    },
    Saved {
        count: u64,
    },
    SaveFailed {
        count: u64,
    },
    Healed {
        count: u64,
    },
}

type SaveResult = (u64, Result<u64, ClientError>);

pub struct SyncEngine<A> {
    api: Arc<A>,
    poll_interval: Duration,
    events: UnboundedSender<SessionEvent>,
}

impl<A: CounterApi + 'static> SyncEngine<A> {
    pub fn new(api: Arc<A>, poll_interval: Duration, events: UnboundedSender<SessionEvent>) -> Self {
        Self {
            api,
            poll_interval,
            events,
        }
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine, the session keeps going
        let _ = self.events.send(event);
    }

    /// Saves, then reports the change with the sync state it left behind.
    fn apply_local(
        &self,
        session: &mut EggSession,
        saves: &mut JoinSet<SaveResult>,
        update: Update,
        removal: Option<Removal>,
    ) {
        self.start_save(session, saves);
        self.emit(SessionEvent::Changed {
            count: update.count,
            source: Source::Local,
            threshold: update.threshold,
            removal,
            state: session.state(),
        });
    }

    async fn initial_count(&self) -> u64 {
        match self.api.fetch_count().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to load count, starting from {DEFAULT_EGG_COUNT}: {e}");
                DEFAULT_EGG_COUNT
            }
        }
    }

    fn start_save(&self, session: &mut EggSession, saves: &mut JoinSet<SaveResult>) {
        let Some(count) = session.begin_save() else {
            return;
        };

        let api = self.api.clone();
        saves.spawn(async move { (count, api.save_count(count).await) });
    }

    fn finish_save(&self, session: &mut EggSession, count: u64, result: Result<u64, ClientError>) {
        match result {
            Ok(_) => {
                session.finish_save(true);
                self.emit(SessionEvent::Saved { count });
            }
            Err(e) => {
                error!("Failed to save count {count}: {e}");
                session.finish_save(false);
                self.emit(SessionEvent::SaveFailed { count });
            }
        }
    }

    /// Runs until [`Command::Shutdown`] or the command channel closes, then
    /// waits for in-flight saves and hands back the final session.
    pub async fn run(self, mut commands: UnboundedReceiver<Command>) -> EggSession {
        let count = self.initial_count().await;
        let (mut session, update) = EggSession::load(count, Instant::now());
        info!("Loaded {count} eggs");
        self.emit(SessionEvent::Loaded {
            count,
            threshold: update.threshold,
        });

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        let mut saves: JoinSet<SaveResult> = JoinSet::new();
        let mut polls: JoinSet<Result<u64, ClientError>> = JoinSet::new();

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let now = Instant::now();

                    match command {
                        Some(Command::Increase) => {
                            let update = session.increase(now);
                            self.apply_local(&mut session, &mut saves, update, None);
                        }
                        Some(Command::Decrease) => {
                            if let Some((update, removal)) = session.decrease(now) {
                                self.apply_local(&mut session, &mut saves, update, removal);
                            }
                        }
                        Some(Command::RemoveAt(index)) => {
                            let id = session.grid().eggs().get(index).map(|egg| egg.id);

                            if let Some((update, removal)) = id.and_then(|id| session.remove_egg(id, now)) {
                                self.apply_local(&mut session, &mut saves, update, Some(removal));
                            }
                        }
                        Some(Command::Shutdown) | None => break,
                    }
                }
                _ = ticker.tick() => {
                    if session.heal() {
                        warn!("Egg grid drifted, rebuilt at {}", session.count());
                        self.emit(SessionEvent::Healed { count: session.count() });
                    }

                    if session.begin_poll() {
                        let api = self.api.clone();
                        polls.spawn(async move { api.fetch_count().await });
                    }
                }
                Some(joined) = saves.join_next() => match joined {
                    Ok((count, result)) => self.finish_save(&mut session, count, result),
                    Err(e) => {
                        error!("Save task failed: {e}");
                        session.finish_save(false);
                    }
                },
                Some(joined) = polls.join_next() => match joined {
                    Ok(Ok(server_count)) => {
                        if let Some(update) = session.finish_poll(server_count, Instant::now()) {
                            info!("Server count changed to {server_count}");
                            self.emit(SessionEvent::Changed {
                                count: update.count,
                                source: Source::Server,
                                threshold: update.threshold,
                                removal: None,
                                state: session.state(),
                            });
                        }
                    }
                    Ok(Err(e)) => {
                        warn!("Poll failed: {e}");
                        session.abandon_poll();
                    }
                    Err(e) => {
                        error!("Poll task failed: {e}");
                        session.abandon_poll();
                    }
                },
            }
        }

        polls.abort_all();
        while let Some(joined) = saves.join_next().await {
            match joined {
                Ok((count, result)) => self.finish_save(&mut session, count, result),
                Err(e) => {
                    error!("Save task failed: {e}");
                    session.finish_save(false);
                }
            }
        }

        session
    }
}
