//! Change-feed adapter: realtime / cross-tab notifications -> bus signals.
//!
//! The transport pushes [`ChangeNotification`]s into an mpsc channel; the
//! pump drains it into [`InvalidationBus::publish`], the same entry point
//! local mutations use.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::InvalidationBus;
use crate::domain::{Signal, UserId};
use crate::ports::ChangeNotification;

/// Static table -> signal mapping. Unknown tables map to `None`.
pub fn translate(notification: &ChangeNotification) -> Option<Signal> {
    let user = notification.user_id;
    let signal = match notification.table.as_str() {
        "job_applications" => Signal::ApplicationsChanged { user },
        "profiles" => Signal::ProfileChanged { user },
        "user_skills" => Signal::SkillsChanged { user },
        "work_experience" => Signal::ExperienceChanged { user },
        "education" => Signal::EducationChanged { user },
        "schedule_entries" => Signal::ScheduleChanged { user },
        _ => return None,
    };
    Some(signal)
}

pub fn channel(buffer: usize) -> (mpsc::Sender<ChangeNotification>, mpsc::Receiver<ChangeNotification>) {
    mpsc::channel(buffer.max(1))
}

/// What the pump did before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PumpReport {
    pub delivered: u64,
    /// Other users' rows and unknown tables.
    pub ignored: u64,
}

/// Background task draining notifications into the bus.
/// - `request_shutdown` stops it after the notification in hand
/// - dropping every sender also stops it
/// - `shutdown_and_join` waits for it and returns its report
pub struct ChangeFeedPump {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<PumpReport>,
}

impl ChangeFeedPump {
    /// Spawn a pump for `user`'s session.
    pub fn spawn(
        user: UserId,
        bus: Arc<InvalidationBus>,
        rx: mpsc::Receiver<ChangeNotification>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(pump_loop(user, bus, rx, shutdown_rx));
        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        // the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn shutdown_and_join(self) -> PumpReport {
        self.request_shutdown();
        match self.join.await {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "change feed pump ended abnormally");
                PumpReport::default()
            }
        }
    }
}

async fn pump_loop(
    user: UserId,
    bus: Arc<InvalidationBus>,
    mut rx: mpsc::Receiver<ChangeNotification>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> PumpReport {
    let mut report = PumpReport::default();
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let notification = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            received = rx.recv() => received,
        };
        let Some(notification) = notification else {
            debug!("change feed closed");
            break;
        };

        if notification.user_id != user {
            report.ignored += 1;
            continue;
        }
        match translate(&notification) {
            Some(signal) => {
                bus.publish(&signal);
                report.delivered += 1;
            }
            None => {
                warn!(table = %notification.table, "change notification for unmapped table dropped");
                report.ignored += 1;
            }
        }
    }
    report
}
