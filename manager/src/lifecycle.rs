use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use msm_protocol::management::instance::{
    RestartOutcome, SendOutcome, StartOutcome, StopOutcome,
};
use msm_protocol::Result;

use crate::config::Timings;
use crate::launch::LaunchExt;
use crate::registry::InstanceRegistry;
use crate::session::{session_label, SessionMultiplexer};

/// Lifecycle operations for named instances. Deliberately stateless: the OS
/// session table is the source of truth, and every operation begins by
/// re-deriving the current state from it.
pub struct SessionController {
    registry: Arc<InstanceRegistry>,
    mux: Arc<dyn SessionMultiplexer>,
    timings: Timings,
}

/// Polls `mux` until the session's presence matches `present`, once per
/// `interval`, giving up after `deadline`. Returns whether the condition was
/// met. Every lifecycle wait goes through here, so no wait is unbounded.
async fn wait_for_session(
    mux: &dyn SessionMultiplexer,
    label: &str,
    present: bool,
    deadline: Duration,
    interval: Duration,
) -> Result<bool> {
    let deadline = tokio::time::Instant::now() + deadline;
    loop {
        if mux.find(label).await?.is_some() == present {
            return Ok(true);
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(interval).await;
    }
}

impl SessionController {
    pub fn new(
        registry: Arc<InstanceRegistry>,
        mux: Arc<dyn SessionMultiplexer>,
        timings: Timings,
    ) -> Self {
        Self {
            registry,
            mux,
            timings,
        }
    }

    pub async fn start(&self, name: &str) -> Result<StartOutcome> {
        let config = self.registry.load(name)?;
        let label = session_label(name);

        if self.mux.find(&label).await?.is_some() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let command = config.launch_command()?;
        info!(
            "starting '{}' ({}MB RAM, {} cores, port {})",
            name, config.ram_mb, config.cores, config.port
        );
        self.mux.spawn_detached(&label, &command).await?;

        let confirmed = wait_for_session(
            self.mux.as_ref(),
            &label,
            true,
            self.timings.start_confirm(),
            self.timings.start_poll(),
        )
        .await?;

        if confirmed {
            Ok(StartOutcome::Started)
        } else {
            // No cleanup of a possibly half-started session: killing a
            // process that was merely slow to register is worse than asking
            // the operator to look.
            Ok(StartOutcome::Failed {
                reason: format!(
                    "session '{}' did not appear within {:?}",
                    label,
                    self.timings.start_confirm()
                ),
            })
        }
    }

    pub async fn stop(&self, name: &str) -> Result<StopOutcome> {
        let config = self.registry.load(name)?;
        let label = session_label(name);

        if self.mux.find(&label).await?.is_none() {
            return Ok(StopOutcome::NotRunning);
        }

        info!("stopping '{}'", name);
        self.mux
            .send_line(&label, config.kind.stop_command())
            .await?;

        let gone = wait_for_session(
            self.mux.as_ref(),
            &label,
            false,
            self.timings.stop_timeout(),
            self.timings.stop_poll(),
        )
        .await?;

        if gone {
            Ok(StopOutcome::Stopped { graceful: true })
        } else {
            warn!(
                "'{}' ignored the shutdown command for {:?}, forcing termination",
                name,
                self.timings.stop_timeout()
            );
            self.mux.kill(&label).await?;
            Ok(StopOutcome::Stopped { graceful: false })
        }
    }

    /// Stop to completion, settle, start. Not atomic by design: if the
    /// session vanishes between the two calls, start() simply proceeds from
    /// Stopped.
    pub async fn restart(&self, name: &str) -> Result<RestartOutcome> {
        let stop = self.stop(name).await?;
        tokio::time::sleep(self.timings.restart_delay()).await;
        let start = self.start(name).await?;
        Ok(RestartOutcome { stop, start })
    }

    /// Console passthrough: one literal line into the instance's input.
    pub async fn send(&self, name: &str, line: &str) -> Result<SendOutcome> {
        self.registry.load(name)?;
        let label = session_label(name);
        if self.mux.find(&label).await?.is_none() {
            return Ok(SendOutcome::NotRunning);
        }
        self.mux.send_line(&label, line).await?;
        Ok(SendOutcome::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::FakeMultiplexer;
    use msm_protocol::management::instance::{InstanceConfigBuilder, ServerKind};
    use msm_protocol::Error;
    use std::fs;
    use std::time::Instant;

    fn test_timings() -> Timings {
        Timings {
            stop_timeout_secs: 1,
            stop_poll_ms: 50,
            start_confirm_ms: 500,
            start_poll_ms: 20,
            restart_delay_secs: 0,
            monitor_interval_secs: 2,
        }
    }

    fn controller(compliant: bool) -> (tempfile::TempDir, Arc<FakeMultiplexer>, SessionController) {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(InstanceRegistry::new(dir.path().join("servers")).unwrap());
        let mux = Arc::new(FakeMultiplexer::new(compliant));
        let controller = SessionController::new(registry.clone(), mux.clone(), test_timings());
        (dir, mux, controller)
    }

    fn register(controller: &SessionController, name: &str, kind: ServerKind) {
        let instance_dir = controller.registry.servers_dir().join(name);
        fs::create_dir_all(&instance_dir).unwrap();
        fs::write(instance_dir.join("server.jar"), b"").unwrap();
        let config = InstanceConfigBuilder::new()
            .name(name)
            .kind(kind)
            .build()
            .unwrap();
        controller.registry.save(&config).unwrap();
    }

    #[tokio::test]
    async fn operations_on_unknown_names_are_not_found() {
        let (_dir, mux, controller) = controller(true);

        assert!(matches!(
            controller.start("ghost").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            controller.stop("ghost").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            controller.restart("ghost").await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(mux.session_count(), 0);
    }

    #[tokio::test]
    async fn double_start_is_an_idempotent_no_op() {
        let (_dir, mux, controller) = controller(true);
        register(&controller, "survival", ServerKind::Paper);

        assert_eq!(controller.start("survival").await.unwrap(), StartOutcome::Started);
        assert_eq!(
            controller.start("survival").await.unwrap(),
            StartOutcome::AlreadyRunning
        );
        assert_eq!(mux.session_count(), 1);
    }

    #[tokio::test]
    async fn stop_on_a_never_started_instance_is_not_running() {
        let (_dir, _mux, controller) = controller(true);
        register(&controller, "survival", ServerKind::Paper);

        assert_eq!(controller.stop("survival").await.unwrap(), StopOutcome::NotRunning);
        // idempotent under repetition
        assert_eq!(controller.stop("survival").await.unwrap(), StopOutcome::NotRunning);
    }

    #[tokio::test]
    async fn compliant_server_stops_gracefully_and_promptly() {
        let (_dir, mux, controller) = controller(true);
        register(&controller, "survival", ServerKind::Paper);
        controller.start("survival").await.unwrap();

        let began = Instant::now();
        let outcome = controller.stop("survival").await.unwrap();
        assert_eq!(outcome, StopOutcome::Stopped { graceful: true });
        assert!(began.elapsed() < test_timings().stop_timeout() / 2);
        assert!(mux.kills.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stubborn_server_is_forced_after_the_full_timeout() {
        let (_dir, mux, controller) = controller(false);
        register(&controller, "survival", ServerKind::Paper);
        controller.start("survival").await.unwrap();

        let began = Instant::now();
        let outcome = controller.stop("survival").await.unwrap();
        assert_eq!(outcome, StopOutcome::Stopped { graceful: false });
        assert!(began.elapsed() >= test_timings().stop_timeout());
        assert!(began.elapsed() < test_timings().stop_timeout() * 3);
        assert_eq!(mux.kills.lock().unwrap().as_slice(), ["msm-survival"]);
        assert_eq!(mux.session_count(), 0);
    }

    #[tokio::test]
    async fn stop_line_matches_the_server_kind() {
        let (_dir, mux, controller) = controller(true);
        register(&controller, "proxy", ServerKind::BungeeCord);
        controller.start("proxy").await.unwrap();
        controller.stop("proxy").await.unwrap();

        let sent = mux.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), [("msm-proxy".to_owned(), "end".to_owned())]);
    }

    #[tokio::test]
    async fn restart_of_a_running_instance_leaves_exactly_one_session() {
        let (_dir, mux, controller) = controller(true);
        register(&controller, "survival", ServerKind::Paper);
        controller.start("survival").await.unwrap();

        let outcome = controller.restart("survival").await.unwrap();
        assert_eq!(outcome.stop, StopOutcome::Stopped { graceful: true });
        assert_eq!(outcome.start, StartOutcome::Started);
        assert_eq!(mux.session_count(), 1);
    }

    #[tokio::test]
    async fn restart_of_a_stopped_instance_just_starts_it() {
        let (_dir, mux, controller) = controller(true);
        register(&controller, "survival", ServerKind::Paper);

        let outcome = controller.restart("survival").await.unwrap();
        assert_eq!(outcome.stop, StopOutcome::NotRunning);
        assert_eq!(outcome.start, StartOutcome::Started);
        assert_eq!(mux.session_count(), 1);
    }

    #[tokio::test]
    async fn start_with_missing_artifact_reports_launch_failure() {
        let (_dir, mux, controller) = controller(true);
        let instance_dir = controller.registry.servers_dir().join("empty");
        fs::create_dir_all(&instance_dir).unwrap();
        let config = InstanceConfigBuilder::new()
            .name("empty")
            .kind(ServerKind::Vanilla)
            .build()
            .unwrap();
        controller.registry.save(&config).unwrap();

        assert!(matches!(
            controller.start("empty").await,
            Err(Error::Launch(_))
        ));
        assert_eq!(mux.session_count(), 0);
    }

    #[tokio::test]
    async fn send_reaches_a_running_instance_only() {
        let (_dir, mux, controller) = controller(false);
        register(&controller, "survival", ServerKind::Paper);

        assert_eq!(
            controller.send("survival", "say hello").await.unwrap(),
            SendOutcome::NotRunning
        );

        controller.start("survival").await.unwrap();
        assert_eq!(
            controller.send("survival", "say hello").await.unwrap(),
            SendOutcome::Sent
        );
        let sent = mux.sent.lock().unwrap();
        assert_eq!(
            sent.as_slice(),
            [("msm-survival".to_owned(), "say hello".to_owned())]
        );
    }
}
