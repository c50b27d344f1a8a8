//! End-to-end lifecycle scenarios over fake ports.
//!
//! Every scenario checks the same teardown contract: each created resource
//! is released exactly once, newest first, whatever went wrong before.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use ephem_cli::application::cancel::Cancellation;
use ephem_cli::application::services::lifecycle::{
    LifecycleController, LifecyclePorts, RunOutcome, RunSummary,
};
use ephem_cli::domain::config::Settings;
use ephem_cli::domain::error::SshError;
use ephem_cli::domain::resources::{ObservedState, ResourceKind, generate_resource_name};
use ephem_cli::domain::session::{ReleaseCause, ReleaseStatus};
use ephem_cli::domain::workload::{Workload, WorkloadSelection};

use crate::fakes::{
    ADDRESS, Call, FakeClock, FakeCompute, FakeShell, FakeTrigger, INSTANCE_ID, MemoryKeys,
    MemoryStore, RecordingReporter, RemoteScript, address,
};

// ── Harness ───────────────────────────────────────────────────────────────────

struct Harness {
    compute: FakeCompute,
    keys: MemoryKeys,
    shell: FakeShell,
    store: MemoryStore,
    clock: FakeClock,
    settings: Settings,
    reporter: RecordingReporter,
}

impl Harness {
    fn new(compute: FakeCompute, shell: FakeShell) -> Self {
        Self {
            compute,
            keys: MemoryKeys::default(),
            shell,
            store: MemoryStore::default(),
            clock: FakeClock::default(),
            settings: Settings::default(),
            reporter: RecordingReporter::default(),
        }
    }

    fn happy() -> Self {
        Self::new(FakeCompute::default(), FakeShell::default())
    }

    fn controller(
        &self,
        cancel: Cancellation,
    ) -> LifecycleController<'_, FakeCompute, MemoryKeys, FakeShell, MemoryStore, FakeClock> {
        let ports = LifecyclePorts {
            compute: &self.compute,
            keys: &self.keys,
            shell: &self.shell,
            store: &self.store,
            clock: &self.clock,
        };
        LifecycleController::new(ports, &self.settings, cancel, generate_resource_name())
    }

    async fn run_with(&self, cancel: Cancellation, mut trigger: FakeTrigger) -> RunSummary {
        let mut controller = self.controller(cancel);
        controller
            .run(&nginx(), &mut trigger, &self.reporter, |_| {})
            .await
    }

    async fn run(&self) -> RunSummary {
        self.run_with(Cancellation::new(), FakeTrigger::operator())
            .await
    }

    fn key_name(&self) -> String {
        self.compute
            .calls()
            .into_iter()
            .find_map(|c| match c {
                Call::CreateKeyPair(name) => Some(name),
                _ => None,
            })
            .expect("a key pair was created")
    }

    /// The shared teardown contract.
    fn assert_all_released(&self) {
        assert_eq!(
            self.compute.creates(),
            self.compute.deletes(),
            "every created key pair is deleted: {:?}",
            self.compute.mutations()
        );
        assert!(self.compute.terminates() <= 1);
        assert_eq!(self.compute.terminates(), self.compute.launches());
        assert_eq!(self.keys.len(), 0, "private key files left behind");
        assert!(self.compute.registered_keys().is_empty());
        assert!(self.store.record().is_none(), "session record not cleared");
    }
}

fn nginx() -> WorkloadSelection {
    WorkloadSelection::resolve(Workload::Nginx, None, None).unwrap()
}

fn failed_reason(summary: &RunSummary) -> &str {
    match &summary.outcome {
        RunOutcome::Failed { reason, .. } => reason,
        other => panic!("expected a failure, got {other:?}"),
    }
}

// ── Happy path ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn workload_a_runs_four_commands_then_releases_newest_first() {
    let h = Harness::happy();
    let mut configured = None;
    let summary = {
        let mut controller = h.controller(Cancellation::new());
        let mut trigger = FakeTrigger::operator();
        controller
            .run(&nginx(), &mut trigger, &h.reporter, |results| {
                configured = Some(results.len());
            })
            .await
    };

    assert_eq!(summary.outcome, RunOutcome::Released { cause: ReleaseCause::Operator });
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(configured, Some(4));
    assert_eq!(summary.address, Some(address()));
    assert_eq!(summary.workload, "nginx");
    assert_eq!(summary.image, "nginx:stable");

    assert_eq!(h.shell.executed(), nginx().commands());
    assert_eq!(summary.commands.len(), 4);
    for (result, command) in summary.commands.iter().zip(nginx().commands()) {
        assert_eq!(result.command, command);
        assert_eq!(result.exit_status, Some(0));
        assert_eq!(result.stdout, format!("ran: {command}\n"));
    }
    assert_eq!(h.shell.closed(), 1);

    let key = h.key_name();
    assert_eq!(
        h.compute.mutations(),
        vec![
            Call::CreateKeyPair(key.clone()),
            Call::RunInstance {
                key_name: key.clone()
            },
            Call::Terminate(INSTANCE_ID.to_string()),
            Call::DeleteKeyPair(key.clone()),
        ]
    );

    let target = &h.shell.targets()[0];
    assert_eq!(target.address.to_string(), ADDRESS);
    assert_eq!(target.user, "ec2-user");
    assert_eq!(target.key_path, PathBuf::from(format!("/keys/{key}.pem")));

    let kinds: Vec<ResourceKind> = summary.teardown.releases.iter().map(|r| r.resource).collect();
    assert_eq!(kinds, vec![ResourceKind::Instance, ResourceKind::Credential]);
    assert!(summary.teardown.is_clean());
    h.assert_all_released();
}

#[tokio::test]
async fn progress_is_persisted_while_running() {
    let h = Harness::happy();
    h.run().await;
    // Credential, instance, running, configured, one per release, then clear.
    assert!(h.store.saves.load(Ordering::SeqCst) >= 5);
    assert_eq!(h.store.clears.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn slow_boot_is_waited_out() {
    let compute = FakeCompute {
        describe_script: std::sync::Mutex::new(
            [ObservedState::Absent, ObservedState::Pending, ObservedState::Pending].into(),
        ),
        ..FakeCompute::default()
    };
    let h = Harness::new(compute, FakeShell::default());
    let summary = h.run().await;
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(h.shell.executed().len(), 4);
    h.assert_all_released();
}

// ── Acquisition failures ──────────────────────────────────────────────────────

#[tokio::test]
async fn instance_creation_failure_deletes_the_credential() {
    let compute = FakeCompute {
        reject_instance: true,
        ..FakeCompute::default()
    };
    let h = Harness::new(compute, FakeShell::default());
    let summary = h.run().await;

    assert_eq!(failed_reason(&summary), "creation_rejected");
    assert_ne!(summary.exit_code(), 0);
    assert_eq!(h.compute.launches(), 1);
    assert_eq!(h.compute.terminates(), 0);
    assert_eq!(h.compute.creates(), 1);
    assert_eq!(h.compute.deletes(), 1);
    assert!(h.shell.executed().is_empty());
    assert_eq!(h.keys.len(), 0);
    assert!(h.store.record().is_none());
}

#[tokio::test]
async fn rejected_key_pair_launches_nothing() {
    let compute = FakeCompute {
        reject_key_pair: true,
        ..FakeCompute::default()
    };
    let h = Harness::new(compute, FakeShell::default());
    let summary = h.run().await;

    assert_eq!(failed_reason(&summary), "creation_rejected");
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(h.compute.launches(), 0);
    assert_eq!(h.compute.deletes(), 1, "cleanup delete finds nothing to remove");
    assert!(summary.teardown.releases.is_empty());
    assert!(h.store.record().is_none());
}

#[tokio::test]
async fn lost_key_pair_reply_still_deletes_the_key_pair() {
    let compute = FakeCompute {
        lose_key_pair_reply: true,
        ..FakeCompute::default()
    };
    let h = Harness::new(compute, FakeShell::default());
    let summary = h.run().await;

    assert_eq!(failed_reason(&summary), "creation_rejected");
    assert_eq!(h.compute.launches(), 0);
    let name = h.key_name();
    assert_eq!(
        h.compute.mutations(),
        vec![Call::CreateKeyPair(name.clone()), Call::DeleteKeyPair(name)]
    );
    assert!(h.compute.registered_keys().is_empty());
    assert_eq!(h.keys.len(), 0);
}

#[tokio::test]
async fn lost_run_reply_still_terminates_the_instance() {
    let compute = FakeCompute {
        lose_run_reply: true,
        ..FakeCompute::default()
    };
    let h = Harness::new(compute, FakeShell::default());
    let summary = h.run().await;

    assert!(
        h.compute
            .calls()
            .iter()
            .any(|c| matches!(c, Call::FindByToken(_)))
    );
    assert!(
        h.compute
            .mutations()
            .contains(&Call::Terminate(INSTANCE_ID.to_string()))
    );
    assert_eq!(summary.exit_code(), 0);
    h.assert_all_released();
}

#[tokio::test]
async fn unwritable_key_file_rolls_back_the_key_pair() {
    let mut h = Harness::happy();
    h.keys.fail_persist = true;
    let summary = h.run().await;

    assert_eq!(failed_reason(&summary), "local_write_failed");
    assert_eq!(h.compute.creates(), 1);
    assert_eq!(h.compute.deletes(), 1);
    assert_eq!(h.compute.launches(), 0);
    assert!(h.compute.registered_keys().is_empty());
}

#[tokio::test]
async fn ready_timeout_still_terminates_the_instance() {
    let compute = FakeCompute {
        never_ready: true,
        ..FakeCompute::default()
    };
    let h = Harness::new(compute, FakeShell::default());
    let summary = h.run().await;

    assert_eq!(failed_reason(&summary), "instance_not_ready");
    assert!(h.clock.now().as_secs() >= h.settings.timeouts.instance_ready_secs);
    assert_eq!(
        h.compute.count(|c| *c == Call::Terminate(INSTANCE_ID.to_string())),
        1
    );
    assert!(h.shell.executed().is_empty());
    h.assert_all_released();
}

#[tokio::test]
async fn instance_dying_during_boot_fails_fast() {
    let compute = FakeCompute {
        describe_script: std::sync::Mutex::new(
            [ObservedState::Pending, ObservedState::ShuttingDown].into(),
        ),
        ..FakeCompute::default()
    };
    let h = Harness::new(compute, FakeShell::default());
    let summary = h.run().await;

    assert_eq!(failed_reason(&summary), "instance_not_ready");
    assert!(h.clock.now().as_secs() < h.settings.timeouts.instance_ready_secs);
    h.assert_all_released();
}

#[tokio::test]
async fn running_without_an_address_is_a_failure() {
    let compute = FakeCompute {
        no_address: true,
        ..FakeCompute::default()
    };
    let h = Harness::new(compute, FakeShell::default());
    let summary = h.run().await;

    assert_eq!(failed_reason(&summary), "address_unavailable");
    assert_eq!(h.shell.connects(), 0);
    h.assert_all_released();
}

// ── Remote configuration ──────────────────────────────────────────────────────

#[tokio::test]
async fn auth_failure_runs_no_commands_and_tears_down() {
    let shell = FakeShell::default();
    shell
        .connect_script
        .lock()
        .unwrap()
        .push_back(SshError::AuthRejected("Permission denied (publickey)".into()));
    let h = Harness::new(FakeCompute::default(), shell);
    let summary = h.run().await;

    assert_eq!(failed_reason(&summary), "auth_failed");
    assert_eq!(h.shell.connects(), 1);
    assert!(h.shell.executed().is_empty());
    assert_eq!(h.shell.closed(), 0);
    assert!(summary.teardown.is_clean());
    h.assert_all_released();
}

#[tokio::test]
async fn refused_connections_are_retried_with_backoff() {
    let shell = FakeShell::default();
    for _ in 0..3 {
        shell
            .connect_script
            .lock()
            .unwrap()
            .push_back(SshError::Unreachable("Connection refused".into()));
    }
    let h = Harness::new(FakeCompute::default(), shell);
    let summary = h.run().await;

    assert_eq!(summary.exit_code(), 0);
    assert_eq!(h.shell.connects(), 4);
    // Grace delay, then 3s + 6s + 12s of backoff.
    assert!(h.clock.now().as_secs() >= 10 + 3 + 6 + 12);
    h.assert_all_released();
}

#[tokio::test]
async fn unreachable_host_gives_up_after_the_connect_budget() {
    let shell = FakeShell {
        always_refuse: true,
        ..FakeShell::default()
    };
    let h = Harness::new(FakeCompute::default(), shell);
    let summary = h.run().await;

    assert_eq!(failed_reason(&summary), "unreachable");
    let t = &h.settings.timeouts;
    assert!(h.clock.now().as_secs() >= t.grace_delay_secs + t.connect_secs);
    assert!(h.shell.connects() > 1);
    h.assert_all_released();
}

#[tokio::test]
async fn non_zero_exit_is_reported_and_the_sequence_continues() {
    let shell = FakeShell::with_remote(RemoteScript {
        exit_codes: HashMap::from([("docker pull", 1)]),
        ..RemoteScript::default()
    });
    let h = Harness::new(FakeCompute::default(), shell);
    let summary = h.run().await;

    assert_eq!(summary.exit_code(), 0);
    assert_eq!(h.shell.executed().len(), 4);
    assert_eq!(summary.commands[2].exit_status, Some(1));
    assert!(!summary.commands[2].succeeded());
    assert!(summary.commands[3].succeeded());
    assert!(
        h.reporter
            .warnings()
            .iter()
            .any(|w| w.contains("docker pull") && w.contains("exit 1"))
    );
    h.assert_all_released();
}

#[tokio::test]
async fn lost_session_stops_the_sequence_and_still_closes() {
    let shell = FakeShell::with_remote(RemoteScript {
        lose_session_on: Some("systemctl"),
        ..RemoteScript::default()
    });
    let h = Harness::new(FakeCompute::default(), shell);
    let summary = h.run().await;

    assert_eq!(failed_reason(&summary), "connection_lost");
    assert_eq!(h.shell.executed(), vec!["sudo yum install -y docker".to_string()]);
    assert_eq!(h.shell.closed(), 1);
    h.assert_all_released();
}

// ── Interruption ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancelled_before_start_creates_nothing() {
    let h = Harness::happy();
    let cancel = Cancellation::new();
    cancel.cancel();
    let summary = h.run_with(cancel, FakeTrigger::operator()).await;

    assert_eq!(summary.outcome, RunOutcome::Interrupted);
    assert_eq!(summary.exit_code(), 130);
    assert!(h.compute.calls().is_empty());
}

#[tokio::test]
async fn interrupt_while_waiting_for_the_instance_releases_both() {
    let cancel = Cancellation::new();
    let compute = FakeCompute {
        describe_script: std::sync::Mutex::new([ObservedState::Pending].into()),
        cancel_on_describe: Some(cancel.clone()),
        ..FakeCompute::default()
    };
    let h = Harness::new(compute, FakeShell::default());
    let summary = h.run_with(cancel, FakeTrigger::operator()).await;

    assert_eq!(summary.outcome, RunOutcome::Interrupted);
    assert_eq!(summary.exit_code(), 130);
    assert!(h.shell.executed().is_empty());
    assert_eq!(h.compute.terminates(), 1);
    h.assert_all_released();
}

#[tokio::test]
async fn interrupt_between_commands_skips_the_rest() {
    let cancel = Cancellation::new();
    let shell = FakeShell::with_remote(RemoteScript {
        cancel_after: Some(("systemctl", cancel.clone())),
        ..RemoteScript::default()
    });
    let h = Harness::new(FakeCompute::default(), shell);
    let summary = h.run_with(cancel, FakeTrigger::operator()).await;

    assert_eq!(summary.outcome, RunOutcome::Interrupted);
    assert_eq!(h.shell.executed().len(), 2);
    assert_eq!(h.shell.closed(), 1);
    h.assert_all_released();
}

#[tokio::test]
async fn signal_after_configuration_is_a_normal_release() {
    let h = Harness::happy();
    let cancel = Cancellation::new();
    let summary = h
        .run_with(cancel.clone(), FakeTrigger::signal(cancel))
        .await;

    assert_eq!(summary.outcome, RunOutcome::Released { cause: ReleaseCause::Signal });
    assert_eq!(summary.exit_code(), 0);
    h.assert_all_released();
}

// ── Teardown ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_teardown_makes_no_provider_calls() {
    let h = Harness::happy();
    let mut controller = h.controller(Cancellation::new());
    let mut trigger = FakeTrigger::operator();
    controller
        .run(&nginx(), &mut trigger, &h.reporter, |_| {})
        .await;
    let before = h.compute.calls();

    let again = controller.teardown(&h.reporter).await;

    assert!(again.releases.is_empty());
    assert_eq!(h.compute.calls(), before);
    assert_eq!(h.compute.terminates(), 1);
    assert_eq!(h.compute.deletes(), 1);
}

#[tokio::test]
async fn failed_terminate_is_reported_and_kept_for_cleanup() {
    let compute = FakeCompute {
        fail_terminate: true,
        ..FakeCompute::default()
    };
    let h = Harness::new(compute, FakeShell::default());
    let summary = h.run().await;

    assert!(matches!(summary.outcome, RunOutcome::Released { .. }));
    assert!(!summary.teardown.is_clean());
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(summary.teardown.releases[0].status, ReleaseStatus::Failed);
    assert_eq!(summary.teardown.warnings().count(), 1);
    // The credential is still released after the instance failed.
    assert_eq!(summary.teardown.releases[1].status, ReleaseStatus::Released);
    assert_eq!(h.compute.deletes(), 1);

    let record = h.store.record().expect("record kept");
    assert!(record.live.is_empty());
    assert_eq!(record.unreleased.len(), 1);
    assert_eq!(record.unreleased[0].resource.id(), INSTANCE_ID);
}

#[tokio::test]
async fn failed_key_pair_delete_still_removes_the_local_key() {
    let compute = FakeCompute {
        fail_delete_key_pair: true,
        ..FakeCompute::default()
    };
    let h = Harness::new(compute, FakeShell::default());
    let summary = h.run().await;

    assert_eq!(summary.exit_code(), 1);
    assert_eq!(h.compute.terminates(), 1);
    assert_eq!(h.keys.len(), 0);
    let record = h.store.record().expect("record kept");
    assert_eq!(record.unreleased.len(), 1);
    assert_eq!(record.unreleased[0].resource.kind(), ResourceKind::Credential);
}
