//! End-to-end launches against a stand-in trainer script run by `sh`.
#![cfg(unix)]

use std::path::{Path, PathBuf};

use clap::Parser;
use nerlaunch_core::checkpoint::CheckpointLayout;
use nerlaunch_core::{LaunchError, RunConfig};
use nerlaunch_runner::{exit_code_for, run, Cli, Launcher, SpawnError};
use tempfile::TempDir;

const FAKE_TRAINER: &str = r#"
echo "args: $*"
echo "epoch: 1, dev F1 = 0.61"
echo "epoch: 2, dev F1 = 0.74, F1 on test = 0.71"
printf 'batch 1/3\rbatch 2/3\rbatch 3/3\n'
echo "unbuffered=$PYTHONUNBUFFERED"
echo "epoch: 3, dev F1 = 0.70"
echo "cuda warning" >&2
exit "${FAKE_EXIT:-0}"
"#;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new(exit_code: i32) -> Self {
        let dir = TempDir::new().unwrap();
        let corpus = "Naloxone\tS-Chemical\nreverses\tO\n\nClonidine\tS-Chemical\n";
        for name in ["merge.tsv", "devel.tsv", "test.tsv"] {
            std::fs::write(dir.path().join(name), corpus).unwrap();
        }
        std::fs::write(dir.path().join("vec.txt"), "naloxone 0.1 0.2 0.3\n").unwrap();
        std::fs::write(
            dir.path().join("train_wc.sh"),
            FAKE_TRAINER.replace("${FAKE_EXIT:-0}", &exit_code.to_string()),
        )
        .unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn script(&self) -> PathBuf {
        self.path("train_wc.sh")
    }

    fn checkpoint(&self) -> PathBuf {
        self.path("checkpoint").join("attention")
    }

    fn config(&self) -> RunConfig {
        let mut config = RunConfig::default();
        config.corpus.train = vec![self.path("merge.tsv")];
        config.corpus.dev = vec![self.path("devel.tsv")];
        config.corpus.test = vec![self.path("test.tsv")];
        config.embedding.emb_file = Some(self.path("vec.txt"));
        config.embedding.word_dim = Some(3);
        config.embedding.caseless = true;
        config.model.attention = true;
        config.schedule.epoch = Some(100);
        config.schedule.patience = Some(30);
        config.device.gpu = Some(0);
        config.checkpoint.checkpoint = Some(self.checkpoint());
        config
    }

    fn argv(&self, subcommand: &str) -> Vec<String> {
        let s = |p: &Path| p.display().to_string();
        vec![
            "nerlaunch".into(),
            subcommand.into(),
            "--no-default-config".into(),
            "--python".into(),
            "sh".into(),
            "--script".into(),
            s(&self.script()),
            "--train_file".into(),
            s(&self.path("merge.tsv")),
            "--dev_file".into(),
            s(&self.path("devel.tsv")),
            "--test_file".into(),
            s(&self.path("test.tsv")),
            "--emb_file".into(),
            s(&self.path("vec.txt")),
            "--word_dim".into(),
            "3".into(),
            "--checkpoint".into(),
            s(&self.checkpoint()),
        ]
    }
}

#[tokio::test]
async fn test_exit_status_and_output_are_recorded() {
    let ws = Workspace::new(7);
    let launcher = Launcher::new("sh", ws.script()).with_echo(false);

    let outcome = launcher.run(ws.config()).await.unwrap();
    assert_eq!(outcome.exit_code(), 7);
    assert_eq!(outcome.manifest.exit_code, Some(7));
    assert_eq!(outcome.manifest.last_epoch, Some(3));
    assert_eq!(outcome.manifest.best_f1, Some(0.74));
    assert_eq!(outcome.manifest.test_f1, Some(0.71));
    assert!(outcome.manifest.finished_at_unix.is_some());

    let layout = CheckpointLayout::new(ws.checkpoint());
    assert!(layout.root().is_dir());

    let log = std::fs::read_to_string(layout.log_path()).unwrap();
    assert!(log.contains("args: --train_file"));
    assert!(log.contains("--attention --epoch 100 --patience 30 --gpu 0 --checkpoint"));
    assert!(log.contains("cuda warning"));
    assert!(log.contains("\nbatch 3/3\n"));
    assert!(!log.contains("batch 1/3"));
    assert!(!log.contains("unbuffered=\n"));

    let manifest = layout.read_manifest().unwrap();
    assert_eq!(manifest.exit_code, Some(7));
    assert_eq!(manifest.program, "sh");
    assert_eq!(manifest.config, ws.config());
}

#[tokio::test]
async fn test_successful_runs_append_to_log() {
    let ws = Workspace::new(0);
    let launcher = Launcher::new("sh", ws.script()).with_echo(false);

    assert_eq!(launcher.run(ws.config()).await.unwrap().exit_code(), 0);
    assert_eq!(launcher.run(ws.config()).await.unwrap().exit_code(), 0);

    let log = std::fs::read_to_string(CheckpointLayout::new(ws.checkpoint()).log_path()).unwrap();
    assert_eq!(log.matches("cuda warning").count(), 2);
}

#[tokio::test]
async fn test_invalid_config_never_starts_trainer() {
    let ws = Workspace::new(0);
    let mut config = ws.config();
    config.corpus.dev = vec![ws.path("missing-devel.tsv")];

    let launcher = Launcher::new("sh", ws.script()).with_echo(false);
    let err = launcher.run(config).await.unwrap_err();

    match err.downcast_ref::<LaunchError>() {
        Some(LaunchError::InvalidConfig(errors)) => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("--dev_file"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(exit_code_for(&err), 2);
    assert!(!ws.checkpoint().exists());
}

#[tokio::test]
async fn test_missing_program_is_a_spawn_error() {
    let ws = Workspace::new(0);
    let launcher = Launcher::new(
        ws.path("no-such-python").display().to_string(),
        ws.script(),
    );

    let err = launcher.run(ws.config()).await.unwrap_err();
    assert!(err.downcast_ref::<SpawnError>().is_some());
    assert_eq!(exit_code_for(&err), 127);

    let manifest = CheckpointLayout::new(ws.checkpoint()).read_manifest().unwrap();
    assert_eq!(manifest.exit_code, Some(127));
    assert!(manifest.finished_at_unix.is_some());
}

#[tokio::test]
async fn test_cli_train_propagates_exit_code() {
    let ws = Workspace::new(3);
    let cli = Cli::try_parse_from(ws.argv("train")).unwrap();
    assert_eq!(run(cli).await.unwrap(), 3);
}

#[tokio::test]
async fn test_cli_check_does_not_create_checkpoint() {
    let ws = Workspace::new(0);
    let cli = Cli::try_parse_from(ws.argv("check")).unwrap();
    assert_eq!(run(cli).await.unwrap(), 0);
    assert!(!ws.checkpoint().exists());
}

#[tokio::test]
async fn test_cli_bad_config_file_is_a_usage_error() {
    let ws = Workspace::new(0);
    let broken = ws.path("broken.json");
    std::fs::write(&broken, "{ not json").unwrap();

    for config in [broken, ws.path("missing.json")] {
        let mut argv = ws.argv("check");
        argv.push("--config".into());
        argv.push(config.display().to_string());

        let cli = Cli::try_parse_from(argv).unwrap();
        let err = run(cli).await.unwrap_err();
        assert_eq!(exit_code_for(&err), 2, "{err:#}");
    }
}
