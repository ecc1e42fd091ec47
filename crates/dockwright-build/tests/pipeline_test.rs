use std::sync::Mutex;
use std::time::Duration;

use dockwright_build::pipeline::{
    Artifact, BUILDER_STAGE, BuildError, BuildStage, DEPS_STAGE, Pipeline, RUNNER_STAGE,
    SourceTree, StageRequest, StageRunner,
};
use dockwright_build::{DockerError, ToolError};
use dockwright_core::variables::builtin_variables;
use dockwright_core::{ConfigurationSet, Source, resolve};

/// Records every call; optionally fails or stalls on one stage.
#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<String>>,
    args: Mutex<Vec<(String, Vec<(String, String)>)>>,
    inputs: Mutex<Vec<(String, Vec<String>)>>,
    fail_on: Option<&'static str>,
    stall_on: Option<&'static str>,
}

impl RecordingRunner {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl StageRunner for RecordingRunner {
    async fn run_stage(&self, request: &StageRequest<'_>) -> Result<(), DockerError> {
        let name = request.stage.name.clone();
        self.calls.lock().unwrap().push(format!("run {name}"));
        self.args
            .lock()
            .unwrap()
            .push((name.clone(), request.build_args.clone()));
        self.inputs.lock().unwrap().push((
            name.clone(),
            request.inputs.iter().map(|a| a.stage.clone()).collect(),
        ));

        if self.stall_on == Some(name.as_str()) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_on == Some(name.as_str()) {
            return Err(DockerError::Command {
                action: "build",
                source: ToolError::CommandFailed {
                    program: "docker".to_owned(),
                    args: vec![],
                    stderr: "npm ERR! missing script: build".to_owned(),
                },
            });
        }
        Ok(())
    }

    async fn discard(&self, artifact: &Artifact) -> Result<(), DockerError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("discard {}", artifact.stage));
        Ok(())
    }
}

fn config(client_id: &str) -> ConfigurationSet {
    resolve(
        &builtin_variables(),
        &[Source::overrides([("APP_CLIENT_ID", client_id)])],
    )
    .unwrap()
}

fn source() -> SourceTree {
    SourceTree {
        context_dir: "/work/.dockwright/context".into(),
        dockerfile: "/work/.dockwright/context/Dockerfile".into(),
        revision: Some("abc1234def".to_owned()),
    }
}

fn standard() -> Pipeline {
    Pipeline::standard(["APP_CLIENT_ID", "APP_API_URL"])
}

#[tokio::test]
async fn stages_run_in_order_and_intermediates_are_discarded() {
    let runner = RecordingRunner::default();

    let artifact = standard()
        .run(&runner, &config("abc"), &source(), "webapp", None)
        .await
        .unwrap();

    assert_eq!(
        runner.calls(),
        vec![
            "run deps",
            "run builder",
            "discard deps",
            "run runner",
            "discard builder",
        ]
    );
    assert_eq!(artifact.stage, RUNNER_STAGE);
    assert!(artifact.reference.starts_with("webapp:runner-"));
    assert_eq!(artifact.short_id().len(), 12);
}

#[tokio::test]
async fn build_values_are_bound_at_builder_and_inherited() {
    let runner = RecordingRunner::default();

    standard()
        .run(&runner, &config("abc"), &source(), "webapp", None)
        .await
        .unwrap();

    let args = runner.args.lock().unwrap().clone();
    assert_eq!(args[0], (DEPS_STAGE.to_owned(), vec![]));
    let expected = vec![
        ("APP_API_URL".to_owned(), "https://api.example.com".to_owned()),
        ("APP_CLIENT_ID".to_owned(), "abc".to_owned()),
    ];
    assert_eq!(args[1], (BUILDER_STAGE.to_owned(), expected.clone()));
    assert_eq!(args[2], (RUNNER_STAGE.to_owned(), expected));
}

#[tokio::test]
async fn stage_sees_only_declared_inputs() {
    let runner = RecordingRunner::default();

    standard()
        .run(&runner, &config("abc"), &source(), "webapp", None)
        .await
        .unwrap();

    let inputs = runner.inputs.lock().unwrap().clone();
    assert_eq!(inputs[0].1, Vec::<String>::new());
    assert_eq!(inputs[1].1, vec!["deps"]);
    assert_eq!(inputs[2].1, vec!["builder"]);
}

#[tokio::test]
async fn different_build_values_produce_distinct_artifacts() {
    let runner = RecordingRunner::default();
    let pipeline = standard();

    let a = pipeline
        .run(&runner, &config("tenant-a"), &source(), "webapp", None)
        .await
        .unwrap();
    let b = pipeline
        .run(&runner, &config("tenant-b"), &source(), "webapp", None)
        .await
        .unwrap();
    let a_again = pipeline
        .run(&runner, &config("tenant-a"), &source(), "webapp", None)
        .await
        .unwrap();

    assert_ne!(a.fingerprint, b.fingerprint);
    assert_ne!(a.reference, b.reference);
    assert_eq!(a, a_again);
}

#[tokio::test]
async fn failing_stage_aborts_the_run() {
    let runner = RecordingRunner {
        fail_on: Some(BUILDER_STAGE),
        ..Default::default()
    };

    let err = standard()
        .run(&runner, &config("abc"), &source(), "webapp", None)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::StageFailed { ref stage, .. } if stage == "builder"));
    assert_eq!(runner.calls(), vec!["run deps", "run builder", "discard deps"]);
}

#[tokio::test]
async fn failing_final_stage_discards_every_intermediate() {
    let runner = RecordingRunner {
        fail_on: Some(RUNNER_STAGE),
        ..Default::default()
    };

    standard()
        .run(&runner, &config("abc"), &source(), "webapp", None)
        .await
        .unwrap_err();

    assert_eq!(
        runner.calls(),
        vec![
            "run deps",
            "run builder",
            "discard deps",
            "run runner",
            "discard builder",
        ]
    );
}

#[tokio::test]
async fn unbound_value_fails_before_any_stage() {
    let runner = RecordingRunner::default();
    let pipeline = Pipeline::standard(["APP_CLIENT_ID", "NOT_DECLARED"]);

    let err = pipeline
        .run(&runner, &config("abc"), &source(), "webapp", None)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::UnboundValue { ref name, .. } if name == "NOT_DECLARED"));
    assert!(runner.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stage_timeout_is_enforced() {
    let runner = RecordingRunner {
        stall_on: Some(DEPS_STAGE),
        ..Default::default()
    };

    let err = standard()
        .run(
            &runner,
            &config("abc"),
            &source(),
            "webapp",
            Some(Duration::from_secs(60)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Timeout { secs: 60, .. }));
    assert_eq!(runner.calls(), vec!["run deps"]);
}

#[tokio::test(start_paused = true)]
async fn timed_out_stage_discards_earlier_artifacts() {
    let runner = RecordingRunner {
        stall_on: Some(BUILDER_STAGE),
        ..Default::default()
    };

    let err = standard()
        .run(
            &runner,
            &config("abc"),
            &source(),
            "webapp",
            Some(Duration::from_secs(60)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Timeout { ref stage, .. } if stage == "builder"));
    assert_eq!(runner.calls(), vec!["run deps", "run builder", "discard deps"]);
}

#[tokio::test]
async fn parallel_branches_are_released_after_last_consumer() {
    let runner = RecordingRunner::default();
    let pipeline = Pipeline::new(vec![
        BuildStage::new("deps"),
        BuildStage::new("assets").after("deps"),
        BuildStage::new("server").after("deps"),
        BuildStage::new("runner").after("assets").after("server"),
    ])
    .unwrap();

    pipeline
        .run(&runner, &config("abc"), &source(), "webapp", None)
        .await
        .unwrap();

    assert_eq!(
        runner.calls(),
        vec![
            "run deps",
            "run assets",
            "run server",
            "discard deps",
            "run runner",
            "discard assets",
            "discard server",
        ]
    );
}
