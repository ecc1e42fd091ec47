use dockwright_core::{AppConfig, BuildConfig, ProjectLayout, Scope, VariableSpec};

use crate::pipeline::{BUILDER_STAGE, DEPS_STAGE, RUNNER_STAGE};

/// Generates the multi-stage Dockerfile for the wrapped application.
///
/// Stage names match [`crate::Pipeline::standard`], so each stage can be
/// built on its own with `--target`.
pub struct DockerfileGenerator<'a> {
    build: &'a BuildConfig,
    app: &'a AppConfig,
    layout: &'a ProjectLayout,
    variables: &'a [VariableSpec],
}

impl<'a> DockerfileGenerator<'a> {
    pub fn new(
        build: &'a BuildConfig,
        app: &'a AppConfig,
        layout: &'a ProjectLayout,
        variables: &'a [VariableSpec],
    ) -> Self {
        Self {
            build,
            app,
            layout,
            variables,
        }
    }

    pub fn render(&self) -> String {
        let manifest_files = match &self.layout.lockfile {
            Some(lock) => format!(
                "{} {}",
                self.layout.manifest.display(),
                lock.display()
            ),
            None => self.layout.manifest.display().to_string(),
        };
        let install = if self.layout.has_lockfile() {
            &self.build.install_command
        } else {
            &self.build.fallback_install_command
        };

        let build_args: String = self
            .variables
            .iter()
            .filter(|v| v.scope == Scope::Build)
            .map(|v| format!("ARG {}\n", v.name))
            .collect();

        let mut runtime_env: String = self
            .variables
            .iter()
            .filter(|v| v.scope == Scope::Run && v.name != "PORT")
            .filter_map(|v| {
                v.default
                    .as_deref()
                    .map(|d| format!("ENV {}={}\n", v.name, env_value(d)))
            })
            .collect();
        runtime_env.push_str(&format!("ENV PORT={}\n", self.app.port));

        format!(
            r#"# syntax=docker/dockerfile:1
# Generated by dockwright

# === Stage 1: Dependencies ===
FROM {base} AS {deps}
WORKDIR /app
COPY {manifest_files} ./
RUN {install}

# === Stage 2: Builder ===
FROM {base} AS {builder}
WORKDIR /app
{build_args}COPY --from={deps} /app /app
COPY . .
RUN {build_command}

# === Stage 3: Runner ===
FROM {runtime} AS {runner}
WORKDIR /app
{runtime_env}RUN {create_user}
COPY --from={builder} --chown={user}:{user} /app /app
USER {user}
EXPOSE {port}
CMD {cmd}
"#,
            base = self.build.base_image,
            runtime = self.build.runtime_image,
            deps = DEPS_STAGE,
            builder = BUILDER_STAGE,
            runner = RUNNER_STAGE,
            build_command = self.build.build_command,
            create_user = self.create_user(),
            user = self.build.user,
            port = self.app.port,
            cmd = exec_form(&self.build.start_command),
        )
    }

    fn create_user(&self) -> String {
        let user = &self.build.user;
        let uid = self.build.uid;
        if self.build.runtime_image.contains("alpine") {
            format!("addgroup -S -g {uid} {user} && adduser -S -u {uid} -G {user} {user}")
        } else {
            format!(
                "groupadd --system --gid {uid} {user} && useradd --system --uid {uid} --gid {user} --no-create-home {user}"
            )
        }
    }
}

/// Renders a command as a JSON exec-form array.
fn exec_form(command: &[String]) -> String {
    let parts: Vec<String> = command
        .iter()
        .map(|c| format!("\"{}\"", c.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("[{}]", parts.join(", "))
}

/// Quotes an `ENV` value so Docker takes it literally: no word splitting,
/// no `$` substitution, backslashes kept.
fn env_value(value: &str) -> String {
    if !value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '"' | '\\' | '$'))
    {
        return value.to_owned();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
