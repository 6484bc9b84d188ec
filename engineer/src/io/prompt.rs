//! Fixed framing text sent alongside preprompts.
//!
//! Preprompts are operator-editable files; everything here is built into the
//! binary. Values are inserted verbatim and trailing newlines are preserved.

use std::sync::LazyLock;

use anyhow::Result;
use minijinja::{Environment, context};

const ENTRYPOINT_SYSTEM_TEMPLATE: &str = include_str!("prompts/entrypoint_system.md");
const CLARIFY_FOLLOW_UP_TEMPLATE: &str = include_str!("prompts/clarify_follow_up.md");
const RESPEC_REITERATE_TEMPLATE: &str = include_str!("prompts/respec_reiterate.md");

const INLINE_TEMPLATES: &[(&str, &str)] = &[
    ("setup", "{{ generate }}\nUseful to know:\n{{ philosophy }}"),
    ("instructions", "Instructions: {{ prompt }}"),
    ("specification", "Specification:\n\n{{ specification }}"),
    ("unit_tests", "Unit tests:\n\n{{ unit_tests }}"),
    (
        "entrypoint_user",
        "Information about the codebase:\n\n{{ all_output }}",
    ),
    (
        "assumptions",
        "Make your own assumptions and state them explicitly before starting",
    ),
    ("fix_code", "Please fix any errors in the code above."),
];

static ENGINE: LazyLock<PromptEngine> = LazyLock::new(PromptEngine::new);

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.add_template("entrypoint_system", ENTRYPOINT_SYSTEM_TEMPLATE)
            .expect("entrypoint_system template should be valid");
        env.add_template("clarify_follow_up", CLARIFY_FOLLOW_UP_TEMPLATE)
            .expect("clarify_follow_up template should be valid");
        env.add_template("respec_reiterate", RESPEC_REITERATE_TEMPLATE)
            .expect("respec_reiterate template should be valid");
        for &(name, source) in INLINE_TEMPLATES {
            env.add_template(name, source)
                .expect("inline template should be valid");
        }
        Self { env }
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        Ok(template.render(ctx)?)
    }
}

/// `generate` preprompt, a separator, then the `philosophy` preprompt.
pub fn setup_system(generate: &str, philosophy: &str) -> Result<String> {
    ENGINE.render("setup", context! { generate, philosophy })
}

pub fn instructions(prompt: &str) -> Result<String> {
    ENGINE.render("instructions", context! { prompt })
}

pub fn specification(specification: &str) -> Result<String> {
    ENGINE.render("specification", context! { specification })
}

pub fn unit_tests(unit_tests: &str) -> Result<String> {
    ENGINE.render("unit_tests", context! { unit_tests })
}

/// Operator answer followed by the request for the next question.
pub fn clarify_follow_up(answer: &str) -> Result<String> {
    ENGINE.render("clarify_follow_up", context! { answer })
}

/// Sent when the operator stops answering before the model is satisfied.
pub fn assumptions() -> Result<String> {
    ENGINE.render("assumptions", context! {})
}

pub fn respec_reiterate() -> Result<String> {
    ENGINE.render("respec_reiterate", context! {})
}

pub fn fix_code() -> Result<String> {
    ENGINE.render("fix_code", context! {})
}

pub fn entrypoint_system() -> Result<String> {
    ENGINE.render("entrypoint_system", context! {})
}

pub fn entrypoint_user(all_output: &str) -> Result<String> {
    ENGINE.render("entrypoint_user", context! { all_output })
}
