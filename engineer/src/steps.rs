//! Step bodies: one unit of pipeline work each.
//!
//! A step reads the stores, drives zero or more conversation turns and
//! returns its transcript. Persisting that transcript is the runner's job;
//! steps that replay an earlier step read it back through
//! [`load_transcript`].

use std::process::Command;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::chat_to_files::extract_code_blocks;
use crate::core::clarify::{
    ClarifyEnd, NOTHING_MORE_TO_CLARIFY, OperatorAnswer, clarification_end, classify_answer,
};
use crate::core::preset::StepId;
use crate::core::types::{Message, Transcript};
use crate::error::PipelineError;
use crate::io::cancel::CancelToken;
use crate::io::console::{Console, green, red};
use crate::io::conversation::Ai;
use crate::io::process::{RunExit, run_interactive};
use crate::io::prompt;
use crate::io::store::{ALL_OUTPUT_KEY, Stores, to_files};
use crate::io::transcript_log::load_transcript;

/// Script written by `gen_entrypoint` and run by `execute_entrypoint`.
pub const RUN_SCRIPT_KEY: &str = "run.sh";

const CLARIFY_ASK: &str = "(answer in text, or \"c\" to move on)";
const CLARIFY_ASSUMING: &str = "(letting engineer make its own assumptions)";
const MAIN_PROMPT_WARNING: &str = "Please put the prompt in the file `prompt`, not `main_prompt`";

/// Everything a step may touch.
pub struct StepContext<'a> {
    pub ai: &'a Ai,
    pub stores: &'a Stores,
    /// Operator-facing output and input.
    pub console: &'a dyn Console,
    /// Fired to stop the `execute_entrypoint` subprocess.
    pub cancel: &'a CancelToken,
}

/// Run one step and return its transcript.
#[instrument(skip_all, fields(step = %step))]
pub fn run_step(step: StepId, ctx: &StepContext<'_>) -> Result<Transcript> {
    match step {
        StepId::Clarify => clarify(ctx),
        StepId::GenClarifiedCode => gen_clarified_code(ctx),
        StepId::SimpleGen => simple_gen(ctx),
        StepId::GenSpec => gen_spec(ctx),
        StepId::Respec => respec(ctx),
        StepId::GenUnitTests => gen_unit_tests(ctx),
        StepId::GenCode => gen_code(ctx),
        StepId::GenEntrypoint => gen_entrypoint(ctx),
        StepId::ExecuteEntrypoint => execute_entrypoint(ctx),
        StepId::UseFeedback => use_feedback(ctx),
        StepId::FixCode => fix_code(ctx),
    }
}

/// The operator's prompt, falling back to the legacy `main_prompt` file.
fn get_prompt(ctx: &StepContext<'_>) -> Result<String> {
    let input = &ctx.stores.input;
    if input.contains("prompt") {
        return input.get("prompt");
    }
    if input.contains("main_prompt") {
        warn!("reading legacy main_prompt file");
        ctx.console.say(&red(MAIN_PROMPT_WARNING));
        ctx.console.say("");
        return input.get("main_prompt");
    }
    Err(PipelineError::not_found(input.name(), "prompt").into())
}

fn setup_sys_prompt(stores: &Stores) -> Result<String> {
    prompt::setup_system(
        &stores.preprompts.get("generate")?,
        &stores.preprompts.get("philosophy")?,
    )
}

fn clarify(ctx: &StepContext<'_>) -> Result<Transcript> {
    let mut transcript = Transcript::from(vec![Message::system(ctx.stores.preprompts.get("qa")?)]);
    let mut user_input = get_prompt(ctx)?;

    loop {
        transcript = ctx.ai.next(transcript, Some(&user_input))?;

        match clarification_end(transcript.last_content()) {
            Some(ClarifyEnd::Sentinel) => break,
            Some(ClarifyEnd::Declined) => {
                ctx.console.say(NOTHING_MORE_TO_CLARIFY);
                break;
            }
            None => {}
        }

        ctx.console.say("");
        let answer = ctx.console.ask(CLARIFY_ASK)?;
        ctx.console.say("");

        match classify_answer(answer.as_deref().unwrap_or("")) {
            OperatorAnswer::MoveOn => {
                ctx.console.say(CLARIFY_ASSUMING);
                ctx.console.say("");
                let transcript = ctx.ai.next(transcript, Some(&prompt::assumptions()?))?;
                ctx.console.say("");
                return Ok(transcript);
            }
            OperatorAnswer::Answer(text) => user_input = prompt::clarify_follow_up(text)?,
        }
    }

    ctx.console.say("");
    Ok(transcript)
}

fn gen_clarified_code(ctx: &StepContext<'_>) -> Result<Transcript> {
    let clarified = load_transcript(&ctx.stores.logs, StepId::Clarify)?;

    let mut transcript = Transcript::from(vec![Message::system(setup_sys_prompt(ctx.stores)?)]);
    for message in clarified.into_iter().skip(1) {
        transcript.push(message);
    }

    let use_qa = ctx.stores.preprompts.get("use_qa")?;
    let transcript = ctx.ai.next(transcript, Some(&use_qa))?;
    to_files(transcript.last_content(), &ctx.stores.workspace)?;
    Ok(transcript)
}

fn simple_gen(ctx: &StepContext<'_>) -> Result<Transcript> {
    let system = setup_sys_prompt(ctx.stores)?;
    let transcript = ctx.ai.start(&system, &get_prompt(ctx)?)?;
    to_files(transcript.last_content(), &ctx.stores.workspace)?;
    Ok(transcript)
}

fn gen_spec(ctx: &StepContext<'_>) -> Result<Transcript> {
    let stores = ctx.stores;
    let transcript = Transcript::from(vec![
        Message::system(setup_sys_prompt(stores)?),
        Message::system(prompt::instructions(&stores.input.get("prompt")?)?),
    ]);

    let spec = stores.preprompts.get("spec")?;
    let transcript = ctx.ai.next(transcript, Some(&spec))?;
    stores.memory.set("specification", transcript.last_content())?;
    Ok(transcript)
}

fn respec(ctx: &StepContext<'_>) -> Result<Transcript> {
    let stores = ctx.stores;
    let mut transcript = load_transcript(&stores.logs, StepId::GenSpec)?;
    transcript.push(Message::system(stores.preprompts.get("respec")?));

    let transcript = ctx.ai.next(transcript, None)?;
    let transcript = ctx.ai.next(transcript, Some(&prompt::respec_reiterate()?))?;
    stores.memory.set("specification", transcript.last_content())?;
    Ok(transcript)
}

fn gen_unit_tests(ctx: &StepContext<'_>) -> Result<Transcript> {
    let stores = ctx.stores;
    let transcript = Transcript::from(vec![
        Message::system(setup_sys_prompt(stores)?),
        Message::user(prompt::instructions(&stores.input.get("prompt")?)?),
        Message::user(prompt::specification(&stores.memory.get("specification")?)?),
    ]);

    let unit_tests = stores.preprompts.get("unit_tests")?;
    let transcript = ctx.ai.next(transcript, Some(&unit_tests))?;
    stores.memory.set("unit_tests", transcript.last_content())?;
    to_files(&stores.memory.get("unit_tests")?, &stores.workspace)?;
    Ok(transcript)
}

fn gen_code(ctx: &StepContext<'_>) -> Result<Transcript> {
    let stores = ctx.stores;
    let transcript = Transcript::from(vec![
        Message::system(setup_sys_prompt(stores)?),
        Message::user(prompt::instructions(&stores.input.get("prompt")?)?),
        Message::user(prompt::specification(&stores.memory.get("specification")?)?),
        Message::user(prompt::unit_tests(&stores.memory.get("unit_tests")?)?),
    ]);

    let use_qa = stores.preprompts.get("use_qa")?;
    let transcript = ctx.ai.next(transcript, Some(&use_qa))?;
    to_files(transcript.last_content(), &stores.workspace)?;
    Ok(transcript)
}

fn gen_entrypoint(ctx: &StepContext<'_>) -> Result<Transcript> {
    let workspace = &ctx.stores.workspace;
    let all_output = workspace.get(ALL_OUTPUT_KEY)?;
    let transcript = ctx.ai.start(
        &prompt::entrypoint_system()?,
        &prompt::entrypoint_user(&all_output)?,
    )?;
    ctx.console.say("");

    let script = extract_code_blocks(transcript.last_content()).join("\n");
    workspace.set(RUN_SCRIPT_KEY, &script)?;
    Ok(transcript)
}

/// Offer to run the generated `run.sh`. Always returns an empty transcript.
fn execute_entrypoint(ctx: &StepContext<'_>) -> Result<Transcript> {
    let workspace = &ctx.stores.workspace;
    let command = workspace.get(RUN_SCRIPT_KEY)?;
    let console = ctx.console;

    console.say("Do you want to execute this code?\n");
    console.say(&command);
    console.say("");
    console.say("If yes, press enter. Otherwise, type \"no\"");
    console.say("");

    let answer = console.ask("")?;
    if !confirms_execution(answer.as_deref()) {
        console.say("Ok, not executing the code.");
        return Ok(Transcript::new());
    }

    console.say("Executing the code...");
    console.say("");
    console.say(&green(
        "Note: If it does not work as expected, consider running the code in another way than above.",
    ));
    console.say("");
    console.say("You can press ctrl+c *once* to stop the execution.");
    console.say("");

    let mut cmd = Command::new("bash");
    cmd.arg(RUN_SCRIPT_KEY).current_dir(workspace.root());
    ctx.cancel.arm();
    let exit = match run_interactive(cmd, ctx.cancel) {
        Ok(exit) => exit,
        Err(err) => {
            console.say("");
            console.say(&format!("Error executing the code: {err:#}"));
            console.say("");
            return Ok(Transcript::new());
        }
    };

    console.say("");
    match exit {
        RunExit::Cancelled => {
            console.say("Stopping execution.");
            console.say("Execution stopped.");
        }
        RunExit::Exited(status) => match status.code() {
            Some(0) => console.say("Execution finished successfully."),
            Some(code) => console.say(&format!("Execution failed with exit code {code}.")),
            None => console.say("Execution failed: terminated by a signal."),
        },
    }
    console.say("");
    info!(?exit, "entrypoint finished");
    Ok(Transcript::new())
}

/// Empty input, `y` and `yes` confirm; end of input declines.
fn confirms_execution(answer: Option<&str>) -> bool {
    answer.is_some_and(|text| matches!(text.trim(), "" | "y" | "yes"))
}

fn use_feedback(ctx: &StepContext<'_>) -> Result<Transcript> {
    let stores = ctx.stores;
    let transcript = Transcript::from(vec![
        Message::system(setup_sys_prompt(stores)?),
        Message::user(prompt::instructions(&stores.input.get("prompt")?)?),
        Message::assistant(stores.workspace.get(ALL_OUTPUT_KEY)?),
        Message::system(stores.preprompts.get("use_feedback")?),
    ]);

    let feedback = stores.input.get("feedback")?;
    let transcript = ctx.ai.next(transcript, Some(&feedback))?;
    to_files(transcript.last_content(), &stores.workspace)?;
    Ok(transcript)
}

fn fix_code(ctx: &StepContext<'_>) -> Result<Transcript> {
    let stores = ctx.stores;
    // First message of the gen_code transcript, not its reply.
    let code_output = load_transcript(&stores.logs, StepId::GenCode)?
        .first()
        .map(|message| message.content.clone())
        .ok_or_else(|| PipelineError::not_found(stores.logs.name(), StepId::GenCode.as_str()))?;

    let transcript = Transcript::from(vec![
        Message::system(setup_sys_prompt(stores)?),
        Message::user(prompt::instructions(&stores.input.get("prompt")?)?),
        Message::user(code_output),
        Message::system(stores.preprompts.get("fix_code")?),
    ]);

    let transcript = ctx.ai.next(transcript, Some(&prompt::fix_code()?))?;
    to_files(transcript.last_content(), &stores.workspace)?;
    Ok(transcript)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Role;
    use crate::error::kind;
    use crate::io::transcript_log::save_transcript;
    use crate::test_support::{ScriptedConsole, TestProject};

    fn project(prompt: &str) -> TestProject {
        TestProject::new()
            .and_then(|p| p.with_prompt(prompt))
            .expect("project")
    }

    fn contents(transcript: &Transcript) -> Vec<&str> {
        transcript
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect()
    }

    fn roles(messages: &[Message]) -> Vec<Role> {
        messages.iter().map(|m| m.role).collect()
    }

    #[test]
    fn clarify_stops_on_sentinel_without_asking() {
        let p = project("build pong");
        p.backend.push_reply("  Nothing more to clarify.\n");

        let transcript = run_step(StepId::Clarify, &p.context()).expect("clarify");

        assert_eq!(contents(&transcript), ["QA", "build pong", "  Nothing more to clarify.\n"]);
        assert!(p.console.prompts().is_empty());
    }

    #[test]
    fn clarify_stops_on_reply_starting_with_no() {
        let p = project("build pong");
        p.backend.push_reply("No, that covers everything");

        let transcript = run_step(StepId::Clarify, &p.context()).expect("clarify");

        assert_eq!(transcript.len(), 3);
        assert_eq!(p.backend.calls(), 1);
        assert!(p.console.prompts().is_empty());
        assert!(p.console.printed(NOTHING_MORE_TO_CLARIFY));
    }

    #[test]
    fn clarify_empty_answer_sends_assumptions_once() {
        let console = ScriptedConsole::with_answers([""]);
        let p = TestProject::with_console(console)
            .and_then(|p| p.with_prompt("build pong"))
            .expect("project");
        p.backend.push_reply("Which language?");
        p.backend.push_reply("Assuming Python.");

        let transcript = run_step(StepId::Clarify, &p.context()).expect("clarify");

        assert_eq!(p.backend.calls(), 2);
        assert_eq!(p.console.prompts(), [CLARIFY_ASK]);
        assert_eq!(
            contents(&transcript),
            [
                "QA",
                "build pong",
                "Which language?",
                "Make your own assumptions and state them explicitly before starting",
                "Assuming Python.",
            ]
        );
        assert!(p.console.printed(CLARIFY_ASSUMING));
    }

    #[test]
    fn clarify_end_of_input_moves_on() {
        let p = project("build pong");
        p.backend.push_reply("Which language?");
        p.backend.push_reply("Assuming Python.");

        let transcript = run_step(StepId::Clarify, &p.context()).expect("clarify");
        assert_eq!(transcript.len(), 5);
        assert_eq!(p.backend.remaining(), 0);
    }

    #[test]
    fn clarify_answer_is_sent_with_follow_up_question() {
        let console = ScriptedConsole::with_answers(["Python", "c"]);
        let p = TestProject::with_console(console)
            .and_then(|p| p.with_prompt("build pong"))
            .expect("project");
        p.backend.push_reply("Which language?");
        p.backend.push_reply("1 remaining questions.\nWhich UI?");
        p.backend.push_reply("Assuming terminal UI.");

        let transcript = run_step(StepId::Clarify, &p.context()).expect("clarify");

        assert_eq!(p.backend.calls(), 3);
        let follow_up = &transcript.messages()[3];
        assert_eq!(follow_up.role, Role::User);
        assert!(follow_up.content.starts_with("Python\nIs anything else unclear?"));
        assert_eq!(transcript.messages().iter().filter(|m| m.role == Role::System).count(), 1);
        assert_eq!(transcript.len(), 7);
    }

    #[test]
    fn legacy_main_prompt_is_used_with_warning() {
        let p = TestProject::new().expect("project");
        p.stores.input.set("main_prompt", "legacy prompt").expect("set");
        p.backend.push_reply("Nothing more to clarify.");

        let transcript = run_step(StepId::Clarify, &p.context()).expect("clarify");

        assert_eq!(transcript.messages()[1].content, "legacy prompt");
        assert!(p.console.printed(MAIN_PROMPT_WARNING));
    }

    #[test]
    fn prompt_steps_fail_without_input_and_call_nothing() {
        for step in [
            StepId::Clarify,
            StepId::SimpleGen,
            StepId::GenSpec,
            StepId::GenUnitTests,
            StepId::GenCode,
            StepId::UseFeedback,
        ] {
            let p = TestProject::new().expect("project");
            p.backend.push_reply("unused");
            p.stores.memory.set("specification", "S").expect("spec");
            p.stores.memory.set("unit_tests", "T").expect("tests");
            p.stores.workspace.set(ALL_OUTPUT_KEY, "out").expect("out");
            p.stores.input.set("feedback", "fb").expect("feedback");

            let err = run_step(step, &p.context()).unwrap_err();
            assert!(
                matches!(kind(&err), Some(PipelineError::NotFound { key, .. }) if key == "prompt"),
                "{step}: {err:#}"
            );
            assert_eq!(p.backend.calls(), 0, "{step}");
        }
    }

    #[test]
    fn simple_gen_writes_files() {
        let p = project("build pong");
        p.backend
            .push_reply("Here you go.\nmain.py\n```python\nprint('pong')\n```\n");

        let transcript = run_step(StepId::SimpleGen, &p.context()).expect("simple_gen");

        let request = &p.backend.requests()[0];
        assert_eq!(roles(&request.messages), [Role::System, Role::User]);
        assert_eq!(request.messages[0].content, TestProject::setup_prompt());
        assert_eq!(request.messages[1].content, "build pong");
        assert_eq!(transcript.len(), 3);
        assert_eq!(p.stores.workspace.get("main.py").expect("main"), "print('pong')\n");
        assert_eq!(
            p.stores.workspace.get("README.md").expect("readme"),
            "Here you go.\nmain.py\n"
        );
    }

    #[test]
    fn gen_spec_stores_specification() {
        let p = project("build pong");
        p.backend.push_reply("THE SPEC");

        let transcript = run_step(StepId::GenSpec, &p.context()).expect("gen_spec");

        assert_eq!(
            roles(transcript.messages()),
            [Role::System, Role::System, Role::User, Role::Assistant]
        );
        assert_eq!(
            contents(&transcript),
            [TestProject::setup_prompt(), "Instructions: build pong", "SPEC", "THE SPEC"]
        );
        assert_eq!(p.stores.memory.get("specification").expect("spec"), "THE SPEC");
    }

    #[test]
    fn respec_replays_gen_spec_and_overwrites_specification() {
        let p = project("build pong");
        let earlier = Transcript::from(vec![
            Message::system("setup"),
            Message::user("SPEC"),
            Message::assistant("v1"),
        ]);
        save_transcript(&p.stores.logs, StepId::GenSpec, &earlier).expect("save");
        p.stores.memory.set("specification", "v1").expect("spec");
        p.backend.push_reply("review notes");
        p.backend.push_reply("v2");

        let transcript = run_step(StepId::Respec, &p.context()).expect("respec");

        let requests = p.backend.requests();
        assert_eq!(requests[0].messages.len(), 4);
        assert_eq!(requests[0].messages[3], Message::system("RESPEC"));
        assert_eq!(requests[1].messages.len(), 6);
        assert!(requests[1].messages[5].content.starts_with("Based on the conversation so far"));
        assert_eq!(transcript.len(), 7);
        assert_eq!(p.stores.memory.get("specification").expect("spec"), "v2");
    }

    #[test]
    fn respec_without_gen_spec_is_not_found() {
        let p = project("build pong");
        let err = run_step(StepId::Respec, &p.context()).unwrap_err();
        assert!(matches!(
            kind(&err),
            Some(PipelineError::NotFound { store, key }) if store == "logs" && key == "gen_spec"
        ));
        assert_eq!(p.backend.calls(), 0);
    }

    #[test]
    fn gen_unit_tests_stores_tests_and_writes_files() {
        let p = project("build pong");
        p.stores.memory.set("specification", "S").expect("spec");
        p.backend.push_reply("test_pong.py\n```python\ndef test(): pass\n```");

        let transcript = run_step(StepId::GenUnitTests, &p.context()).expect("tests");

        assert_eq!(
            contents(&transcript)[..4],
            [
                TestProject::setup_prompt(),
                "Instructions: build pong",
                "Specification:\n\nS",
                "UNIT_TESTS"
            ]
        );
        assert_eq!(
            roles(transcript.messages()),
            [Role::System, Role::User, Role::User, Role::User, Role::Assistant]
        );
        assert!(p.stores.memory.get("unit_tests").expect("tests").starts_with("test_pong.py"));
        assert_eq!(
            p.stores.workspace.get("test_pong.py").expect("file"),
            "def test(): pass\n"
        );
    }

    #[test]
    fn gen_code_seeds_four_messages() {
        let p = project("build pong");
        p.stores.memory.set("specification", "S").expect("spec");
        p.stores.memory.set("unit_tests", "T").expect("tests");
        p.backend.push_reply("pong.py\n```\ncode\n```");

        run_step(StepId::GenCode, &p.context()).expect("gen_code");

        let request = &p.backend.requests()[0];
        let sent: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            sent,
            [
                TestProject::setup_prompt(),
                "Instructions: build pong",
                "Specification:\n\nS",
                "Unit tests:\n\nT",
                "USE_QA"
            ]
        );
        assert_eq!(p.stores.workspace.get("pong.py").expect("file"), "code\n");
    }

    #[test]
    fn gen_code_requires_specification() {
        let p = project("build pong");
        let err = run_step(StepId::GenCode, &p.context()).unwrap_err();
        assert!(matches!(
            kind(&err),
            Some(PipelineError::NotFound { store, key }) if store == "memory" && key == "specification"
        ));
    }

    #[test]
    fn gen_clarified_code_replaces_first_message() {
        let p = project("build pong");
        let clarified = Transcript::from(vec![
            Message::system("QA"),
            Message::user("build pong"),
            Message::assistant("Nothing more to clarify."),
        ]);
        save_transcript(&p.stores.logs, StepId::Clarify, &clarified).expect("save");
        p.backend.push_reply("app.py\n```\nx = 1\n```");

        let transcript = run_step(StepId::GenClarifiedCode, &p.context()).expect("code");

        assert_eq!(
            contents(&transcript),
            [
                TestProject::setup_prompt(),
                "build pong",
                "Nothing more to clarify.",
                "USE_QA",
                "app.py\n```\nx = 1\n```"
            ]
        );
        assert_eq!(p.stores.workspace.get("app.py").expect("file"), "x = 1\n");
    }

    #[test]
    fn gen_entrypoint_joins_code_blocks_into_run_script() {
        let p = project("build pong");
        p.stores.workspace.set(ALL_OUTPUT_KEY, "ALL").expect("all");
        p.backend.push_reply(
            "Install:\n```bash\npip install -r requirements.txt\n```\nRun:\n```sh\npython main.py\n```\n",
        );

        let transcript = run_step(StepId::GenEntrypoint, &p.context()).expect("entrypoint");

        assert_eq!(transcript.messages()[1].content, "Information about the codebase:\n\nALL");
        assert!(transcript.messages()[0].content.starts_with("You will get information"));
        assert_eq!(
            p.stores.workspace.get(RUN_SCRIPT_KEY).expect("run.sh"),
            "pip install -r requirements.txt\n\npython main.py\n"
        );
    }

    #[test]
    fn execute_entrypoint_declined_runs_nothing() {
        let console = ScriptedConsole::with_answers(["no"]);
        let p = TestProject::with_console(console).expect("project");
        p.stores.workspace.set(RUN_SCRIPT_KEY, "touch ran\n").expect("script");

        let transcript = run_step(StepId::ExecuteEntrypoint, &p.context()).expect("execute");

        assert!(transcript.is_empty());
        assert!(p.console.printed("Ok, not executing the code."));
        assert!(!p.stores.workspace.contains("ran"));
    }

    #[test]
    fn execute_entrypoint_runs_script_in_workspace() {
        let console = ScriptedConsole::with_answers([""]);
        let p = TestProject::with_console(console).expect("project");
        p.stores.workspace.set(RUN_SCRIPT_KEY, "touch ran\n").expect("script");

        let transcript = run_step(StepId::ExecuteEntrypoint, &p.context()).expect("execute");

        assert!(transcript.is_empty());
        assert!(p.stores.workspace.contains("ran"));
        assert!(p.console.printed("Execution finished successfully."));
    }

    #[test]
    fn execute_entrypoint_reports_exit_code() {
        let console = ScriptedConsole::with_answers(["yes"]);
        let p = TestProject::with_console(console).expect("project");
        p.stores.workspace.set(RUN_SCRIPT_KEY, "exit 4\n").expect("script");

        run_step(StepId::ExecuteEntrypoint, &p.context()).expect("execute");
        assert!(p.console.printed("Execution failed with exit code 4."));
    }

    #[test]
    fn execute_entrypoint_stops_when_cancelled() {
        let console = ScriptedConsole::with_answers(["y"]);
        let p = TestProject::with_console(console).expect("project");
        p.stores.workspace.set(RUN_SCRIPT_KEY, "sleep 30\n").expect("script");
        let cancel = p.cancel.clone();
        let interrupter = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(500));
            cancel.cancel();
        });

        let started = std::time::Instant::now();
        let transcript = run_step(StepId::ExecuteEntrypoint, &p.context()).expect("execute");
        interrupter.join().expect("join");

        assert!(transcript.is_empty());
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
        assert!(p.console.printed("Stopping execution."));
        assert!(p.console.printed("Execution stopped."));
        assert!(!p.console.printed("Execution failed"));
    }

    #[test]
    fn execute_entrypoint_requires_run_script() {
        let p = TestProject::new().expect("project");
        let err = run_step(StepId::ExecuteEntrypoint, &p.context()).unwrap_err();
        assert!(matches!(
            kind(&err),
            Some(PipelineError::NotFound { key, .. }) if key == RUN_SCRIPT_KEY
        ));
    }

    #[test]
    fn confirmation_answers() {
        assert!(confirms_execution(Some("")));
        assert!(confirms_execution(Some("y")));
        assert!(confirms_execution(Some(" yes ")));
        assert!(!confirms_execution(Some("no")));
        assert!(!confirms_execution(Some("nope")));
        assert!(!confirms_execution(None));
    }

    #[test]
    fn use_feedback_seeds_prior_output() {
        let p = project("build pong");
        p.stores.workspace.set(ALL_OUTPUT_KEY, "old output").expect("all");
        p.stores.input.set("feedback", "make it faster").expect("feedback");
        p.backend.push_reply("fast.py\n```\nfast\n```");

        run_step(StepId::UseFeedback, &p.context()).expect("feedback");

        let request = &p.backend.requests()[0];
        assert_eq!(
            roles(&request.messages),
            [Role::System, Role::User, Role::Assistant, Role::System, Role::User]
        );
        assert_eq!(request.messages[2].content, "old output");
        assert_eq!(request.messages[3].content, "USE_FEEDBACK");
        assert_eq!(request.messages[4].content, "make it faster");
        assert_eq!(p.stores.workspace.get("fast.py").expect("file"), "fast\n");
    }

    #[test]
    fn fix_code_uses_first_message_of_gen_code() {
        let p = project("build pong");
        let gen_code = Transcript::from(vec![
            Message::system("first message"),
            Message::assistant("the reply"),
        ]);
        save_transcript(&p.stores.logs, StepId::GenCode, &gen_code).expect("save");
        p.backend.push_reply("fixed.py\n```\nok\n```");

        run_step(StepId::FixCode, &p.context()).expect("fix_code");

        let request = &p.backend.requests()[0];
        let sent: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            sent,
            [
                TestProject::setup_prompt(),
                "Instructions: build pong",
                "first message",
                "FIX_CODE",
                "Please fix any errors in the code above."
            ]
        );
        assert_eq!(p.stores.workspace.get("fixed.py").expect("file"), "ok\n");
    }

    #[test]
    fn fix_code_with_empty_gen_code_log_is_not_found() {
        let p = project("build pong");
        save_transcript(&p.stores.logs, StepId::GenCode, &Transcript::new()).expect("save");
        let err = run_step(StepId::FixCode, &p.context()).unwrap_err();
        assert!(matches!(
            kind(&err),
            Some(PipelineError::NotFound { key, .. }) if key == "gen_code"
        ));
    }
}
