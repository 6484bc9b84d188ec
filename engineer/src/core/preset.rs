//! Static mapping from preset names to ordered step lists.

use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// Identity of a pipeline step.
///
/// The name doubles as the key of the step's transcript in the `logs` store,
/// so later steps replay earlier ones by this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepId {
    Clarify,
    GenClarifiedCode,
    SimpleGen,
    GenSpec,
    Respec,
    GenUnitTests,
    GenCode,
    GenEntrypoint,
    ExecuteEntrypoint,
    UseFeedback,
    FixCode,
}

impl StepId {
    pub fn as_str(self) -> &'static str {
        match self {
            StepId::Clarify => "clarify",
            StepId::GenClarifiedCode => "gen_clarified_code",
            StepId::SimpleGen => "simple_gen",
            StepId::GenSpec => "gen_spec",
            StepId::Respec => "respec",
            StepId::GenUnitTests => "gen_unit_tests",
            StepId::GenCode => "gen_code",
            StepId::GenEntrypoint => "gen_entrypoint",
            StepId::ExecuteEntrypoint => "execute_entrypoint",
            StepId::UseFeedback => "use_feedback",
            StepId::FixCode => "fix_code",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named, fixed step sequence selected with `--steps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    Default,
    Benchmark,
    Simple,
    Tdd,
    TddPlus,
    Clarify,
    Respec,
    ExecuteOnly,
    Evaluate,
    UseFeedback,
}

impl Preset {
    pub const ALL: [Preset; 10] = [
        Preset::Default,
        Preset::Benchmark,
        Preset::Simple,
        Preset::Tdd,
        Preset::TddPlus,
        Preset::Clarify,
        Preset::Respec,
        Preset::ExecuteOnly,
        Preset::Evaluate,
        Preset::UseFeedback,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::Benchmark => "benchmark",
            Preset::Simple => "simple",
            Preset::Tdd => "tdd",
            Preset::TddPlus => "tdd+",
            Preset::Clarify => "clarify",
            Preset::Respec => "respec",
            Preset::ExecuteOnly => "execute_only",
            Preset::Evaluate => "evaluate",
            Preset::UseFeedback => "use_feedback",
        }
    }

    pub fn steps(self) -> &'static [StepId] {
        use StepId as S;
        match self {
            Preset::Default => &[
                S::Clarify,
                S::GenClarifiedCode,
                S::GenEntrypoint,
                S::ExecuteEntrypoint,
            ],
            Preset::Benchmark => &[S::SimpleGen, S::GenEntrypoint],
            Preset::Simple => &[S::SimpleGen, S::GenEntrypoint, S::ExecuteEntrypoint],
            Preset::Tdd => &[
                S::GenSpec,
                S::GenUnitTests,
                S::GenCode,
                S::GenEntrypoint,
                S::ExecuteEntrypoint,
            ],
            Preset::TddPlus => &[
                S::GenSpec,
                S::GenUnitTests,
                S::Clarify,
                S::GenClarifiedCode,
                S::GenCode,
                S::GenEntrypoint,
                S::ExecuteEntrypoint,
            ],
            Preset::Clarify => &[S::Clarify],
            Preset::Respec => &[S::Respec],
            Preset::ExecuteOnly => &[S::ExecuteEntrypoint],
            Preset::Evaluate => &[
                S::UseFeedback,
                S::FixCode,
                S::GenEntrypoint,
                S::ExecuteEntrypoint,
            ],
            Preset::UseFeedback => &[S::UseFeedback, S::GenEntrypoint, S::ExecuteEntrypoint],
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = PipelineError;

    /// Names match case-insensitively (`TDD+` selects `tdd+`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Preset::ALL
            .into_iter()
            .find(|preset| preset.as_str() == wanted)
            .ok_or_else(|| PipelineError::InvalidConfiguration(s.to_string()))
    }
}
