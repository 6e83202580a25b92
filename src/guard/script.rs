//! The fixed action scripts bound to each verdict.

use crate::guard::policy::Verdict;

/// Title every notification is sent under.
pub const NOTIFICATION_TITLE: &str = "Bash Guard";

/// Interpreter directive prepended by the rewrite step.
pub const REWRITE_DIRECTIVE: &str = "#!/usr/bin/env ruby";

/// One step of an action script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Show a message, then pause.
    Notify(&'static str),
    /// Prepend [`REWRITE_DIRECTIVE`] to the script.
    Rewrite,
    /// Move the script to the trash.
    Discard,
}

const SNARKY: &[Step] = &[
    Step::Notify("hey there"),
    Step::Notify("see you're writing a shell script"),
    Step::Notify("not how i'd do it but it will work"),
    Step::Notify("..."),
    Step::Notify("i guess :|"),
];

const PASSIVE: &[Step] = &[
    Step::Notify("still at it, i see"),
    Step::Notify("maybe you meant to write this in ruby or python?"),
    Step::Notify("i'll fix that for you"),
    Step::Notify("..."),
    Step::Notify("..."),
    Step::Rewrite,
    Step::Notify("FIXED!"),
];

const JUSTICE: &[Step] = &[
    Step::Notify("this is getting a bit big, don't you think?"),
    Step::Notify("i'll optimize it for you"),
    Step::Notify("..."),
    Step::Notify("..."),
    Step::Discard,
    Step::Notify("OPTIMIZED!"),
];

/// Ordered steps for one verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionScript {
    verdict: Verdict,
    steps: &'static [Step],
}

impl ActionScript {
    /// Script for `verdict`. `Ignore` has no steps.
    #[must_use]
    pub const fn for_verdict(verdict: Verdict) -> Self {
        let steps: &'static [Step] = match verdict {
            Verdict::Ignore => &[],
            Verdict::Snarky => SNARKY,
            Verdict::Passive => PASSIVE,
            Verdict::Justice => JUSTICE,
        };
        Self { verdict, steps }
    }

    /// Verdict this script answers.
    #[must_use]
    pub const fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Steps in execution order.
    #[must_use]
    pub const fn steps(&self) -> &'static [Step] {
        self.steps
    }

    /// Whether the script does nothing (the `Ignore` verdict).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every message in delivery order, confirmation included.
    #[must_use]
    pub fn messages(&self) -> Vec<&'static str> {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::Notify(msg) => Some(*msg),
                Step::Rewrite | Step::Discard => None,
            })
            .collect()
    }

    /// Messages sent before the mutation step (all of them if there is none).
    #[must_use]
    pub fn preamble(&self) -> Vec<&'static str> {
        self.steps
            .iter()
            .map_while(|step| match step {
                Step::Notify(msg) => Some(*msg),
                Step::Rewrite | Step::Discard => None,
            })
            .collect()
    }

    /// The file mutation this script performs, if any.
    #[must_use]
    pub fn mutation(&self) -> Option<Step> {
        self.steps
            .iter()
            .copied()
            .find(|step| matches!(step, Step::Rewrite | Step::Discard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_does_nothing() {
        let script = ActionScript::for_verdict(Verdict::Ignore);
        assert!(script.is_empty());
        assert!(script.mutation().is_none());
    }

    #[test]
    fn snarky_is_five_messages_without_mutation() {
        let script = ActionScript::for_verdict(Verdict::Snarky);
        assert_eq!(script.messages().len(), 5);
        assert_eq!(script.messages().last(), Some(&"i guess :|"));
        assert!(script.mutation().is_none());
    }

    #[test]
    fn passive_rewrites_after_five_messages_then_confirms() {
        let script = ActionScript::for_verdict(Verdict::Passive);
        assert_eq!(script.preamble().len(), 5);
        assert_eq!(script.mutation(), Some(Step::Rewrite));
        assert_eq!(script.steps().last(), Some(&Step::Notify("FIXED!")));
    }

    #[test]
    fn justice_discards_then_confirms() {
        let script = ActionScript::for_verdict(Verdict::Justice);
        assert_eq!(script.preamble()[1], "i'll optimize it for you");
        assert_eq!(script.mutation(), Some(Step::Discard));
        assert_eq!(script.messages().len(), 5);
        assert_eq!(script.steps().last(), Some(&Step::Notify("OPTIMIZED!")));
    }

    #[test]
    fn every_mutation_is_followed_by_a_confirmation() {
        for verdict in Verdict::ALL {
            let steps = ActionScript::for_verdict(verdict).steps();
            for (i, step) in steps.iter().enumerate() {
                if matches!(step, Step::Rewrite | Step::Discard) {
                    assert!(
                        matches!(steps.get(i + 1), Some(Step::Notify(_))),
                        "{verdict}: mutation must be confirmed"
                    );
                    assert_eq!(i + 2, steps.len(), "{verdict}: confirmation is last");
                }
            }
        }
    }

    #[test]
    fn directive_is_not_a_shell_shebang() {
        assert!(!crate::guard::shebang::is_shell_shebang(REWRITE_DIRECTIVE));
    }
}
