use std::fmt::Display;

/// What a provisioning step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    AlreadySatisfied,
    Changed,
    /// The operator declined.
    Skipped,
    /// A best-effort step failed; later steps may be unable to act.
    Degraded(String),
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::AlreadySatisfied => f.write_str("ok"),
            Outcome::Changed => f.write_str("changed"),
            Outcome::Skipped => f.write_str("skipped"),
            Outcome::Degraded(why) => write!(f, "degraded: {why}"),
        }
    }
}

/// Outcomes of a whole run, in order.
#[derive(Debug, Default)]
pub(crate) struct Report {
    pub(crate) steps: Vec<(String, Outcome)>,
}

impl Report {
    pub(crate) fn record(&mut self, step: impl Into<String>, outcome: Outcome) {
        let step = step.into();
        tracing::debug!("{step}: {outcome}");
        self.steps.push((step, outcome));
    }

    pub(crate) fn changed(&self) -> usize {
        self.steps
            .iter()
            .filter(|(_, o)| *o == Outcome::Changed)
            .count()
    }

    pub(crate) fn degraded(&self) -> impl Iterator<Item = &(String, Outcome)> {
        self.steps
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Degraded(_)))
    }

    pub(crate) fn print(&self) {
        println!();
        println!("Summary:");
        let width = self.steps.iter().map(|(s, _)| s.len()).max().unwrap_or(0);
        for (step, outcome) in &self.steps {
            println!("  {step:<width$}  {outcome}");
        }
        match self.changed() {
            0 => println!("Nothing to do; this machine was already set up."),
            n => println!("Made {n} change(s)."),
        }
        if self.degraded().next().is_some() {
            crate::utils::medium_visibility_warning(
                "Some steps could not complete; see the summary above.",
            );
        }
    }
}
