use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Stats;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Count, TopSkills, TopCompanies }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Count => "count", Phase::TopSkills => "top_skills", Phase::TopCompanies => "top_companies" } }
    fn span(&self) -> Span { match self { Phase::Count => info_span!("count"), Phase::TopSkills => info_span!("top_skills"), Phase::TopCompanies => info_span!("top_companies") } }
}

impl OpMarker for Stats {
    const NAME: &'static str = "stats";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("stats") }
}
