use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Clean;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Read, Rules, Clean }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Read => "read", Phase::Rules => "rules", Phase::Clean => "clean" } }
    fn span(&self) -> Span { match self { Phase::Read => info_span!("read"), Phase::Rules => info_span!("rules"), Phase::Clean => info_span!("clean") } }
}

impl OpMarker for Clean {
    const NAME: &'static str = "clean";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("clean") }
}
