use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Scrape;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Plan, Category, Load, Extract, Clean, Store, RawDump }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Plan => "plan",
        Phase::Category => "category",
        Phase::Load => "load",
        Phase::Extract => "extract",
        Phase::Clean => "clean",
        Phase::Store => "store",
        Phase::RawDump => "raw_dump",
    }}
    fn span(&self) -> Span { match self {
        Phase::Plan => info_span!("plan"),
        Phase::Category => info_span!("category"),
        Phase::Load => info_span!("load"),
        Phase::Extract => info_span!("extract"),
        Phase::Clean => info_span!("clean"),
        Phase::Store => info_span!("store"),
        Phase::RawDump => info_span!("raw_dump"),
    }}
}

impl OpMarker for Scrape {
    const NAME: &'static str = "scrape";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("scrape") }
}
