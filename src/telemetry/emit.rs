use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Instant;
use uuid::Uuid;

#[derive(Serialize)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

struct RunClock { run_id: Uuid, started: Instant }

fn clock() -> &'static RunClock {
    static CLOCK: OnceLock<RunClock> = OnceLock::new();
    CLOCK.get_or_init(|| RunClock { run_id: Uuid::new_v4(), started: Instant::now() })
}

/// Pin the process run id and start time; call early in `main`.
pub fn start_clock() -> Uuid { clock().run_id }

pub fn run_meta() -> Meta {
    let c = clock();
    Meta { duration_ms: Some(c.started.elapsed().as_millis()), run_id: Some(c.run_id.to_string()) }
}

pub fn print_plan<T: Serialize>(op: &str, plan: &T, meta: Option<Meta>) -> Result<()> {
    let env = json!({ "op": op, "apply": false, "plan": plan, "meta": meta });
    let mut out = io::stdout();
    serde_json::to_writer(&mut out, &env)?;
    writeln!(&mut out)?;
    Ok(())
}

pub fn print_result<T: Serialize>(op: &str, result: &T, meta: Option<Meta>) -> Result<()> {
    let env = json!({ "op": op, "apply": true, "result": result, "meta": meta });
    let mut out = io::stdout();
    serde_json::to_writer(&mut out, &env)?;
    writeln!(&mut out)?;
    Ok(())
}
