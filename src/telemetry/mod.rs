pub mod config;
pub mod ctx;
pub mod emit;
pub mod ops;

use ctx::LogCtx;

// One typed log context per subcommand
pub fn scrape() -> LogCtx<ops::scrape::Scrape> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
pub fn clean() -> LogCtx<ops::clean::Clean> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
pub fn init() -> LogCtx<ops::init::Init> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
pub fn stats() -> LogCtx<ops::stats::Stats> { LogCtx { json: config::logs_are_json(), _marker: std::marker::PhantomData } }
