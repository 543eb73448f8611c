use std::io::Read;

use anyhow::{Context, bail};

use formtree_demo::{catalog, session};
use formtree_forms::EngineConfig;
use formtree_infra::InMemoryRecordStore;

const USAGE: &str = "usage: formtree-demo <artist|album|organisation> [SUBMISSIONS.json]";

fn main() -> anyhow::Result<()> {
    formtree_observability::init();

    let mut args = std::env::args().skip(1);
    let Some(form_name) = args.next() else {
        bail!(USAGE);
    };
    let Some(schema) = catalog::lookup(&form_name).context("registering demo forms")? else {
        bail!("unknown form `{form_name}`\n{USAGE}");
    };

    let raw = match args.next() {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading submissions from stdin")?;
            buf
        }
    };
    let document = serde_json::from_str(&raw).context("parsing submissions")?;

    let store = InMemoryRecordStore::new();
    catalog::seed(&store).context("seeding genres")?;
    let config = EngineConfig::from_env();
    tracing::info!(form = %form_name, config = ?config, "replaying submissions");

    let outcomes = session::replay(&store, schema, config, &session::submissions(document)?)?;

    let report = serde_json::json!({
        "outcomes": outcomes.iter().map(session::Outcome::to_json).collect::<Vec<_>>(),
        "tables": store.dump(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
