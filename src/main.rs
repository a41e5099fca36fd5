use boop::{RuntimeConfig, app};

fn main() -> anyhow::Result<()> {
    app::run(RuntimeConfig::from_env())
}
