mod command;
mod describe;
mod store;
mod util;

fn main() -> anyhow::Result<()> {
    command::run()
}
