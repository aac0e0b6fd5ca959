//! linechat daemon binary.
//!
//! See [`chatd::cli`] for flags, environment variables, and signals.

fn main() -> anyhow::Result<()> {
    chatd::cli::main()
}
